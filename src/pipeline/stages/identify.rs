//! Identify Abstractions Stage
//!
//! Builds signature-mode context across the whole repository and asks the
//! model for 3-N subsystem abstractions, each with a name, description, and
//! file-index list. Parsing is strict: malformed structure, a missing
//! required field, or an out-of-range index aborts the job. Duplicate file
//! indices are the only normalization applied.

use serde_yaml::Value;
use tracing::{debug, info};

use crate::ai::provider::{SharedProvider, complete_with_retry};
use crate::ai::validation::{parse_index, parse_yaml_block, require_mapping, require_sequence, require_str};
use crate::constants::pipeline as pipeline_constants;
use crate::context::BuiltContext;
use crate::types::{Abstraction, Result, ValidationError};

pub const STAGE: &str = "identify_abstractions";

/// Identify subsystem abstractions across the whole repository.
pub struct IdentifyAbstractions<'a> {
    pub provider: &'a SharedProvider,
    pub max_retries: usize,
    pub max_abstractions: usize,
}

impl IdentifyAbstractions<'_> {
    pub async fn run(
        &self,
        project_name: &str,
        context: &BuiltContext,
        files_total: usize,
        file_listing: &str,
    ) -> Result<Vec<Abstraction>> {
        let prompt = build_prompt(
            project_name,
            &context.text,
            file_listing,
            self.max_abstractions,
        );

        let reply = complete_with_retry(self.provider, &prompt, self.max_retries).await?;
        let abstractions = parse_response(&reply.text, files_total)?;

        info!(
            "Identified {} abstractions across {} files",
            abstractions.len(),
            files_total
        );
        Ok(abstractions)
    }
}

fn build_prompt(
    project_name: &str,
    context_text: &str,
    file_listing: &str,
    max_abstractions: usize,
) -> String {
    format!(
        r#"Analyze the codebase of the project `{project_name}`.

Identify the {min}-{max} most important architectural abstractions (core
subsystems a newcomer must understand). For each abstraction provide a
concise name, a beginner-friendly description (around 100 words), and the
indices of the files that implement it.

Codebase context (declarations only):

{context_text}

File index listing:

{file_listing}

Respond with exactly one fenced yaml block in this format:

```yaml
- name: Query Engine
  description: |
    Explains what the abstraction does in plain language.
  file_indices:
    - 0 # path/to/file.rs
    - 3 # another/file.rs
```"#,
        project_name = project_name,
        min = pipeline_constants::MIN_ABSTRACTIONS,
        max = max_abstractions,
        context_text = context_text,
        file_listing = file_listing,
    )
}

/// Parse and strictly validate the abstraction list.
fn parse_response(response: &str, files_total: usize) -> Result<Vec<Abstraction>> {
    let value = parse_yaml_block(response, STAGE)?;
    let Value::Sequence(items) = value else {
        return Err(ValidationError::new(STAGE, "expected a yaml sequence of abstractions").into());
    };

    if items.is_empty() {
        return Err(ValidationError::new(STAGE, "abstraction list is empty").into());
    }

    let mut abstractions = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let map = require_mapping(item, STAGE)?;
        let name = require_str(map, "name", STAGE)?;
        let description = require_str(map, "description", STAGE)?;
        let raw_indices = require_sequence(map, "file_indices", STAGE)?;

        let mut files = Vec::with_capacity(raw_indices.len());
        for raw in raw_indices {
            let index = parse_index(raw, STAGE, "file_indices")?;
            if index >= files_total {
                return Err(ValidationError::new(STAGE, "file index out of range")
                    .with_field(format!("abstractions[{}].file_indices", i))
                    .with_comparison(format!("0..{}", files_total), index.to_string())
                    .into());
            }
            // Duplicates are normalized away, preserving first-seen order
            if !files.contains(&index) {
                files.push(index);
            }
        }

        if files.is_empty() {
            return Err(ValidationError::new(STAGE, "abstraction references no files")
                .with_field(format!("abstractions[{}]", i))
                .into());
        }

        debug!("Abstraction '{}' covers {} files", name, files.len());
        abstractions.push(Abstraction {
            name,
            description,
            files,
        });
    }

    Ok(abstractions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(yaml: &str) -> String {
        format!("Here are the abstractions:\n```yaml\n{}\n```\n", yaml)
    }

    #[test]
    fn test_parse_valid_response() {
        let response = wrap(
            r#"- name: Crawler
  description: Fetches files.
  file_indices:
    - 0 # src/crawler.rs
    - 1
- name: Pipeline
  description: Orchestrates stages.
  file_indices:
    - "2 # src/pipeline.rs""#,
        );

        let abstractions = parse_response(&response, 3).unwrap();
        assert_eq!(abstractions.len(), 2);
        assert_eq!(abstractions[0].name, "Crawler");
        assert_eq!(abstractions[0].files, vec![0, 1]);
        assert_eq!(abstractions[1].files, vec![2]);
    }

    #[test]
    fn test_duplicate_indices_normalized() {
        let response = wrap(
            r#"- name: Core
  description: Core logic.
  file_indices: [0, 1, 0, 1, 2]"#,
        );

        let abstractions = parse_response(&response, 3).unwrap();
        assert_eq!(abstractions[0].files, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_range_index_is_fatal() {
        let response = wrap(
            r#"- name: Core
  description: Core logic.
  file_indices: [0, 5]"#,
        );

        let err = parse_response(&response, 3).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let response = wrap(
            r#"- name: Core
  file_indices: [0]"#,
        );

        let err = parse_response(&response, 3).unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_missing_block_is_fatal() {
        assert!(parse_response("no yaml here", 3).is_err());
    }

    #[test]
    fn test_empty_list_is_fatal() {
        let response = wrap("[]");
        assert!(parse_response(&response, 3).is_err());
    }

    #[test]
    fn test_no_files_is_fatal() {
        let response = wrap(
            r#"- name: Ghost
  description: References nothing.
  file_indices: []"#,
        );
        assert!(parse_response(&response, 3).is_err());
    }

    #[test]
    fn test_prompt_mentions_bounds_and_listing() {
        let prompt = build_prompt("widget", "ctx", "0 # a.rs", 8);
        assert!(prompt.contains("3-8"));
        assert!(prompt.contains("0 # a.rs"));
        assert!(prompt.contains("```yaml"));
    }
}
