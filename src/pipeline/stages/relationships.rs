//! Analyze Relationships Stage
//!
//! Builds full-mode, truncated context restricted to the files referenced by
//! any abstraction, and asks the model for a project summary plus a
//! relationship list. Every `from`/`to` index is validated against the
//! abstraction count.
//!
//! The prompt asks that every abstraction appear in at least one
//! relationship; uncovered abstractions are reported as a warning after
//! parsing, never repaired or retried.

use serde_yaml::Value;
use tracing::{info, warn};

use crate::ai::provider::{SharedProvider, complete_with_retry};
use crate::ai::validation::{parse_index, parse_yaml_block, require_mapping, require_sequence, require_str};
use crate::context::BuiltContext;
use crate::types::{Abstraction, Relationship, RelationshipGraph, Result, ValidationError};

pub const STAGE: &str = "analyze_relationships";

/// Analyze how the identified abstractions relate to each other.
pub struct AnalyzeRelationships<'a> {
    pub provider: &'a SharedProvider,
    pub max_retries: usize,
}

impl AnalyzeRelationships<'_> {
    pub async fn run(
        &self,
        project_name: &str,
        abstractions: &[Abstraction],
        context: &BuiltContext,
    ) -> Result<RelationshipGraph> {
        let prompt = build_prompt(project_name, abstractions, &context.text);
        let reply = complete_with_retry(self.provider, &prompt, self.max_retries).await?;
        let graph = parse_response(&reply.text, abstractions.len())?;

        let uncovered = graph.uncovered_abstractions(abstractions.len());
        if !uncovered.is_empty() {
            let names: Vec<&str> = uncovered
                .iter()
                .map(|&i| abstractions[i].name.as_str())
                .collect();
            warn!(
                "Abstractions not covered by any relationship: {}",
                names.join(", ")
            );
        }

        info!(
            "Mapped {} relationships between {} abstractions",
            graph.relationships.len(),
            abstractions.len()
        );
        Ok(graph)
    }
}

/// Render the abstraction listing used in prompts: `index # name`.
pub fn abstraction_listing(abstractions: &[Abstraction]) -> String {
    abstractions
        .iter()
        .enumerate()
        .map(|(i, a)| format!("- {} # {}", i, a.name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(project_name: &str, abstractions: &[Abstraction], context_text: &str) -> String {
    format!(
        r#"The project `{project_name}` has these abstractions:

{listing}

Relevant file contents:

{context_text}

Write a short project summary (2-3 sentences, beginner friendly) and list
the relationships between the abstractions. Every abstraction must appear in
at least one relationship. Use a short verb phrase as the label.

Respond with exactly one fenced yaml block in this format:

```yaml
summary: |
  What the project does, in plain language.
relationships:
  - from_abstraction: 0 # Query Engine
    to_abstraction: 1 # Storage Layer
    label: "reads from"
```"#,
        project_name = project_name,
        listing = abstraction_listing(abstractions),
        context_text = context_text,
    )
}

fn parse_response(response: &str, abstraction_count: usize) -> Result<RelationshipGraph> {
    let value = parse_yaml_block(response, STAGE)?;
    let map = require_mapping(&value, STAGE)?;

    let summary = require_str(map, "summary", STAGE)?;
    let raw_relationships = require_sequence(map, "relationships", STAGE)?;

    let mut relationships = Vec::with_capacity(raw_relationships.len());
    for (i, raw) in raw_relationships.iter().enumerate() {
        let entry = require_mapping(raw, STAGE)?;

        let from = parse_bounded_index(entry, "from_abstraction", i, abstraction_count)?;
        let to = parse_bounded_index(entry, "to_abstraction", i, abstraction_count)?;
        let label = require_str(entry, "label", STAGE)?;

        relationships.push(Relationship { from, to, label });
    }

    Ok(RelationshipGraph {
        summary,
        relationships,
    })
}

fn parse_bounded_index(
    entry: &serde_yaml::Mapping,
    key: &str,
    position: usize,
    abstraction_count: usize,
) -> Result<usize> {
    let raw = entry.get(Value::from(key)).ok_or_else(|| {
        ValidationError::new(STAGE, "missing required field")
            .with_field(format!("relationships[{}].{}", position, key))
    })?;

    let index = parse_index(raw, STAGE, key)?;
    if index >= abstraction_count {
        return Err(ValidationError::new(STAGE, "abstraction index out of range")
            .with_field(format!("relationships[{}].{}", position, key))
            .with_comparison(format!("0..{}", abstraction_count), index.to_string())
            .into());
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(yaml: &str) -> String {
        format!("```yaml\n{}\n```", yaml)
    }

    #[test]
    fn test_parse_valid_response() {
        let response = wrap(
            r#"summary: |
  A small tool.
relationships:
  - from_abstraction: 0 # Crawler
    to_abstraction: 1 # Pipeline
    label: "feeds""#,
        );

        let graph = parse_response(&response, 2).unwrap();
        assert_eq!(graph.summary.trim(), "A small tool.");
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].from, 0);
        assert_eq!(graph.relationships[0].to, 1);
        assert_eq!(graph.relationships[0].label, "feeds");
    }

    #[test]
    fn test_out_of_range_from_is_fatal() {
        let response = wrap(
            r#"summary: x
relationships:
  - from_abstraction: 7
    to_abstraction: 0
    label: "uses""#,
        );

        let err = parse_response(&response, 2).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(err.to_string().contains("from_abstraction"));
    }

    #[test]
    fn test_missing_summary_is_fatal() {
        let response = wrap(
            r#"relationships:
  - from_abstraction: 0
    to_abstraction: 1
    label: "uses""#,
        );
        assert!(parse_response(&response, 2).is_err());
    }

    #[test]
    fn test_missing_label_is_fatal() {
        let response = wrap(
            r#"summary: x
relationships:
  - from_abstraction: 0
    to_abstraction: 1"#,
        );
        assert!(parse_response(&response, 2).is_err());
    }

    #[test]
    fn test_abstraction_listing_format() {
        let abstractions = vec![
            Abstraction {
                name: "Crawler".to_string(),
                description: String::new(),
                files: vec![0],
            },
            Abstraction {
                name: "Pipeline".to_string(),
                description: String::new(),
                files: vec![1],
            },
        ];
        assert_eq!(
            abstraction_listing(&abstractions),
            "- 0 # Crawler\n- 1 # Pipeline"
        );
    }
}
