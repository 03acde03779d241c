//! Order Chapters Stage
//!
//! Asks the model for a total ordering of all abstraction indices and
//! validates the result is a true permutation: every index present exactly
//! once. Any duplicate or omission is fatal.

use serde_yaml::Value;
use tracing::info;

use crate::ai::provider::{SharedProvider, complete_with_retry};
use crate::ai::validation::{parse_index, parse_yaml_block};
use crate::types::{Abstraction, RelationshipGraph, Result, ValidationError};

use super::relationships::abstraction_listing;

pub const STAGE: &str = "order_chapters";

/// Decide the pedagogical order of the tutorial chapters.
pub struct OrderChapters<'a> {
    pub provider: &'a SharedProvider,
    pub max_retries: usize,
}

impl OrderChapters<'_> {
    pub async fn run(
        &self,
        project_name: &str,
        abstractions: &[Abstraction],
        graph: &RelationshipGraph,
    ) -> Result<Vec<usize>> {
        let prompt = build_prompt(project_name, abstractions, graph);
        let reply = complete_with_retry(self.provider, &prompt, self.max_retries).await?;
        let order = parse_response(&reply.text, abstractions.len())?;

        info!("Chapter order resolved: {:?}", order);
        Ok(order)
    }
}

fn build_prompt(
    project_name: &str,
    abstractions: &[Abstraction],
    graph: &RelationshipGraph,
) -> String {
    let edges = graph
        .relationships
        .iter()
        .map(|r| format!("- {} -> {} ({})", r.from, r.to, r.label))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Project `{project_name}` summary:

{summary}

Abstractions:

{listing}

Relationships:

{edges}

Order ALL abstractions for a tutorial: start with the most foundational or
user-facing concepts, then move to the details that depend on them. Every
index must appear exactly once.

Respond with exactly one fenced yaml block in this format:

```yaml
- 2 # FoundationName
- 0 # CoreName
- 1 # DetailName
```"#,
        project_name = project_name,
        summary = graph.summary,
        listing = abstraction_listing(abstractions),
        edges = edges,
    )
}

/// Validate the ordering is a permutation of `[0, abstraction_count)`.
fn parse_response(response: &str, abstraction_count: usize) -> Result<Vec<usize>> {
    let value = parse_yaml_block(response, STAGE)?;
    let Value::Sequence(items) = value else {
        return Err(ValidationError::new(STAGE, "expected a yaml sequence of indices").into());
    };

    let mut order = Vec::with_capacity(items.len());
    let mut seen = vec![false; abstraction_count];

    for raw in &items {
        let index = parse_index(raw, STAGE, "chapter_order")?;
        if index >= abstraction_count {
            return Err(ValidationError::new(STAGE, "abstraction index out of range")
                .with_field("chapter_order")
                .with_comparison(format!("0..{}", abstraction_count), index.to_string())
                .into());
        }
        if seen[index] {
            return Err(ValidationError::new(STAGE, "duplicate abstraction index")
                .with_field("chapter_order")
                .with_comparison("each index exactly once", format!("index {} repeated", index))
                .into());
        }
        seen[index] = true;
        order.push(index);
    }

    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(ValidationError::new(STAGE, "missing abstraction index")
            .with_field("chapter_order")
            .with_comparison("each index exactly once", format!("index {} absent", missing))
            .into());
    }

    Ok(order)
}
