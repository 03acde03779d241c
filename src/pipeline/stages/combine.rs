//! Combine Tutorial Stage
//!
//! Pure assembly, no LLM calls: derives the abstraction dependency diagram,
//! builds the index document (summary, diagram, table of contents), and
//! appends a navigation trailer to each chapter body.

use tracing::info;

use crate::types::{Abstraction, ChapterContent, RelationshipGraph};

use super::chapters::table_of_contents;

pub const STAGE: &str = "combine_tutorial";

/// Final output: one `(filename, content)` pair per document.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorialFiles {
    pub files: Vec<(String, String)>,
}

/// Assemble the final tutorial document set.
pub struct CombineTutorial;

impl CombineTutorial {
    pub fn run(
        project_name: &str,
        repo_url: &str,
        abstractions: &[Abstraction],
        graph: &RelationshipGraph,
        chapter_order: &[usize],
        chapters: &[ChapterContent],
    ) -> TutorialFiles {
        let diagram = dependency_diagram(abstractions, graph);
        let toc = table_of_contents(abstractions, chapter_order);

        let index = format!(
            "# Tutorial: {project_name}\n\n\
             {summary}\n\n\
             Source repository: <{repo_url}>\n\n\
             ## Abstraction Map\n\n\
             ```mermaid\n{diagram}```\n\n\
             ## Chapters\n\n\
             {toc}\n\n\
             {trailer}",
            project_name = project_name,
            summary = graph.summary.trim(),
            repo_url = repo_url,
            diagram = diagram,
            toc = toc,
            trailer = generated_trailer(),
        );

        let mut files = Vec::with_capacity(chapters.len() + 1);
        files.push(("index.md".to_string(), index));

        for (position, chapter) in chapters.iter().enumerate() {
            let nav = chapter_nav(chapters, position);
            let content = format!(
                "{body}\n\n---\n\n{nav}\n\n{trailer}",
                body = chapter.body.trim_end(),
                nav = nav,
                trailer = generated_trailer(),
            );
            files.push((chapter.filename.clone(), content));
        }

        info!("Combined tutorial: {} documents", files.len());
        TutorialFiles { files }
    }
}

/// Render the abstraction graph as a Mermaid flowchart.
pub fn dependency_diagram(abstractions: &[Abstraction], graph: &RelationshipGraph) -> String {
    let mut out = String::from("flowchart TD\n");

    for (i, abstraction) in abstractions.iter().enumerate() {
        out.push_str(&format!("    A{}[\"{}\"]\n", i, escape(&abstraction.name)));
    }

    for relationship in &graph.relationships {
        out.push_str(&format!(
            "    A{} -- \"{}\" --> A{}\n",
            relationship.from,
            escape(&relationship.label),
            relationship.to
        ));
    }

    out
}

/// Previous/next navigation line for a chapter.
fn chapter_nav(chapters: &[ChapterContent], position: usize) -> String {
    let previous = position
        .checked_sub(1)
        .and_then(|p| chapters.get(p))
        .map(|c| format!("Previous: [{}]({})", c.title, c.filename));
    let next = chapters
        .get(position + 1)
        .map(|c| format!("Next: [{}]({})", c.title, c.filename));

    match (previous, next) {
        (Some(p), Some(n)) => format!("{} · {}", p, n),
        (Some(p), None) => p,
        (None, Some(n)) => n,
        (None, None) => "[Back to index](index.md)".to_string(),
    }
}

fn generated_trailer() -> &'static str {
    "*Generated by [codetome](https://github.com/junyeong-ai/codetome).*"
}

fn escape(text: &str) -> String {
    text.replace('"', "'")
}
