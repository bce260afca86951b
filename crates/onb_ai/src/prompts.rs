use crate::evidence::Excerpt;

pub fn excerpt_blocks(excerpts: &[Excerpt]) -> String {
    if excerpts.is_empty() {
        return "(no sources are ready yet)".to_string();
    }
    excerpts
        .iter()
        .map(|ex| format!("[{}] source=\"{}\"\n{}", ex.number, ex.source_title, ex.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn answer_prompt(question: &str, excerpt_blocks: &str) -> String {
    // Contract with the model:
    // - answer only from the numbered excerpts;
    // - cite with bare [n] markers matching excerpt numbers;
    // - say so when the excerpts do not cover the question.
    format!(
        r#"You are a research assistant answering questions about the user's notebook sources.

Rules (non-negotiable):
1) Use ONLY the numbered excerpts below. Do not invent facts.
2) After every claim, cite the excerpt it comes from with its number in square brackets, e.g. [2].
3) Only cite numbers that appear below. Never write any other bracketed numbers.
4) If the excerpts do not answer the question, say that plainly and do not cite.

Question:
{question}

Excerpts:
{excerpt_blocks}

Output:
- Plain prose, no headings.
- Inline [n] citations as specified.
"#
    )
}
