//! Prompt construction for the conversation model.

use crate::conversation::Speaker;
use crate::feed::PaperItem;

/// Literal example of the reply shape the model must follow.
pub fn output_template() -> String {
    format!(
        r#"{{
    "conversation": [
        {{"speaker": "{}", "text": ""}},
        {{"speaker": "{}", "text": ""}}
    ]
}}"#,
        Speaker::HostA.name(),
        Speaker::HostB.name()
    )
}

/// Render the day's papers into a single instruction for the model.
///
/// Deterministic for a given `items`. An empty slice still produces a
/// complete prompt, just with no papers listed.
pub fn build_prompt(items: &[PaperItem]) -> String {
    let paper_summaries = items
        .iter()
        .map(|item| format!("- {} ({}): {}", item.title, item.link, item.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Welcome to Daily Papers! Today we're diving into the latest AI research in an engaging, informative discussion. Aim for a medium-length episode that is natural and insightful while covering the key points of each paper.

Here are today's research papers:
{papers}

Turn this into a conversational podcast between two experts, {host_a} and {host_b}. Keep the flow natural with a mix of insightful analysis, casual phrasing and the occasional filler word like "uhm" or "you know". The tone should be engaging yet professional.

Discuss every paper meaningfully without dragging the conversation out. Focus on key insights and practical takeaways, and keep the pacing dynamic and interactive.

Return the conversation in exactly this JSON format:
{template}"#,
        papers = paper_summaries,
        host_a = Speaker::HostA.name(),
        host_b = Speaker::HostB.name(),
        template = output_template(),
    )
}
