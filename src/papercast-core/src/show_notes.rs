//! Show notes rendering.

use std::fmt::Write;

use crate::feed::PaperItem;

/// Numbered, markdown-ish summary of the episode's papers.
pub fn build_show_notes(items: &[PaperItem]) -> String {
    let mut notes = String::from("**Show Notes**\n\nIn today's episode:\n\n");
    for (i, item) in items.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = write!(
            notes,
            "{}. **{}**\n   - {}\n   - [Read More]({})\n\n",
            i + 1,
            item.title,
            item.description,
            item.link
        );
    }
    notes
}
