//! File names derived from book metadata.

/// Used in place of the creator when a book names none.
pub const UNKNOWN_CREATOR: &str = "unknown";

/// `"<creator> - <title>.<extension>"`, with `creator` falling back to
/// [`UNKNOWN_CREATOR`]. `extension` may be given with or without its dot.
///
/// ```
/// use ebookfoldermanager::naming::target_file_name;
///
/// assert_eq!(target_file_name(Some("Terry Pratchett"), "Interesting Times", "epub"),
///            "Terry Pratchett - Interesting Times.epub");
/// assert_eq!(target_file_name(None, "Emotions", ".pdf"), "unknown - Emotions.pdf");
/// ```
pub fn target_file_name(creator: Option<&str>, title: &str, extension: &str) -> String {
    let creator = creator
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CREATOR);
    let extension = extension.trim_start_matches('.');

    let stem = format!("{} - {}", component(creator), component(title.trim()));
    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}

/// Keep a metadata string from escaping its directory.
fn component(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_keep_punctuation() {
        assert_eq!(
            target_file_name(
                Some("John Doe"),
                "World Unbound: Freedom for Earth or Death (The System Apocalypse Book 6)",
                "epub"
            ),
            "John Doe - World Unbound: Freedom for Earth or Death (The System Apocalypse Book 6).epub"
        );
    }

    #[test]
    fn separators_are_replaced() {
        assert_eq!(target_file_name(Some("A/B"), "C\\D", "pdf"), "A_B - C_D.pdf");
    }

    #[test]
    fn blank_creator_is_unknown() {
        assert_eq!(target_file_name(Some("  "), "T", "epub"), "unknown - T.epub");
    }

}
