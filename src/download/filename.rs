//! Filesystem-safe names for course and article titles.

/// Maximum length (in chars) of a sanitized name, leaving room for extensions.
const MAX_NAME_CHARS: usize = 200;

/// Replacement used when a title sanitizes to nothing.
const EMPTY_NAME_FALLBACK: &str = "untitled";

/// Maps an arbitrary title to a name safe for every common filesystem.
///
/// Path separators, Windows-reserved characters and control characters
/// become `_`; runs of replacements collapse to one. Surrounding whitespace
/// and trailing dots are trimmed. The mapping is deterministic so artifact
/// paths are stable across runs.
///
/// # Examples
///
/// ```
/// use course_downloader::download::sanitize_filename;
///
/// assert_eq!(sanitize_filename("01 | Intro: why/how?"), "01 _ Intro_ why_how_");
/// assert_eq!(sanitize_filename("   "), "untitled");
/// ```
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut prev_replaced = false;
    for ch in title.trim().chars() {
        let replaced = matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            || ch.is_control();
        if replaced {
            if !prev_replaced {
                out.push('_');
            }
        } else {
            out.push(ch);
        }
        prev_replaced = replaced;
    }

    let truncated: String = out.chars().take(MAX_NAME_CHARS).collect();
    let trimmed = truncated.trim_end_matches(['.', ' ']).trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        EMPTY_NAME_FALLBACK.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_plain_titles() {
        assert_eq!(sanitize_filename("Rust in Action"), "Rust in Action");
        assert_eq!(sanitize_filename("开篇词 | 为什么学"), "开篇词 _ 为什么学");
    }

    #[test]
    fn test_sanitize_replaces_separators_and_reserved() {
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("what? <really>"), "what_ _really_");
    }

    #[test]
    fn test_sanitize_collapses_replacement_runs() {
        assert_eq!(sanitize_filename("a//??b"), "a_b");
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_filename("line\nbreak\t"), "line_break");
    }

    #[test]
    fn test_sanitize_trims_trailing_dots() {
        assert_eq!(sanitize_filename("ending..."), "ending");
    }

    #[test]
    fn test_sanitize_empty_fallback() {
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename("///"), "untitled");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_sanitize_is_deterministic() {
        let title = "第 12 讲: 并发/并行";
        assert_eq!(sanitize_filename(title), sanitize_filename(title));
    }
}
