//! Filename and text cleanup helpers.

use regex::Regex;

/// Sanitize a title for use in a filename.
///
/// Replaces filesystem-hostile characters and whitespace runs with `_`,
/// then truncates to 100 characters.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => out.push('_'),
            c => out.push(c),
        }
    }
    out.chars().take(100).collect()
}

/// Collapse runs of three or more newlines down to a paragraph break.
pub fn collapse_blank_lines(text: &str) -> String {
    let re = Regex::new(r"\n{3,}").unwrap();
    re.replace_all(text, "\n\n").into_owned()
}

/// Normalize inline whitespace: trim and collapse interior runs to one space.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_specials() {
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("what? <why> | \"how\""), "what___why_____how_");
    }

    #[test]
    fn test_sanitize_filename_whitespace_runs() {
        assert_eq!(sanitize_filename("hello   world"), "hello_world");
        assert_eq!(sanitize_filename("tab\t\tand\nnewline"), "tab_and_newline");
    }

    #[test]
    fn test_sanitize_filename_truncates() {
        let long = "x".repeat(250);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  a \n b\tc  "), "a b c");
    }
}
