//! Strips characters that are illegal in documents before parsing.
//!
//! Exported model files occasionally carry raw control characters, or
//! numeric character references to them such as `&#x08;` and `&#08;`.
//! Both forms are removed; everything else passes through untouched.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::error::Result;

lazy_static! {
    // Control characters outside the legal set (tab, newline, carriage
    // return are kept), plus references spelling out the same characters.
    static ref ILLEGAL: Regex = Regex::new(
        "[\u{00}-\u{08}\u{0B}\u{0C}\u{0E}-\u{1F}]|&#x0*[0-8bcefBCEF];|&#x0*1[0-9a-fA-F];|&#0*[0-8];|&#0*1[124-9];|&#0*2[0-9];|&#0*3[01];"
    )
    .unwrap();
}

/// Remove illegal characters from document text.
///
/// Borrows the input unchanged when it is already clean.
pub fn sanitize_str(text: &str) -> Cow<'_, str> {
    let cleaned = ILLEGAL.replace_all(text, "");
    if let Cow::Owned(_) = cleaned {
        warn!(
            removed = text.len() - cleaned.len(),
            "removed illegal characters from document"
        );
    }
    cleaned
}

/// Sanitize a document file into a new file, returning the number of
/// bytes written.
pub fn sanitize_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<u64> {
    let text = fs::read_to_string(src)?;
    let cleaned = sanitize_str(&text);
    fs::write(dst.as_ref(), cleaned.as_bytes())?;
    Ok(cleaned.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_is_borrowed() {
        let text = "<t_object>\n  <name>Base</name>\n</t_object>";
        assert!(matches!(sanitize_str(text), Cow::Borrowed(_)));
    }

    #[test]
    fn control_characters_are_removed() {
        assert_eq!(sanitize_str("a\u{08}b\u{0B}c"), "abc");
    }

    #[test]
    fn numeric_references_are_removed() {
        assert_eq!(sanitize_str("a&#x8;b&#08;c&#x1F;d"), "abcd");
    }

    #[test]
    fn legal_whitespace_survives() {
        assert_eq!(sanitize_str("a\tb\nc\rd"), "a\tb\nc\rd");
    }

    #[test]
    fn legal_references_survive() {
        assert_eq!(sanitize_str("P &amp; L &#65;"), "P &amp; L &#65;");
    }

    #[test]
    fn files_sanitize_to_a_new_file() {
        let dir = std::env::temp_dir();
        let src = dir.join("modelkit_sanitize_src.xml");
        let dst = dir.join("modelkit_sanitize_dst.xml");
        fs::write(&src, "<name>Ba\u{08}se</name>").unwrap();
        let written = sanitize_file(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "<name>Base</name>");
        assert_eq!(written, "<name>Base</name>".len() as u64);
        let _ = fs::remove_file(&src);
        let _ = fs::remove_file(&dst);
    }
}
