//! Protection of literal markup delimiters.
//!
//! Template text is carried through an XML tree, so every `<`, `>` and `&`
//! in the source has to be turned into an entity reference before the
//! translated text reaches the parser, and turned back when text is pulled
//! out of the tree. Entity references belong to the markup grammar itself,
//! and `&` is escaped as well, so no source text can be mistaken for an
//! escaped delimiter.

use std::borrow::Cow;

use quick_xml::escape::{EscapeError, partial_escape, unescape as unescape_entities};

/// Replace the markup delimiters `<`, `>` and `&` with entity references.
pub fn escape(text: &str) -> Cow<'_, str> {
    partial_escape(text)
}

/// Exact inverse of [`escape`].
///
/// Fails only on text that did not come out of [`escape`], e.g. a bare `&`.
pub fn unescape(text: &str) -> Result<Cow<'_, str>, EscapeError> {
    unescape_entities(text)
}
