//! Recovers `Block`s from the element tree.
//!
//! Each block element yields its name, its documentation comment, its
//! default content and its child blocks. The walk recurses into child block
//! elements only, so blocks written inside a comment stay part of the
//! comment text, which is taken verbatim from the source. Recursion depth is
//! bounded by `markup::MAX_NESTING`.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::block::Block;
use crate::escape::unescape;
use crate::markup::{Element, Node};
use crate::parser::error::ParseError;
use crate::translate::{BLOCK_TAG, COMMENT_TAG, NAME_ATTR};

/// A newline followed by one or more blank (or whitespace-only) lines.
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t\r]*\n)+").unwrap());

/// Build blocks from sibling block elements, preserving their order.
pub fn build_blocks<'a>(
    elements: impl Iterator<Item = &'a Element>,
    source: &str,
    file_id: usize,
) -> Result<Vec<Block>, ParseError> {
    elements.map(|el| build_block(el, source, file_id)).collect()
}

fn build_block(el: &Element, source: &str, file_id: usize) -> Result<Block, ParseError> {
    let name = el.attr(NAME_ATTR).ok_or_else(|| {
        ParseError::error("block directive without a name", el.span.clone(), file_id)
    })?;
    let name = unescape_in(name, el, file_id)?.into_owned();

    let comment = match el.elements(COMMENT_TAG).next() {
        Some(comment_el) => source
            .get(comment_el.inner.clone())
            .ok_or_else(|| {
                ParseError::error("comment lies outside the template", comment_el.span.clone(), file_id)
            })?
            .trim()
            .to_string(),
        None => String::new(),
    };

    Ok(Block {
        comment,
        default_value: default_value(el, file_id)?,
        children: build_blocks(el.elements(BLOCK_TAG), source, file_id)?,
        span: el.span.clone(),
        name,
    })
}

/// The element's own text: nested blocks and comments dropped, blank lines
/// collapsed, unescaped and trimmed.
fn default_value(el: &Element, file_id: usize) -> Result<Option<String>, ParseError> {
    let raw: String = el
        .children
        .iter()
        .filter_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            Node::Element(_) => None,
        })
        .collect();

    let collapsed = BLANK_LINES.replace_all(&raw, "\n");
    let text = unescape_in(&collapsed, el, file_id)?;
    let text = text.trim();

    Ok(if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    })
}

fn unescape_in<'t>(text: &'t str, el: &Element, file_id: usize) -> Result<Cow<'t, str>, ParseError> {
    unescape(text).map_err(|err| {
        ParseError::error(
            format!("cannot restore escaped text: {}", err),
            el.span.clone(),
            file_id,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;
    use crate::translate::translate;

    fn blocks(source: &str) -> Vec<Block> {
        let root = markup::parse(&translate(source), 0).unwrap();
        build_blocks(root.elements(BLOCK_TAG), source, 0).unwrap()
    }

    #[test]
    fn default_excludes_children_and_comment() {
        let b = blocks("{% block a %}{# doc #}before{% block b %}inner{% endblock %}after{% endblock %}");
        assert_eq!(b[0].default_value.as_deref(), Some("beforeafter"));
        assert_eq!(b[0].comment, "doc");
        assert_eq!(b[0].children[0].default_value.as_deref(), Some("inner"));
    }

    #[test]
    fn blank_lines_collapse() {
        let b = blocks("{% block a %}\n  one\n\n\n  \n  two\n{% block b %}{% endblock %}\n\n  three\n{% endblock %}");
        assert_eq!(b[0].default_value.as_deref(), Some("one\n  two\n  three"));
    }

    #[test]
    fn whitespace_only_default_is_absent() {
        let b = blocks("{% block a %}\n   \n{% block b %}{% endblock %}\n{% endblock %}");
        assert_eq!(b[0].default_value, None);
        assert_eq!(b[0].children[0].default_value, None);
    }

    #[test]
    fn markup_in_defaults_is_restored() {
        let b = blocks("{% block nav %}<a href=\"/\">Home &amp; more</a>{% endblock %}");
        assert_eq!(
            b[0].default_value.as_deref(),
            Some("<a href=\"/\">Home &amp; more</a>")
        );
    }

    #[test]
    fn first_comment_documents_the_block() {
        let b = blocks("{% block a %}{# first #}x{# second #}{% endblock %}");
        assert_eq!(b[0].comment, "first");
        assert_eq!(b[0].default_value.as_deref(), Some("x"));
    }

    #[test]
    fn blocks_inside_comments_are_not_children() {
        let b = blocks("{% block a %}{# see {% block b %}x{% endblock %} #}{% endblock %}");
        assert!(b[0].children.is_empty());
        assert_eq!(b[0].comment, "see {% block b %}x{% endblock %}");
    }

    #[test]
    fn comment_keeps_directive_text_verbatim() {
        let b = blocks("{% block a %}{# see {% block b scoped %}x{% endblock b %} #}{% endblock %}");
        assert_eq!(b[0].comment, "see {% block b scoped %}x{% endblock b %}");

        let b = blocks("{% block a %}{# use {%- block b -%}{%- endblock -%} #}{% endblock %}");
        assert_eq!(b[0].comment, "use {%- block b -%}{%- endblock -%}");
        assert!(b[0].children.is_empty());
    }

    #[test]
    fn comment_is_literal_source_text() {
        let b = blocks("{% block a %}{#  <b>&amp;</b> {# inner #}  #}{% endblock %}");
        assert_eq!(b[0].comment, "<b>&amp;</b> {# inner #}");
    }
}
