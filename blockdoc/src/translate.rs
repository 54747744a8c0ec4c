//! Rewrites block and comment directives into synthetic XML tags.
//!
//! Everything that is not a recognized directive is escaped and passed
//! through untouched. The whole result is wrapped in a single root element,
//! so templates with several top-level blocks still form one tree.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::escape::escape;

pub const ROOT_TAG: &str = "root";
pub const BLOCK_TAG: &str = "block";
pub const COMMENT_TAG: &str = "comment";
pub const NAME_ATTR: &str = "data-name";

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\{%[-+]?\s*block\s+(?P<open>\w+)[^%]*%\}",
        r"|(?P<close>\{%[-+]?\s*endblock\b(?:\s+(?P<close_name>\w+))?[^%]*%\})",
        r"|(?P<comment_open>\{#)",
        r"|(?P<comment_close>#\})",
    ))
    .unwrap()
});

/// Which directive a synthetic tag stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    BlockOpen { name: String },
    /// `{% endblock [NAME] %}`; the name is recorded but never required to match.
    BlockClose { name: Option<String> },
    CommentOpen,
    CommentClose,
}

impl TagKind {
    /// The source syntax this tag was produced from, for messages.
    pub fn describe(&self) -> String {
        match self {
            TagKind::BlockOpen { name } => format!("{{% block {} %}}", name),
            TagKind::BlockClose { name: Some(name) } => format!("{{% endblock {} %}}", name),
            TagKind::BlockClose { name: None } => "{% endblock %}".to_string(),
            TagKind::CommentOpen => "{#".to_string(),
            TagKind::CommentClose => "#}".to_string(),
        }
    }

    fn markup(&self) -> String {
        match self {
            TagKind::BlockOpen { name } => {
                format!(r#"<{} {}="{}">"#, BLOCK_TAG, NAME_ATTR, escape(name))
            }
            TagKind::BlockClose { .. } => format!("</{}>", BLOCK_TAG),
            TagKind::CommentOpen => format!("<{}>", COMMENT_TAG),
            TagKind::CommentClose => format!("</{}>", COMMENT_TAG),
        }
    }
}

/// One synthetic tag and the directive it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticTag {
    pub kind: TagKind,
    /// Byte span of the directive in the template source.
    pub span: Range<usize>,
    /// Byte offset of the tag in the translated markup.
    pub markup_offset: usize,
}

/// Translated markup plus the map from its tags back to source directives.
#[derive(Debug, Clone)]
pub struct Translation {
    pub markup: String,
    /// Every synthetic tag except the root wrapper, in document order.
    pub tags: Vec<SyntheticTag>,
    /// Length of the template source, the span of the root wrapper.
    pub source_len: usize,
}

impl Translation {
    /// The last synthetic tag starting at or before `offset` in the markup.
    pub fn tag_at(&self, offset: usize) -> Option<&SyntheticTag> {
        let idx = self.tags.partition_point(|t| t.markup_offset <= offset);
        idx.checked_sub(1).map(|i| &self.tags[i])
    }
}

/// Translate template source into markup for the tree parser.
pub fn translate(source: &str) -> Translation {
    let mut markup = String::with_capacity(source.len() + source.len() / 4 + 16);
    let mut tags = Vec::new();
    let mut last = 0;

    markup.push_str(&format!("<{}>", ROOT_TAG));

    for caps in DIRECTIVE.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        markup.push_str(&escape(&source[last..whole.start()]));

        let kind = if let Some(name) = caps.name("open") {
            TagKind::BlockOpen {
                name: name.as_str().to_string(),
            }
        } else if caps.name("close").is_some() {
            TagKind::BlockClose {
                name: caps.name("close_name").map(|m| m.as_str().to_string()),
            }
        } else if caps.name("comment_open").is_some() {
            TagKind::CommentOpen
        } else {
            TagKind::CommentClose
        };

        tags.push(SyntheticTag {
            span: whole.range(),
            markup_offset: markup.len(),
            kind: kind.clone(),
        });
        markup.push_str(&kind.markup());
        last = whole.end();
    }

    markup.push_str(&escape(&source[last..]));
    markup.push_str(&format!("</{}>", ROOT_TAG));

    tracing::trace!(directives = tags.len(), "translated template");

    Translation {
        markup,
        tags,
        source_len: source.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_directives() {
        let t = translate("{% block content %}{# doc #}<b>hi</b>{% endblock %}");
        assert_eq!(
            t.markup,
            r#"<root><block data-name="content"><comment> doc </comment>&lt;b&gt;hi&lt;/b&gt;</block></root>"#
        );
    }

    #[test]
    fn accepts_modifiers_and_whitespace_control() {
        let t = translate("{%- block title scoped -%}x{%- endblock title -%}");
        assert_eq!(t.markup, r#"<root><block data-name="title">x</block></root>"#);
        assert_eq!(
            t.tags[1].kind,
            TagKind::BlockClose {
                name: Some("title".into())
            }
        );
    }

    #[test]
    fn endblock_is_not_an_open_directive() {
        let t = translate("{% endblock %}");
        assert_eq!(t.tags.len(), 1);
        assert_eq!(t.tags[0].kind, TagKind::BlockClose { name: None });
    }

    #[test]
    fn other_directives_pass_through() {
        let t = translate("{% if user %}{{ user.name }}{% endif %}");
        assert!(t.tags.is_empty());
        assert_eq!(t.markup, "<root>{% if user %}{{ user.name }}{% endif %}</root>");
    }

    #[test]
    fn records_source_spans() {
        let source = "ab{% block x %}cd{% endblock %}";
        let t = translate(source);
        assert_eq!(&source[t.tags[0].span.clone()], "{% block x %}");
        assert_eq!(&source[t.tags[1].span.clone()], "{% endblock %}");
        assert!(t.markup[t.tags[1].markup_offset..].starts_with("</block>"));
    }

    #[test]
    fn tag_lookup_by_markup_offset() {
        let t = translate("{% block a %}{% block b %}{% endblock %}{% endblock %}");
        assert!(t.tag_at(0).is_none());
        let second = t.tags[1].markup_offset;
        assert_eq!(
            t.tag_at(second + 3).map(|tag| &tag.kind),
            Some(&TagKind::BlockOpen { name: "b".into() })
        );
    }
}
