//! Presentation of skeleton text: HTML with a scoped stylesheet, or
//! colored terminal output.

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::LazyLock;

use codespan_reporting::term::termcolor::{Color, ColorSpec, WriteColor};
use quick_xml::escape::escape;
use regex::Regex;

use crate::skeleton::DEFAULT_LABEL;

/// CSS class scoping every highlighted fragment.
pub const CSS_SCOPE: &str = "blockdoc";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)(?P<comment>\{#.*?#\})",
        r"|(?P<open>\{%[-+]?)(?P<ws>\s*)(?P<keyword>endblock|block)\b(?P<rest>[^%]*?)(?P<close>[-+]?%\})",
        r"|(?P<label>Default:)",
    ))
    .unwrap()
});

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s+)(\w+)(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    /// `{%` / `%}` delimiters.
    Delimiter,
    /// `block` / `endblock`.
    Keyword,
    BlockName,
    /// A whole `{# … #}` comment.
    Comment,
    /// The `Default:` label.
    Label,
}

impl TokenKind {
    fn class(self) -> Option<&'static str> {
        match self {
            TokenKind::Text => None,
            TokenKind::Delimiter => Some("d"),
            TokenKind::Keyword => Some("k"),
            TokenKind::BlockName => Some("n"),
            TokenKind::Comment => Some("c"),
            TokenKind::Label => Some("l"),
        }
    }
}

/// Split skeleton text into highlight tokens. Concatenating the token texts
/// gives back the input.
pub fn tokenize(text: &str) -> Vec<(TokenKind, &str)> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in TOKEN.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            tokens.push((TokenKind::Text, &text[last..whole.start()]));
        }

        if caps.name("comment").is_some() {
            tokens.push((TokenKind::Comment, whole.as_str()));
        } else if caps.name("label").is_some() {
            tokens.push((TokenKind::Label, whole.as_str()));
        } else {
            let group = |name: &str| caps.name(name).map(|m| m.as_str()).unwrap_or_default();
            tokens.push((TokenKind::Delimiter, group("open")));
            push_nonempty(&mut tokens, TokenKind::Text, group("ws"));
            tokens.push((TokenKind::Keyword, group("keyword")));

            let rest = group("rest");
            match NAME.captures(rest) {
                Some(name) => {
                    let part = |i: usize| name.get(i).map(|m| m.as_str()).unwrap_or_default();
                    tokens.push((TokenKind::Text, part(1)));
                    tokens.push((TokenKind::BlockName, part(2)));
                    push_nonempty(&mut tokens, TokenKind::Text, part(3));
                }
                None => push_nonempty(&mut tokens, TokenKind::Text, rest),
            }
            tokens.push((TokenKind::Delimiter, group("close")));
        }
        last = whole.end();
    }

    if last < text.len() {
        tokens.push((TokenKind::Text, &text[last..]));
    }
    tokens
}

fn push_nonempty<'t>(tokens: &mut Vec<(TokenKind, &'t str)>, kind: TokenKind, text: &'t str) {
    if !text.is_empty() {
        tokens.push((kind, text));
    }
}

// ---------------------------------------------------------------------------
// Styles
// ---------------------------------------------------------------------------

type Rgb = (u8, u8, u8);

/// Colors for each token kind.
struct Palette {
    background: Rgb,
    text: Rgb,
    delimiter: Rgb,
    keyword: Rgb,
    name: Rgb,
    comment: Rgb,
    label: Rgb,
}

/// Named highlight styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Default,
    Monokai,
    SolarizedLight,
    SolarizedDark,
}

impl Style {
    pub const ALL: [Style; 4] = [
        Style::Default,
        Style::Monokai,
        Style::SolarizedLight,
        Style::SolarizedDark,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Style::Default => "default",
            Style::Monokai => "monokai",
            Style::SolarizedLight => "solarized-light",
            Style::SolarizedDark => "solarized-dark",
        }
    }

    fn palette(self) -> Palette {
        match self {
            Style::Default => Palette {
                background: (0xf8, 0xf8, 0xf8),
                text: (0x33, 0x33, 0x33),
                delimiter: (0xbc, 0x7a, 0x00),
                keyword: (0x00, 0x80, 0x00),
                name: (0x00, 0x00, 0xff),
                comment: (0x40, 0x80, 0x80),
                label: (0xaa, 0x22, 0xff),
            },
            Style::Monokai => Palette {
                background: (0x27, 0x28, 0x22),
                text: (0xf8, 0xf8, 0xf2),
                delimiter: (0xf9, 0x26, 0x72),
                keyword: (0x66, 0xd9, 0xef),
                name: (0xa6, 0xe2, 0x2e),
                comment: (0x75, 0x71, 0x5e),
                label: (0xe6, 0xdb, 0x74),
            },
            Style::SolarizedLight => Palette {
                background: (0xfd, 0xf6, 0xe3),
                text: (0x65, 0x7b, 0x83),
                delimiter: (0xcb, 0x4b, 0x16),
                keyword: (0x85, 0x99, 0x00),
                name: (0x26, 0x8b, 0xd2),
                comment: (0x93, 0xa1, 0xa1),
                label: (0x6c, 0x71, 0xc4),
            },
            Style::SolarizedDark => Palette {
                background: (0x00, 0x2b, 0x36),
                text: (0x83, 0x94, 0x96),
                delimiter: (0xcb, 0x4b, 0x16),
                keyword: (0x85, 0x99, 0x00),
                name: (0x26, 0x8b, 0xd2),
                comment: (0x58, 0x6e, 0x75),
                label: (0x6c, 0x71, 0xc4),
            },
        }
    }

    /// Stylesheet for HTML produced by [`html`] with this style.
    pub fn css(self) -> String {
        let p = self.palette();
        let rule = |class: &str, color: Rgb, extra: &str| {
            format!(
                ".{} .{} {{ color: {}{} }}\n",
                CSS_SCOPE,
                class,
                hex(color),
                extra
            )
        };

        let mut css = format!(
            ".{} {{ background: {}; color: {}; }}\n",
            CSS_SCOPE,
            hex(p.background),
            hex(p.text)
        );
        css.push_str(&rule("d", p.delimiter, ";"));
        css.push_str(&rule("k", p.keyword, "; font-weight: bold;"));
        css.push_str(&rule("n", p.name, ";"));
        css.push_str(&rule("c", p.comment, "; font-style: italic;"));
        css.push_str(&rule("l", p.label, "; font-weight: bold;"));
        css
    }

    fn color_spec(self, kind: TokenKind) -> ColorSpec {
        let p = self.palette();
        let (color, bold, italic) = match kind {
            TokenKind::Text => return ColorSpec::new(),
            TokenKind::Delimiter => (p.delimiter, false, false),
            TokenKind::Keyword => (p.keyword, true, false),
            TokenKind::BlockName => (p.name, false, false),
            TokenKind::Comment => (p.comment, false, true),
            TokenKind::Label => (p.label, true, false),
        };
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Rgb(color.0, color.1, color.2)))
            .set_bold(bold)
            .set_italic(italic);
        spec
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Style::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Style::ALL.iter().map(|st| st.name()).collect();
                format!("unknown style '{}' (available: {})", s, names.join(", "))
            })
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn hex((r, g, b): Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// An HTML fragment and the stylesheet it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    pub css: String,
    pub html: String,
}

impl Highlighted {
    /// Stylesheet and markup as one standalone fragment.
    pub fn to_fragment(&self) -> String {
        format!("<style>\n{}</style>\n{}", self.css, self.html)
    }
}

/// Highlight skeleton text as HTML.
pub fn html(text: &str, style: Style) -> Highlighted {
    let mut html = format!(r#"<div class="{}"><pre>"#, CSS_SCOPE);
    for (kind, token) in tokenize(text) {
        match kind.class() {
            Some(class) => {
                html.push_str(&format!(r#"<span class="{}">{}</span>"#, class, escape(token)));
            }
            None => html.push_str(&escape(token)),
        }
    }
    html.push_str("</pre></div>\n");

    Highlighted {
        css: style.css(),
        html,
    }
}

/// Write skeleton text to a color-capable writer.
pub fn write_colored<W: WriteColor + ?Sized>(text: &str, style: Style, out: &mut W) -> io::Result<()> {
    for (kind, token) in tokenize(text) {
        if kind == TokenKind::Text {
            out.reset()?;
        } else {
            out.set_color(&style.color_spec(kind))?;
        }
        out.write_all(token.as_bytes())?;
    }
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKELETON: &str = "{% block content %}\n    {# doc <b> #}\n    Default: Hi & bye\n{% endblock content %}\n";

    #[test]
    fn tokens_cover_input() {
        let joined: String = tokenize(SKELETON).into_iter().map(|(_, t)| t).collect();
        assert_eq!(joined, SKELETON);
    }

    #[test]
    fn classifies_tokens() {
        let tokens = tokenize("{% block content %}");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Delimiter, "{%"),
                (TokenKind::Text, " "),
                (TokenKind::Keyword, "block"),
                (TokenKind::Text, " "),
                (TokenKind::BlockName, "content"),
                (TokenKind::Text, " "),
                (TokenKind::Delimiter, "%}"),
            ]
        );
        assert!(tokenize(SKELETON).contains(&(TokenKind::Label, DEFAULT_LABEL)));
        assert!(tokenize(SKELETON).contains(&(TokenKind::Comment, "{# doc <b> #}")));
    }

    #[test]
    fn html_escapes_text() {
        let out = html(SKELETON, Style::Default);
        assert!(out.html.starts_with(r#"<div class="blockdoc"><pre>"#));
        assert!(out.html.contains(r#"<span class="c">{# doc &lt;b&gt; #}</span>"#));
        assert!(out.html.contains("Hi &amp; bye"));
        assert!(out.css.contains(".blockdoc .k"));
    }

    #[test]
    fn parses_style_names() {
        assert_eq!("monokai".parse::<Style>(), Ok(Style::Monokai));
        assert_eq!("Solarized-Dark".parse::<Style>(), Ok(Style::SolarizedDark));
        assert!("nope".parse::<Style>().unwrap_err().contains("solarized-light"));
    }

    #[test]
    fn styles_differ() {
        assert_ne!(Style::Default.css(), Style::Monokai.css());
    }
}
