//! Generic element tree over the translated markup.
//!
//! quick-xml does the tokenizing; this module assembles its events into a
//! tree with an explicit stack of open elements and maps every element back
//! to the directives it came from. Text is kept exactly as it appears in the
//! markup, still escaped.

use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::parser::error::ParseError;
use crate::translate::{BLOCK_TAG, NAME_ATTR, ROOT_TAG, TagKind, Translation};

/// Deepest directive nesting accepted, counting blocks and comments.
pub const MAX_NESTING: usize = 128;

/// A node of the element tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Raw markup text; entity references are left unexpanded.
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    /// Attributes with their raw (escaped) values.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// Byte span in the template source covered by the element's directives.
    pub span: Range<usize>,
    /// Byte span in the template source between the open and close directives.
    pub inner: Range<usize>,
}

impl Element {
    fn new(tag: String, attrs: Vec<(String, String)>, open: Range<usize>) -> Self {
        Element {
            tag,
            attrs,
            children: Vec::new(),
            span: open.start..open.end,
            inner: open.end..open.end,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements with the given tag, in document order.
    pub fn elements<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.tag == tag => Some(el),
            _ => None,
        })
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }
}

/// Parse translated markup into its root element.
pub fn parse(translation: &Translation, file_id: usize) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(&translation.markup);
    reader.config_mut().trim_text(false);
    // Nesting is checked against the source map below, with source spans.
    reader.config_mut().check_end_names = false;

    let mut state = TreeState::new(translation, file_id);

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                let offset = reader.error_position() as usize;
                return Err(state.reader_error(err.to_string(), offset));
            }
        };

        match event {
            Event::Start(e) => state.open(&reader, &e)?,
            Event::End(e) => {
                let name = reader
                    .decoder()
                    .decode(e.name().as_ref())
                    .map_err(|err| state.reader_error(err.to_string(), 0))?
                    .into_owned();
                if let Some(root) = state.close(&name)? {
                    return Ok(root);
                }
            }
            Event::Text(e) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|err| state.reader_error(err.to_string(), 0))?;
                state.text(&text);
            }
            Event::GeneralRef(e) => {
                let name = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|err| state.reader_error(err.to_string(), 0))?;
                state.text(&format!("&{};", name));
            }
            Event::Eof => return Err(state.unexpected_eof()),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tree state
// ---------------------------------------------------------------------------

struct Frame {
    element: Element,
    /// Index of the opening tag in the source map; `None` for the root wrapper.
    open_tag: Option<usize>,
}

struct TreeState<'a> {
    translation: &'a Translation,
    file_id: usize,
    stack: Vec<Frame>,
    /// Index of the next synthetic tag expected from the reader.
    next_tag: usize,
}

impl<'a> TreeState<'a> {
    fn new(translation: &'a Translation, file_id: usize) -> Self {
        TreeState {
            translation,
            file_id,
            stack: Vec::new(),
            next_tag: 0,
        }
    }

    fn take_tag(&mut self) -> Result<usize, ParseError> {
        let idx = self.next_tag;
        if idx >= self.translation.tags.len() {
            return Err(ParseError::error(
                "markup contains a tag with no matching directive",
                0..0,
                self.file_id,
            ));
        }
        self.next_tag += 1;
        Ok(idx)
    }

    fn open(&mut self, reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<(), ParseError> {
        let tag = reader
            .decoder()
            .decode(start.name().as_ref())
            .map_err(|err| self.reader_error(err.to_string(), 0))?
            .into_owned();

        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| self.reader_error(err.to_string(), 0))?;
            let key = reader
                .decoder()
                .decode(attr.key.as_ref())
                .map_err(|err| self.reader_error(err.to_string(), 0))?
                .into_owned();
            let value = reader
                .decoder()
                .decode(&attr.value)
                .map_err(|err| self.reader_error(err.to_string(), 0))?
                .into_owned();
            attrs.push((key, value));
        }

        if tag == ROOT_TAG && self.stack.is_empty() {
            self.stack.push(Frame {
                element: Element::new(tag, attrs, 0..0),
                open_tag: None,
            });
            return Ok(());
        }

        let idx = self.take_tag()?;
        let open = self.translation.tags[idx].span.clone();
        // The root wrapper sits at the bottom of the stack.
        if self.stack.len() > MAX_NESTING {
            return Err(ParseError::error(
                format!("`{}` is nested too deeply", self.translation.tags[idx].kind.describe()),
                open,
                self.file_id,
            )
            .with_note(format!(
                "blocks and comments may be nested at most {} levels deep",
                MAX_NESTING
            )));
        }
        self.stack.push(Frame {
            element: Element::new(tag, attrs, open),
            open_tag: Some(idx),
        });
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.element.push_text(text);
        }
    }

    /// Close the innermost element. Returns the finished root once the
    /// wrapper itself is closed.
    fn close(&mut self, name: &str) -> Result<Option<Element>, ParseError> {
        if name == ROOT_TAG && self.stack.len() <= 1 {
            let Some(mut root) = self.stack.pop() else {
                return Err(self.unexpected_eof());
            };
            root.element.span = 0..self.translation.source_len;
            root.element.inner = 0..self.translation.source_len;
            return Ok(Some(root.element));
        }
        if name == ROOT_TAG {
            return Err(self.unclosed());
        }

        let translation = self.translation;
        let idx = self.take_tag()?;
        let close = &translation.tags[idx];

        if self.stack.len() <= 1 {
            return Err(ParseError::error(
                format!("unmatched `{}`", close.kind.describe()),
                close.span.clone(),
                self.file_id,
            )
            .with_note("there is no open directive for it to close"));
        }

        let Some(mut frame) = self.stack.pop() else {
            return Err(self.unexpected_eof());
        };

        if frame.element.tag != name {
            let open = frame.open_tag.map(|i| &translation.tags[i]);
            let mut err = ParseError::error(
                format!(
                    "`{}` does not close the innermost `{}`",
                    close.kind.describe(),
                    open.map(|t| t.kind.describe()).unwrap_or_default()
                ),
                close.span.clone(),
                self.file_id,
            );
            if let Some(open) = open {
                err = err.with_secondary(open.span.clone(), "still open here");
            }
            return Err(err);
        }

        if let (TagKind::BlockClose { name: Some(closing) }, Some(open)) =
            (&close.kind, frame.element.attr(NAME_ATTR))
        {
            if closing != open {
                tracing::warn!(
                    block = open,
                    endblock = closing.as_str(),
                    "endblock name does not match the block it closes"
                );
            }
        }

        frame.element.span.end = close.span.end;
        frame.element.inner.end = close.span.start;
        if let Some(parent) = self.stack.last_mut() {
            parent.element.children.push(Node::Element(frame.element));
        }
        Ok(None)
    }

    fn unclosed(&self) -> ParseError {
        let innermost = self
            .stack
            .iter()
            .rev()
            .find_map(|f| f.open_tag.map(|i| (&f.element, &self.translation.tags[i])));

        match innermost {
            Some((element, open)) => {
                let message = match &open.kind {
                    TagKind::BlockOpen { name } => format!("unclosed block `{}`", name),
                    _ => "unclosed comment".to_string(),
                };
                let note = if element.tag == BLOCK_TAG {
                    "every `{% block %}` needs a matching `{% endblock %}`"
                } else {
                    "every `{#` needs a matching `#}`"
                };
                ParseError::error(message, open.span.clone(), self.file_id).with_note(note)
            }
            None => self.unexpected_eof(),
        }
    }

    fn unexpected_eof(&self) -> ParseError {
        let end = self.translation.source_len;
        ParseError::error("unexpected end of template", end..end, self.file_id)
    }

    fn reader_error(&self, message: String, offset: usize) -> ParseError {
        let span = self
            .translation
            .tag_at(offset)
            .map(|t| t.span.clone())
            .unwrap_or(0..0);
        ParseError::error(format!("malformed template: {}", message), span, self.file_id)
    }
}
