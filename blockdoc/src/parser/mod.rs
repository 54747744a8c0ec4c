pub mod error;

pub use error::ParseError;

use crate::Template;
use crate::markup;
use crate::translate::{BLOCK_TAG, translate};
use crate::tree;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Extract the block tree from the template source.
    ///
    /// Any nesting error aborts the whole parse; no partial tree is returned.
    pub fn parse(&self) -> Result<Template, ParseError> {
        let translation = translate(&self.source);
        tracing::debug!(
            directives = translation.tags.len(),
            bytes = translation.markup.len(),
            "translated template to markup"
        );

        let root = markup::parse(&translation, self.file_id)?;
        let blocks = tree::build_blocks(root.elements(BLOCK_TAG), &self.source, self.file_id)?;
        tracing::debug!(top_level = blocks.len(), "built block tree");

        Ok(Template {
            blocks,
            source_id: self.file_id,
        })
    }
}

/// Parse a template held in memory, using file id 0.
pub fn parse(source: &str) -> Result<Template, ParseError> {
    Parser::new(source.to_string(), 0).parse()
}
