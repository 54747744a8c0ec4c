pub mod block;
pub mod escape;
pub mod markup;
pub mod parser;
pub mod translate;
pub mod tree;

use crate::block::Block;

/// The block structure extracted from one template source.
#[derive(Debug, Clone)]
pub struct Template {
    /// Top-level blocks, in source order.
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Template {
    /// Iterate over every block in the template, parents before children.
    pub fn walk(&self) -> impl Iterator<Item = (usize, &Block)> {
        self.blocks.iter().flat_map(|b| b.walk())
    }

    /// Look up a block by its dotted path from the top level (`content.inner`).
    pub fn find(&self, path: &str) -> Option<&Block> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let top = self.blocks.iter().find(|b| b.name == head)?;
        match rest {
            Some(rest) => top.find(rest),
            None => Some(top),
        }
    }
}
