use std::ops::Range;

/// A named region declared by `{% block NAME %} … {% endblock %}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// The block name as written in the open directive.
    pub name: String,
    /// Text of the first comment directive nested directly in this block,
    /// or empty when there is none.
    pub comment: String,
    /// Literal content of the block with nested blocks and comments removed.
    /// `None` when nothing but whitespace remains.
    pub default_value: Option<String>,
    /// Blocks nested directly inside this one, in source order.
    pub children: Vec<Block>,
    /// Byte span in source, from the open directive to the end of the close directive.
    pub span: Range<usize>,
}

impl Block {
    pub fn new(name: impl Into<String>, span: Range<usize>) -> Self {
        Block {
            name: name.into(),
            comment: String::new(),
            default_value: None,
            children: Vec::new(),
            span,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth of the subtree rooted here (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Block::depth).max().unwrap_or(0)
    }

    /// Preorder walk of this block and its descendants with their depth
    /// relative to this block.
    pub fn walk(&self) -> impl Iterator<Item = (usize, &Block)> {
        let mut stack = vec![(0usize, self)];
        std::iter::from_fn(move || {
            let (depth, block) = stack.pop()?;
            for child in block.children.iter().rev() {
                stack.push((depth + 1, child));
            }
            Some((depth, block))
        })
    }

    /// Find a descendant by dotted path relative to this block (`inner.leaf`).
    pub fn find(&self, path: &str) -> Option<&Block> {
        path.split('.').try_fold(self, |block, name| {
            block.children.iter().find(|c| c.name == name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Block {
        let mut leaf = Block::new("c", 0..0);
        leaf.default_value = Some("x".into());
        let mut mid = Block::new("b", 0..0);
        mid.children.push(leaf);
        let mut root = Block::new("a", 0..0);
        root.children.push(mid);
        root.children.push(Block::new("d", 0..0));
        root
    }

    #[test]
    fn new_blocks_do_not_share_children() {
        let mut first = Block::new("first", 0..0);
        let second = Block::new("second", 0..0);
        first.children.push(Block::new("child", 0..0));
        assert_eq!(first.children.len(), 1);
        assert!(second.children.is_empty());
    }

    #[test]
    fn walk_is_preorder() {
        let root = tree();
        let names: Vec<(usize, &str)> = root.walk().map(|(d, b)| (d, b.name.as_str())).collect();
        assert_eq!(names, vec![(0, "a"), (1, "b"), (2, "c"), (1, "d")]);
    }

    #[test]
    fn find_by_path() {
        let root = tree();
        assert_eq!(root.find("b.c").and_then(|b| b.default_value.as_deref()), Some("x"));
        assert!(root.find("b.x").is_none());
        assert_eq!(root.depth(), 3);
    }

    #[test]
    fn leaves() {
        let root = tree();
        let leaves: Vec<&str> = root
            .walk()
            .filter(|(_, b)| b.is_leaf())
            .map(|(_, b)| b.name.as_str())
            .collect();
        assert_eq!(leaves, vec!["c", "d"]);
        assert!(!root.is_leaf());
    }
}
