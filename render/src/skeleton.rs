//! Reconstructs a template skeleton from a block tree.
//!
//! The output is itself valid block/comment directive syntax: parsing it
//! again gives a tree with the same shape, names and comments.

use std::io::{self, Write};

use blockdoc::block::Block;

const INDENT: &str = "    ";
pub const DEFAULT_LABEL: &str = "Default:";

pub fn write_skeleton<W: Write + ?Sized>(blocks: &[Block], out: &mut W) -> io::Result<()> {
    for block in blocks {
        write_block(block, 0, out)?;
    }
    Ok(())
}

pub fn skeleton(blocks: &[Block]) -> String {
    let mut buf = Vec::new();
    let _ = write_skeleton(blocks, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn write_block<W: Write + ?Sized>(block: &Block, depth: usize, out: &mut W) -> io::Result<()> {
    let pad = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);

    writeln!(out, "{}{{% block {} %}}", pad, block.name)?;

    // Comment lines are written verbatim so a re-parse yields the same text.
    if !block.comment.is_empty() {
        writeln!(out, "{}{{# {} #}}", inner, block.comment)?;
    }

    if let Some(default) = &block.default_value {
        let mut lines = default.lines();
        if default.contains('\n') {
            writeln!(out, "{}{}", inner, DEFAULT_LABEL)?;
            for line in lines {
                writeln!(out, "{}{}{}", inner, INDENT, line)?;
            }
        } else if let Some(line) = lines.next() {
            writeln!(out, "{}{} {}", inner, DEFAULT_LABEL, line)?;
        }
    }

    for child in &block.children {
        write_block(child, depth + 1, out)?;
    }

    writeln!(out, "{}{{% endblock {} %}}", pad, block.name)
}
