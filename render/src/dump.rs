//! Flat structural report of a block tree.

use std::io::{self, Write};

use blockdoc::block::Block;

const NO_SUB_BLOCKS: &str = "(no sub-blocks)";
const NO_BLOCKS: &str = "(no blocks found)";
const NO_DEFAULT: &str = "(none)";

/// Write the report for `blocks`. Top-level blocks are separated by a blank line.
pub fn write_dump<W: Write + ?Sized>(blocks: &[Block], out: &mut W) -> io::Result<()> {
    if blocks.is_empty() {
        return writeln!(out, "{}", NO_BLOCKS);
    }
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        write_block(block, 0, out)?;
    }
    Ok(())
}

pub fn dump(blocks: &[Block]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_dump(blocks, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn write_block<W: Write + ?Sized>(block: &Block, depth: usize, out: &mut W) -> io::Result<()> {
    let pad = "  ".repeat(depth);

    writeln!(out, "{}Name: {}", pad, block.name)?;
    write_field(out, &pad, "Comment", &block.comment)?;
    write_field(
        out,
        &pad,
        "Default Value",
        block.default_value.as_deref().unwrap_or(NO_DEFAULT),
    )?;

    if block.is_leaf() {
        writeln!(out, "{}Blocks: {}", pad, NO_SUB_BLOCKS)
    } else {
        writeln!(out, "{}Blocks:", pad)?;
        for child in &block.children {
            write_block(child, depth + 1, out)?;
        }
        Ok(())
    }
}

/// `Label: value`, with continuation lines of a multi-line value indented
/// under the label.
fn write_field<W: Write + ?Sized>(out: &mut W, pad: &str, label: &str, value: &str) -> io::Result<()> {
    let mut lines = value.lines();
    match lines.next() {
        Some(first) => writeln!(out, "{}{}: {}", pad, label, first)?,
        None => writeln!(out, "{}{}:", pad, label)?,
    }
    for line in lines {
        writeln!(out, "{}  {}", pad, line)?;
    }
    Ok(())
}
