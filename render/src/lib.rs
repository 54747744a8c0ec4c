pub mod dump;
pub mod highlight;
pub mod skeleton;

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use blockdoc::Template;

pub use dump::{dump, write_dump};
pub use highlight::{Highlighted, Style};
pub use skeleton::{skeleton, write_skeleton};

/// The two textual renderings of a block tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Flat structural report.
    #[default]
    Dump,
    /// Re-serialized directive skeleton.
    Skeleton,
}

impl Mode {
    pub fn write<W: Write + ?Sized>(self, template: &Template, out: &mut W) -> io::Result<()> {
        match self {
            Mode::Dump => write_dump(&template.blocks, out),
            Mode::Skeleton => write_skeleton(&template.blocks, out),
        }
    }

    pub fn render(self, template: &Template) -> String {
        match self {
            Mode::Dump => dump(&template.blocks),
            Mode::Skeleton => skeleton(&template.blocks),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dump" => Ok(Mode::Dump),
            "skeleton" => Ok(Mode::Skeleton),
            other => Err(format!("unknown mode '{}' (expected dump or skeleton)", other)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Dump => write!(f, "dump"),
            Mode::Skeleton => write!(f, "skeleton"),
        }
    }
}
