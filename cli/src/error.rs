use std::io;

use blockdoc::parser::ParseError;

/// Failures that end a `blockdoc doc` run.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("cannot read '{path}': {source}")]
    Read { path: String, source: io::Error },

    #[error("cannot write to '{path}': {source}")]
    Write { path: String, source: io::Error },

    /// Already rendered as a source diagnostic when it is returned.
    #[error("{0}")]
    Parse(ParseError),
}

impl CliError {
    pub fn write(path: impl Into<String>) -> impl FnOnce(io::Error) -> CliError {
        let path = path.into();
        move |source| CliError::Write { path, source }
    }
}
