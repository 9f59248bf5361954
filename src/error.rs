//! Error types for compilation and table loading.
//!
//! Rendering is deliberately total and has no error type: missing data
//! degrades to empty output instead of aborting generation.

use std::path::PathBuf;
use thiserror::Error;

/// Template compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("sub-template close `[[]]` without a matching `[[name]]`")]
    UnexpectedClose,

    #[error("{0} sub-template open tag(s) left unclosed at end of input")]
    Unclosed(usize),
}

/// Language table loading errors.
#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("language table XML parsing error")]
    Xml(#[from] quick_xml::Error),
}
