use std::io;

use resdec_arsc::ArscError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecompilerError {
    /// Generic I/O error while reading the input or writing the tree
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// Got invalid input (for example, an empty file)
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Error from the resource table decoder or emitter
    #[error("got error while processing resources.arsc")]
    ResourceError(#[from] ArscError),
}
