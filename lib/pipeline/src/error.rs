//! Error types for the pipeline crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SourceError`: the workflow source cannot be listed; fatal for a batch
//! - `WriteError`: one artifact could not be written; counted, never fatal

use std::fmt;
use std::path::PathBuf;

/// Errors from listing workflow inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source directory is missing or cannot be listed.
    DirectoryUnreadable { path: PathBuf, reason: String },
    /// A workflow file exists but cannot be read.
    FileUnreadable { path: PathBuf, reason: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryUnreadable { path, reason } => {
                write!(f, "cannot list source directory {}: {reason}", path.display())
            }
            Self::FileUnreadable { path, reason } => {
                write!(f, "cannot read workflow file {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// Errors from writing one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The output directory cannot be created.
    CreateDirFailed { path: PathBuf, reason: String },
    /// The artifact file cannot be written.
    WriteFailed { path: PathBuf, reason: String },
    /// The artifact cannot be serialized.
    SerializeFailed { artifact: String, reason: String },
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDirFailed { path, reason } => {
                write!(f, "cannot create output directory {}: {reason}", path.display())
            }
            Self::WriteFailed { path, reason } => {
                write!(f, "cannot write {}: {reason}", path.display())
            }
            Self::SerializeFailed { artifact, reason } => {
                write!(f, "cannot serialize {artifact}: {reason}")
            }
        }
    }
}

impl std::error::Error for WriteError {}
