//! Error types and handling infrastructure for plugin-store.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! the library's error taxonomy. The binary layers `anyhow` on top for context.
//!
//! ## Design Principles
//!
//! - **Diagnostics name the place**: byte offset plus expected-vs-found detail
//! - **Absence is not an error**: peeks return `Ok(None)`, never `Err`
//! - **File context**: errors leaving the coordinator carry the plugin name
//! - **Consistency**: Standardized Result type across all modules

use crate::format::Tag;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for plugin-store operations.
///
/// Every variant except [`StoreError::Plugin`] describes a failure inside one
/// file; `Plugin` wraps any of them with the name of the file it came from.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An expected tag did not match; the stream position is no longer trustworthy
    #[error("desynchronized at offset {offset:#x}: expected {expected}, found {found}")]
    Desync {
        offset: u64,
        expected: String,
        found: Tag,
    },

    /// Fewer bytes were available than a declared length promised
    #[error("truncated at offset {offset:#x}: needed {needed} bytes, only {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// An identifier's local slot has no entry in the owning file's masters
    #[error(
        "{file}: identifier {id:#010x} references undeclared master slot {slot} ({declared} slots declared)"
    )]
    UndeclaredMaster {
        file: String,
        id: u32,
        slot: u8,
        declared: usize,
    },

    /// A file declares a master that is absent from the load order
    #[error("{file}: master '{master}' is not in the load order")]
    MissingMaster { file: String, master: String },

    /// A file declares a master that is loaded after it
    #[error("{file}: master '{master}' is loaded after the file that depends on it")]
    MasterOutOfOrder { file: String, master: String },

    /// A group appeared where the file structure does not allow it
    #[error("group structure error at offset {offset:#x}: {message}")]
    GroupSchema { offset: u64, message: String },

    /// A compressed payload could not be inflated
    #[error("decompression failed for record at offset {offset:#x}: {message}")]
    Decompression { offset: u64, message: String },

    /// A field's content does not match its schema
    #[error("invalid {tag} field in record at offset {offset:#x}: {message}")]
    InvalidField {
        offset: u64,
        tag: Tag,
        message: String,
    },

    /// A plugin file could not be opened
    #[error("cannot open plugin {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other OS-level read or seek failure
    #[error("I/O operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// The load order holds more files than an identifier can address
    #[error("load order holds {count} plugins, at most 255 are addressable")]
    TooManyPlugins { count: usize },

    /// A file name was looked up that is not in the load order
    #[error("plugin '{name}' is not in the load order")]
    UnknownPlugin { name: String },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Context wrapper naming the plugin a failure happened in
    #[error("{file}: {source}")]
    Plugin {
        file: String,
        #[source]
        source: Box<StoreError>,
    },
}

/// Standard Result type for plugin-store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a Desync error from an expected description and the tag found instead
    pub fn desync(offset: u64, expected: impl Into<String>, found: Tag) -> Self {
        Self::Desync {
            offset,
            expected: expected.into(),
            found,
        }
    }

    /// Create a GroupSchema error with a descriptive message
    pub fn group_schema(offset: u64, message: impl Into<String>) -> Self {
        Self::GroupSchema {
            offset,
            message: message.into(),
        }
    }

    /// Create an InvalidField error with a descriptive message
    pub fn invalid_field(offset: u64, tag: Tag, message: impl Into<String>) -> Self {
        Self::InvalidField {
            offset,
            tag,
            message: message.into(),
        }
    }

    /// Create a Config error with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Attach the plugin name, unless the error already carries one
    pub fn in_file(self, file: impl Into<String>) -> Self {
        match self {
            Self::Plugin { .. } => self,
            other => Self::Plugin {
                file: file.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any file context removed
    pub fn root(&self) -> &StoreError {
        match self {
            Self::Plugin { source, .. } => source.root(),
            other => other,
        }
    }

    /// Byte offset the failure was detected at, when the error has one
    pub fn offset(&self) -> Option<u64> {
        match self.root() {
            Self::Desync { offset, .. }
            | Self::Truncated { offset, .. }
            | Self::GroupSchema { offset, .. }
            | Self::Decompression { offset, .. }
            | Self::InvalidField { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
