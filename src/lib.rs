//! # plugin-store - Backing Store for Game Plugin Load Orders
//!
//! Reads a *load order*: an ordered list of binary plugin files, each a forest of
//! typed records and groups that may override records of the files before it.
//!
//! ## Features
//!
//! - **Bounded handles**: any number of plugins served from a fixed pool of open files
//! - **Peek-driven decoding**: optional sections are detected without consuming them
//! - **Caller-defined dispatch**: handlers per record tag, everything else skipped
//! - **Global identifiers**: every identifier is translated from its file-local form
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`cursor`] - Positioned reads over streams and payloads
//! - [`format`] - Record and group headers, fields, encoder
//! - [`ident`] - Local and global identifiers, per-file slot tables
//! - [`load_order`] - The ordered file list
//! - [`pool`] - Bounded handle pool and the coordinator serving every read
//! - [`accessor`] - Copyable per-file reading position
//! - [`records`] - Typed record decoders
//! - [`traversal`] - File walker and handler dispatch
//! - [`index`] - Identifier to location index with overrides
//! - [`settings`] - Game setting hand-off to a key/value sink
//! - [`config`] - Pool and CLI configuration
//!
//! ## Example
//!
//! ```no_run
//! use plugin_store::{Coordinator, LoadOrder, RecordIndex, StoreConfig};
//!
//! # fn main() -> plugin_store::Result<()> {
//! let load_order = LoadOrder::from_directory("Data")?;
//! let coordinator = Coordinator::new(load_order, &StoreConfig::default())?;
//! let (index, failures) = RecordIndex::build(&coordinator);
//! println!("{} records, {} files failed", index.len(), failures.len());
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;

// Binary format
pub mod cursor;
pub mod format;
pub mod ident;

// Store
pub mod accessor;
pub mod load_order;
pub mod pool;

// Consumers
pub mod index;
pub mod records;
pub mod settings;
pub mod traversal;

// Re-export commonly used types for convenience
pub use error::{Result, StoreError};

// Public API surface for external usage
pub use accessor::Accessor;
pub use config::{EvictionPolicy, StoreConfig};
pub use format::{Group, GroupLabel, GroupType, RawRecord, RecordHeader, Tag};
pub use ident::{GlobalId, LocalId, LocalLoadOrder};
pub use index::{RecordIndex, RecordLocation};
pub use load_order::{LoadOrder, PluginFile};
pub use pool::Coordinator;
pub use records::Record;
pub use settings::{SettingValue, SettingsHandler, SettingsSink};
pub use traversal::{HandlerSet, RecordHandler, TraversalContext, TraversalStats};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
