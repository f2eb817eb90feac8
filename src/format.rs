//! Plugin file binary format.
//!
//! A plugin is a flat sequence of *units*, each either a record or a group:
//!
//! | Unit   | Bytes 0-3 | 4-7            | 8-11        | 12-15          | 16-19      |
//! |--------|-----------|----------------|-------------|----------------|------------|
//! | record | type tag  | payload length | flags       | identifier     | vc stamp   |
//! | group  | `GRUP`    | total size     | label union | group type     | stamp      |
//!
//! A record's payload is a run of fields (`tag`, `u16` length, data). A group's
//! size includes its own header, so a whole subtree can be skipped in one seek.
//!
//! - [`tag`] - four-byte type tags
//! - [`header`] - record headers and flags
//! - [`group`] - group headers, group types and label decoding
//! - [`field`] - field splitting and raw record payloads
//! - [`codec`] - stream-level read/peek/skip operations
//! - [`writer`] - encoder used for fixtures and round-trips

pub mod codec;
pub mod field;
pub mod group;
pub mod header;
pub mod tag;
pub mod writer;

pub use field::{Field, Fields, RawRecord};
pub use group::{Group, GroupLabel, GroupType};
pub use header::{RecordFlags, RecordHeader};
pub use tag::Tag;
pub use writer::{Encode, FieldWriter, PluginWriter};

/// Size of a record header on disk.
pub const RECORD_HEADER_SIZE: u64 = 20;

/// Size of a group header on disk.
pub const GROUP_HEADER_SIZE: u64 = 20;
