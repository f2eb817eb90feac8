//! Record headers and record flags.

use crate::error::Result;
use crate::format::{Tag, RECORD_HEADER_SIZE};
use crate::ident::GlobalId;

/// Record header flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecordFlags(u32);

impl RecordFlags {
    /// Set on the file header of a master file
    pub const MASTER: RecordFlags = RecordFlags(0x0000_0001);
    /// The record is a deletion marker; its payload may be empty
    pub const DELETED: RecordFlags = RecordFlags(0x0000_0020);
    /// Payload is a `u32` inflated size followed by a zlib stream
    pub const COMPRESSED: RecordFlags = RecordFlags(0x0004_0000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: RecordFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: RecordFlags) -> Self {
        Self(self.0 | other.0)
    }
}

/// Decoded record header.
///
/// Generic over the identifier so the codec can hand back the on-disk
/// [`LocalId`](crate::ident::LocalId) and the coordinator can only ever return a
/// translated [`GlobalId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader<Id = GlobalId> {
    /// Record type
    pub tag: Tag,
    /// Payload length as stored on disk (compressed length for compressed records)
    pub data_size: u32,
    pub flags: RecordFlags,
    pub id: Id,
    /// Version-control stamp, opaque to this crate
    pub vc_stamp: u32,
    /// Absolute offset of the header's first byte
    pub offset: u64,
}

impl<Id> RecordHeader<Id> {
    /// Offset of the first payload byte.
    pub fn payload_offset(&self) -> u64 {
        self.offset + RECORD_HEADER_SIZE
    }

    /// Offset just past the payload.
    pub fn end_offset(&self) -> u64 {
        self.payload_offset() + u64::from(self.data_size)
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(RecordFlags::DELETED)
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.contains(RecordFlags::COMPRESSED)
    }

    /// Replace the identifier, e.g. with its translated form
    pub fn try_map_id<J>(self, f: impl FnOnce(Id) -> Result<J>) -> Result<RecordHeader<J>> {
        Ok(RecordHeader {
            tag: self.tag,
            data_size: self.data_size,
            flags: self.flags,
            id: f(self.id)?,
            vc_stamp: self.vc_stamp,
            offset: self.offset,
        })
    }
}
