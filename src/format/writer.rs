//! Plugin encoder.
//!
//! Builds plugin bytes in memory: records, nested groups with back-patched
//! sizes, oversize fields and compressed payloads. Identifiers are written
//! exactly as given, i.e. as file-local values.

use crate::format::{GroupLabel, GroupType, RecordFlags, Tag};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// A record type that can write its own fields
pub trait Encode {
    /// Record tag to write in the header
    fn tag(&self) -> Tag;

    fn encode_fields(&self, fields: &mut FieldWriter);
}

/// Writer for one record payload. All writes are little-endian.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one field, escaping through `XXXX` when it exceeds 65535 bytes
    pub fn field(&mut self, tag: Tag, data: &[u8]) {
        if data.len() > u16::MAX as usize {
            self.buf.extend_from_slice(&Tag::XXXX.bytes());
            self.buf.extend_from_slice(&4u16.to_le_bytes());
            self.buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
            self.buf.extend_from_slice(&tag.bytes());
            self.buf.extend_from_slice(&0u16.to_le_bytes());
        } else {
            self.buf.extend_from_slice(&tag.bytes());
            self.buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
        }
        self.buf.extend_from_slice(data);
    }

    /// Write a field assembled by `build`
    pub fn compound(&mut self, tag: Tag, build: impl FnOnce(&mut Vec<u8>)) {
        let mut data = Vec::new();
        build(&mut data);
        self.field(tag, &data);
    }

    /// Write a NUL-terminated string field
    pub fn zstring(&mut self, tag: Tag, text: &str) {
        self.compound(tag, |b| {
            b.extend_from_slice(text.as_bytes());
            b.push(0);
        });
    }

    pub fn u8(&mut self, tag: Tag, v: u8) {
        self.field(tag, &[v]);
    }

    pub fn u32(&mut self, tag: Tag, v: u32) {
        self.field(tag, &v.to_le_bytes());
    }

    pub fn i32(&mut self, tag: Tag, v: i32) {
        self.field(tag, &v.to_le_bytes());
    }

    pub fn u64(&mut self, tag: Tag, v: u64) {
        self.field(tag, &v.to_le_bytes());
    }

    pub fn f32(&mut self, tag: Tag, v: f32) {
        self.field(tag, &v.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Writer for a whole plugin
#[derive(Debug, Default)]
pub struct PluginWriter {
    buf: Vec<u8>,
    open_groups: Vec<usize>,
}

impl PluginWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte position.
    pub fn position(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Open a group; its size is patched in by the matching [`end_group`](Self::end_group)
    pub fn begin_group(&mut self, group_type: GroupType, label: GroupLabel<u32>) {
        self.open_groups.push(self.buf.len());
        self.buf.extend_from_slice(&Tag::GRUP.bytes());
        self.buf.extend_from_slice(&0u32.to_le_bytes());
        self.buf.extend_from_slice(&label.encode());
        self.buf.extend_from_slice(&group_type.ordinal().to_le_bytes());
        self.buf.extend_from_slice(&0u32.to_le_bytes());
    }

    /// Close the innermost open group.
    ///
    /// # Panics
    /// If no group is open.
    pub fn end_group(&mut self) {
        let start = self
            .open_groups
            .pop()
            .expect("end_group called without an open group");
        let size = (self.buf.len() - start) as u32;
        self.buf[start + 4..start + 8].copy_from_slice(&size.to_le_bytes());
    }

    /// Write a record whose payload is built by `build`
    pub fn record(
        &mut self,
        tag: Tag,
        flags: RecordFlags,
        id: u32,
        build: impl FnOnce(&mut FieldWriter),
    ) {
        let mut fields = FieldWriter::new();
        build(&mut fields);
        self.raw_record(tag, flags, id, &fields.into_bytes());
    }

    /// Write a record with a zlib-compressed payload
    pub fn compressed_record(
        &mut self,
        tag: Tag,
        flags: RecordFlags,
        id: u32,
        build: impl FnOnce(&mut FieldWriter),
    ) {
        let mut fields = FieldWriter::new();
        build(&mut fields);
        let plain = fields.into_bytes();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        // writes into a Vec cannot fail
        let _ = encoder.write_all(&plain);
        let deflated = encoder.finish().unwrap_or_default();

        let mut stored = (plain.len() as u32).to_le_bytes().to_vec();
        stored.extend_from_slice(&deflated);
        self.raw_record(tag, flags.union(RecordFlags::COMPRESSED), id, &stored);
    }

    /// Write an encodable record
    pub fn write_record<E: Encode>(&mut self, id: u32, flags: RecordFlags, record: &E) {
        self.record(record.tag(), flags, id, |f| record.encode_fields(f));
    }

    /// Write a record header followed by `payload` verbatim
    pub fn raw_record(&mut self, tag: Tag, flags: RecordFlags, id: u32, payload: &[u8]) {
        self.buf.extend_from_slice(&tag.bytes());
        self.buf
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(&flags.bits().to_le_bytes());
        self.buf.extend_from_slice(&id.to_le_bytes());
        self.buf.extend_from_slice(&0u32.to_le_bytes());
        self.buf.extend_from_slice(payload);
    }

    /// Finish writing.
    ///
    /// # Panics
    /// If a group is still open.
    pub fn into_bytes(self) -> Vec<u8> {
        assert!(
            self.open_groups.is_empty(),
            "{} group(s) left open",
            self.open_groups.len()
        );
        self.buf
    }
}
