//! Per-file reading position bound to a coordinator.
//!
//! An [`Accessor`] is a small `Copy` value: a file index, a byte position and a
//! reference to the shared [`Coordinator`]. It never owns a handle. Every call
//! asks the coordinator to perform one operation at the stored position, then
//! moves the position to where that operation ended.
//!
//! Copies are independent: reading through one copy never moves another.

use crate::error::Result;
use crate::format::{Group, GroupType, RawRecord, RecordHeader, Tag};
use crate::pool::Coordinator;
use crate::records::Record;

/// Copyable sequential reader over one plugin file
#[derive(Debug, Clone, Copy)]
pub struct Accessor<'c> {
    coordinator: &'c Coordinator,
    file: usize,
    position: u64,
}

impl<'c> Accessor<'c> {
    pub(crate) fn new(coordinator: &'c Coordinator, file: usize, position: u64) -> Self {
        Self {
            coordinator,
            file,
            position,
        }
    }

    /// Global index of the file this accessor reads
    pub fn file(&self) -> usize {
        self.file
    }

    pub fn file_name(&self) -> &'c str {
        self.coordinator
            .load_order()
            .get(self.file)
            .map(|p| p.name())
            .unwrap_or_default()
    }

    /// Offset just after the last unit this accessor consumed
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move to an absolute offset. Nothing is read until the next operation.
    pub fn seek(&mut self, position: u64) {
        self.position = position;
    }

    pub fn coordinator(&self) -> &'c Coordinator {
        self.coordinator
    }

    /// Decode the record at the current position as a `T`
    ///
    /// # Errors
    /// * `Desync` if the record's tag is not one of `T::TAGS`
    /// * `UndeclaredMaster` if an identifier cannot be translated
    /// * Any decoding error reported by `T`
    pub fn read_record<T: Record>(&mut self) -> Result<(RecordHeader, T)> {
        let (header, record, end) = self.coordinator.read_record::<T>(self.file, self.position)?;
        self.position = end;
        Ok((header, record))
    }

    /// Read the record at the current position without decoding its fields
    pub fn read_raw_record(&mut self) -> Result<RawRecord> {
        let (record, end) = self.coordinator.read_raw_record(self.file, self.position)?;
        self.position = end;
        Ok(record)
    }

    /// Read a record header, leaving the position at the start of its payload
    pub fn read_record_header(&mut self) -> Result<RecordHeader> {
        let (header, end) = self
            .coordinator
            .read_record_header(self.file, self.position)?;
        self.position = end;
        Ok(header)
    }

    /// Step over the record at the current position, returning its header
    pub fn skip_record(&mut self) -> Result<RecordHeader> {
        let (header, end) = self.coordinator.skip_record(self.file, self.position)?;
        self.position = end;
        Ok(header)
    }

    /// Tag of the next unit without consuming it; `None` at end of file
    pub fn peek_record_type(&self) -> Result<Option<Tag>> {
        self.coordinator.peek_record_type(self.file, self.position)
    }

    /// Read a group header, leaving the position at its first child
    pub fn read_group(&mut self) -> Result<Group> {
        let (group, end) = self.coordinator.read_group(self.file, self.position)?;
        self.position = end;
        Ok(group)
    }

    /// Step over the whole group at the current position
    pub fn skip_group(&mut self) -> Result<()> {
        self.position = self.coordinator.skip_group(self.file, self.position)?;
        Ok(())
    }

    /// Kind of the next unit if it is a group, without consuming it
    pub fn peek_group_type(&self) -> Result<Option<GroupType>> {
        self.coordinator.peek_group_type(self.file, self.position)
    }
}
