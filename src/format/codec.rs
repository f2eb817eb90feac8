//! Stream-level record and group operations.
//!
//! Everything here works on a [`StreamCursor`] bound to one file and returns
//! identifiers exactly as stored. Translation happens one layer up, in the
//! coordinator, once the raw bytes are out of the locked region.
//!
//! Peeks rewind on every path and report absence as `Ok(None)`. Expected reads
//! fail with [`StoreError::Desync`] on a tag mismatch.

use crate::cursor::StreamCursor;
use crate::error::{Result, StoreError};
use crate::format::{
    Group, GroupLabel, GroupType, RecordFlags, RecordHeader, Tag, GROUP_HEADER_SIZE,
    RECORD_HEADER_SIZE,
};
use crate::ident::LocalId;
use std::io::{Read, Seek};

/// Read the next 4-byte tag and rewind.
///
/// Returns the raw tag, which is `GRUP` when the next unit is a group.
/// `None` at end of stream.
pub fn peek_record_type<R: Read + Seek>(cursor: &mut StreamCursor<R>) -> Result<Option<Tag>> {
    let bytes = cursor.peek_bytes(4)?;
    if bytes.len() < 4 {
        return Ok(None);
    }
    Ok(Some(Tag::new([bytes[0], bytes[1], bytes[2], bytes[3]])))
}

/// Read a record header. Returns the header and the position after it.
pub fn read_record_header<R: Read + Seek>(
    cursor: &mut StreamCursor<R>,
) -> Result<(RecordHeader<LocalId>, u64)> {
    let offset = cursor.tell();
    let tag = cursor.read_tag()?;
    if tag == Tag::GRUP {
        return Err(StoreError::desync(offset, "record", tag));
    }
    let data_size = cursor.read_u32()?;
    let flags = RecordFlags::from_bits(cursor.read_u32()?);
    let id = LocalId::from_raw(cursor.read_u32()?);
    let vc_stamp = cursor.read_u32()?;
    let header = RecordHeader {
        tag,
        data_size,
        flags,
        id,
        vc_stamp,
        offset,
    };
    Ok((header, offset + RECORD_HEADER_SIZE))
}

/// Read a record header that must carry `expected`
pub fn read_record_header_expecting<R: Read + Seek>(
    cursor: &mut StreamCursor<R>,
    expected: Tag,
) -> Result<(RecordHeader<LocalId>, u64)> {
    let offset = cursor.tell();
    let (header, end) = read_record_header(cursor)?;
    if header.tag != expected {
        return Err(StoreError::desync(offset, expected.to_string(), header.tag));
    }
    Ok((header, end))
}

/// Read only the header, then seek past the declared payload.
pub fn skip_record<R: Read + Seek>(
    cursor: &mut StreamCursor<R>,
) -> Result<(RecordHeader<LocalId>, u64)> {
    let (header, _) = read_record_header(cursor)?;
    let end = header.end_offset();
    cursor.skip_to(end)?;
    Ok((header, end))
}

/// Read a header and its stored payload bytes (still compressed, if flagged)
pub fn read_record_bytes<R: Read + Seek>(
    cursor: &mut StreamCursor<R>,
) -> Result<(RecordHeader<LocalId>, Vec<u8>, u64)> {
    let (header, _) = read_record_header(cursor)?;
    let stored = cursor.read_vec(header.data_size as usize)?;
    Ok((header, stored, cursor.tell()))
}

/// As [`read_record_bytes`], but the record must carry one of `accepted`.
///
/// The tag is checked before the payload is read.
pub fn read_record_bytes_matching<R: Read + Seek>(
    cursor: &mut StreamCursor<R>,
    accepted: &[Tag],
) -> Result<(RecordHeader<LocalId>, Vec<u8>, u64)> {
    let offset = cursor.tell();
    let (header, _) = read_record_header(cursor)?;
    if !accepted.contains(&header.tag) {
        let expected = accepted
            .iter()
            .map(Tag::to_string)
            .collect::<Vec<_>>()
            .join("|");
        return Err(StoreError::desync(offset, expected, header.tag));
    }
    let stored = cursor.read_vec(header.data_size as usize)?;
    Ok((header, stored, cursor.tell()))
}

/// Report whether the next unit is a group, and of which kind, without moving.
///
/// An unknown group-type ordinal is malformed data, not absence, and fails.
pub fn peek_group_type<R: Read + Seek>(
    cursor: &mut StreamCursor<R>,
) -> Result<Option<GroupType>> {
    let offset = cursor.tell();
    let bytes = cursor.peek_bytes(GROUP_HEADER_SIZE as usize)?;
    if bytes.len() < 4 || bytes[..4] != Tag::GRUP.bytes() {
        return Ok(None);
    }
    if bytes.len() < GROUP_HEADER_SIZE as usize {
        return Err(StoreError::Truncated {
            offset,
            needed: GROUP_HEADER_SIZE,
            available: bytes.len() as u64,
        });
    }
    let ordinal = i32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    group_type(offset, ordinal).map(Some)
}

/// Read a group header. Returns the group and the position of its first child.
pub fn read_group<R: Read + Seek>(cursor: &mut StreamCursor<R>) -> Result<(Group<LocalId>, u64)> {
    let offset = cursor.tell();
    let marker = cursor.read_tag()?;
    if marker != Tag::GRUP {
        return Err(StoreError::desync(offset, "GRUP", marker));
    }
    let size = cursor.read_u32()?;
    let mut label = [0u8; 4];
    cursor.read_exact(&mut label)?;
    let kind = group_type(offset, cursor.read_i32()?)?;
    let stamp = cursor.read_u32()?;

    if u64::from(size) < GROUP_HEADER_SIZE {
        return Err(StoreError::group_schema(
            offset,
            format!("group size {size} is smaller than its own header"),
        ));
    }

    let group = Group {
        group_type: kind,
        label: GroupLabel::decode(kind, label),
        size,
        stamp,
        offset,
    }
    .try_map_id(|raw| Ok(LocalId::from_raw(raw)))?;
    Ok((group, offset + GROUP_HEADER_SIZE))
}

/// Jump past an entire group, nested groups included, in one seek.
pub fn skip_group<R: Read + Seek>(cursor: &mut StreamCursor<R>) -> Result<u64> {
    let (group, _) = read_group(cursor)?;
    let end = group.end_offset();
    cursor.skip_to(end)?;
    Ok(end)
}

fn group_type(offset: u64, ordinal: i32) -> Result<GroupType> {
    GroupType::from_ordinal(ordinal).ok_or_else(|| {
        StoreError::group_schema(offset, format!("unknown group type ordinal {ordinal}"))
    })
}
