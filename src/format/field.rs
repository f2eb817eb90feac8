//! Record payloads and the fields inside them.

use crate::cursor::FieldReader;
use crate::error::{Result, StoreError};
use crate::format::{RecordHeader, Tag};
use crate::ident::{manifest, GlobalId, LocalId, LocalLoadOrder};
use flate2::read::ZlibDecoder;
use std::io::Read;
use std::ops::Range;

/// One field of a record payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub tag: Tag,
    pub data: &'a [u8],
    /// Absolute file offset of the owning record, for diagnostics
    pub record_offset: u64,
}

impl<'a> Field<'a> {
    /// A reader over this field's data
    pub fn reader(&self) -> FieldReader<'a> {
        FieldReader::new(self.data, self.record_offset)
    }

    /// The whole field as a NUL-terminated string
    pub fn zstring(&self) -> Result<String> {
        self.reader().read_zstring()
    }

    /// Fail unless the field is at least `len` bytes long
    pub fn expect_len(&self, len: usize) -> Result<()> {
        if self.data.len() < len {
            return Err(StoreError::invalid_field(
                self.record_offset,
                self.tag,
                format!("expected at least {len} bytes, found {}", self.data.len()),
            ));
        }
        Ok(())
    }
}

/// Iterator over the fields of a payload.
///
/// Handles the `XXXX` escape: a 4-byte `XXXX` field gives the real size of the
/// field that follows it, whose own 16-bit size is then ignored. `XXXX` itself
/// is never yielded.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
    record_offset: u64,
}

impl<'a> Fields<'a> {
    pub fn new(data: &'a [u8], record_offset: u64) -> Self {
        Self {
            data,
            pos: 0,
            record_offset,
        }
    }

    fn next_span(&mut self) -> Result<Option<(Tag, Range<usize>)>> {
        let mut override_size: Option<usize> = None;
        loop {
            if self.pos >= self.data.len() {
                return match override_size {
                    Some(_) => Err(self.truncated(6)),
                    None => Ok(None),
                };
            }
            if self.data.len() - self.pos < 6 {
                return Err(self.truncated(6));
            }
            let head = &self.data[self.pos..self.pos + 6];
            let tag = Tag::new([head[0], head[1], head[2], head[3]]);
            let stored = u16::from_le_bytes([head[4], head[5]]) as usize;
            let size = override_size.take().unwrap_or(stored);
            let start = self.pos + 6;
            if self.data.len() - start < size {
                self.pos = start;
                return Err(self.truncated(size));
            }
            self.pos = start + size;

            if tag == Tag::XXXX && size == 4 {
                let b = &self.data[start..start + 4];
                override_size = Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize);
                continue;
            }
            return Ok(Some((tag, start..start + size)));
        }
    }

    fn truncated(&self, needed: usize) -> StoreError {
        StoreError::Truncated {
            offset: self.record_offset + crate::format::RECORD_HEADER_SIZE + self.pos as u64,
            needed: needed as u64,
            available: self.data.len().saturating_sub(self.pos) as u64,
        }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<Field<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        match self.next_span() {
            Ok(Some((tag, range))) => Some(Ok(Field {
                tag,
                data: &data[range],
                record_offset: self.record_offset,
            })),
            Ok(None) => None,
            Err(e) => {
                // stop after the first error
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Locate every field in a payload without borrowing it, so it can be patched
pub(crate) fn field_spans(data: &[u8], record_offset: u64) -> Result<Vec<(Tag, Range<usize>)>> {
    let mut fields = Fields::new(data, record_offset);
    let mut spans = Vec::new();
    while let Some(span) = fields.next_span()? {
        spans.push(span);
    }
    Ok(spans)
}

/// A record header together with its inflated payload.
///
/// `RawRecord<LocalId>` is what comes off disk; [`RawRecord::translate`] turns it
/// into the `RawRecord<GlobalId>` that typed decoders and callers see.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord<Id = GlobalId> {
    pub header: RecordHeader<Id>,
    payload: Vec<u8>,
}

impl RawRecord<LocalId> {
    /// Build from the bytes stored on disk, inflating compressed payloads
    pub fn from_disk(header: RecordHeader<LocalId>, stored: Vec<u8>) -> Result<Self> {
        let payload = if header.is_compressed() {
            inflate(header.offset, &stored)?
        } else {
            stored
        };
        Ok(Self { header, payload })
    }

    /// Translate the header identifier and every manifest-listed identifier field
    pub fn translate(self, local: &LocalLoadOrder) -> Result<RawRecord<GlobalId>> {
        let Self {
            header,
            mut payload,
        } = self;
        manifest::translate_payload(header.tag, header.offset, &mut payload, local)?;
        let header = header.try_map_id(|id| local.translate(id))?;
        Ok(RawRecord { header, payload })
    }
}

impl<Id> RawRecord<Id> {
    /// Assemble from a header and an already inflated payload
    pub fn from_parts(header: RecordHeader<Id>, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// The inflated payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn fields(&self) -> Fields<'_> {
        Fields::new(&self.payload, self.header.offset)
    }

    /// First field with the given tag
    pub fn field(&self, tag: Tag) -> Result<Option<Field<'_>>> {
        for field in self.fields() {
            let field = field?;
            if field.tag == tag {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }

    /// First field with the given tag, or an error naming the missing field
    pub fn required_field(&self, tag: Tag) -> Result<Field<'_>> {
        self.field(tag)?.ok_or_else(|| {
            StoreError::invalid_field(self.header.offset, tag, "required field is missing")
        })
    }

    /// All fields with the given tag, in order
    pub fn fields_tagged(&self, tag: Tag) -> Result<Vec<Field<'_>>> {
        let mut out = Vec::new();
        for field in self.fields() {
            let field = field?;
            if field.tag == tag {
                out.push(field);
            }
        }
        Ok(out)
    }
}

/// Largest buffer reserved up front for an inflated payload
const MAX_RESERVE: usize = 1 << 20;

fn inflate(offset: u64, stored: &[u8]) -> Result<Vec<u8>> {
    if stored.len() < 4 {
        return Err(StoreError::Decompression {
            offset,
            message: format!(
                "compressed payload holds {} bytes, too short for a size prefix",
                stored.len()
            ),
        });
    }
    let expected = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]) as usize;
    // the size prefix is untrusted: reserve modestly and stop one byte past it
    let mut inflated = Vec::with_capacity(expected.min(MAX_RESERVE));
    ZlibDecoder::new(&stored[4..])
        .take(expected as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| StoreError::Decompression {
            offset,
            message: e.to_string(),
        })?;
    if inflated.len() > expected {
        return Err(StoreError::Decompression {
            offset,
            message: format!("inflates past the {expected} bytes its header promised"),
        });
    }
    if inflated.len() < expected {
        return Err(StoreError::Decompression {
            offset,
            message: format!(
                "inflated to {} bytes, header promised {expected}",
                inflated.len()
            ),
        });
    }
    Ok(inflated)
}
