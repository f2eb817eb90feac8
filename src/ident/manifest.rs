//! Static manifest of identifier-bearing fields.
//!
//! Each row names a record type, a field inside it and where in that field the
//! identifiers sit. [`translate_payload`] rewrites every listed identifier in
//! place, so typed decoders only ever read global values. Supporting a new
//! record type means adding rows here.

use crate::error::{Result, StoreError};
use crate::format::field::field_spans;
use crate::format::Tag;
use crate::ident::{LocalId, LocalLoadOrder};

/// Where the identifiers live inside one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdLayout {
    /// A single `u32` at a byte offset
    At(usize),
    /// Packed `u32`s starting at `offset`, one every `stride` bytes, to the end of the field
    Array { offset: usize, stride: usize },
}

/// One manifest row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdField {
    pub record: Tag,
    pub field: Tag,
    pub layout: IdLayout,
}

const fn at(record: &[u8; 4], field: &[u8; 4], offset: usize) -> IdField {
    IdField {
        record: Tag::new(*record),
        field: Tag::new(*field),
        layout: IdLayout::At(offset),
    }
}

const fn array(record: &[u8; 4], field: &[u8; 4], stride: usize) -> IdField {
    IdField {
        record: Tag::new(*record),
        field: Tag::new(*field),
        layout: IdLayout::Array { offset: 0, stride },
    }
}

pub static ID_FIELDS: &[IdField] = &[
    // placed objects
    at(b"REFR", b"NAME", 0),
    at(b"REFR", b"XOWN", 0),
    at(b"REFR", b"XGLB", 0),
    at(b"REFR", b"XESP", 0),
    at(b"REFR", b"XTEL", 0),
    at(b"REFR", b"XLOC", 4),
    at(b"REFR", b"XTRG", 0),
    at(b"REFR", b"XRTM", 0),
    at(b"REFR", b"XPCI", 0),
    at(b"REFR", b"XMRC", 0),
    at(b"ACHR", b"NAME", 0),
    at(b"ACHR", b"XOWN", 0),
    at(b"ACHR", b"XESP", 0),
    at(b"ACHR", b"XPCI", 0),
    at(b"ACHR", b"XMRC", 0),
    at(b"ACHR", b"XHRS", 0),
    at(b"ACRE", b"NAME", 0),
    at(b"ACRE", b"XOWN", 0),
    at(b"ACRE", b"XGLB", 0),
    at(b"ACRE", b"XESP", 0),
    // cells and worlds
    at(b"CELL", b"XOWN", 0),
    at(b"CELL", b"XGLB", 0),
    at(b"CELL", b"XCCM", 0),
    at(b"CELL", b"XCWT", 0),
    array(b"CELL", b"XCLR", 4),
    at(b"WRLD", b"WNAM", 0),
    at(b"WRLD", b"CNAM", 0),
    at(b"WRLD", b"NAM2", 0),
    // terrain
    at(b"LAND", b"BTXT", 0),
    at(b"LAND", b"ATXT", 0),
    array(b"LAND", b"VTEX", 4),
    // dialogue
    at(b"DIAL", b"QSTI", 0),
    at(b"DIAL", b"QSTR", 0),
    at(b"INFO", b"QSTI", 0),
    at(b"INFO", b"TPIC", 0),
    at(b"INFO", b"NAME", 0),
    at(b"INFO", b"TCLT", 0),
    at(b"INFO", b"TCLF", 0),
    at(b"INFO", b"PNAM", 0),
    at(b"INFO", b"SCRO", 0),
];

/// Manifest rows for one record type
pub fn id_fields(record: Tag) -> impl Iterator<Item = &'static IdField> {
    ID_FIELDS.iter().filter(move |row| row.record == record)
}

/// Rewrite every manifest-listed identifier in `payload` from local to global.
///
/// # Arguments
/// * `record` - Record type, selects the manifest rows
/// * `record_offset` - Absolute offset of the record, for diagnostics
/// * `payload` - Inflated payload, patched in place
/// * `local` - The owning file's slot table
pub(crate) fn translate_payload(
    record: Tag,
    record_offset: u64,
    payload: &mut [u8],
    local: &LocalLoadOrder,
) -> Result<()> {
    let rows: Vec<&IdField> = id_fields(record).collect();
    if rows.is_empty() {
        return Ok(());
    }

    for (tag, range) in field_spans(payload, record_offset)? {
        for row in rows.iter().filter(|row| row.field == tag) {
            let field = &mut payload[range.clone()];
            match row.layout {
                IdLayout::At(offset) => {
                    if field.len() < offset + 4 {
                        return Err(StoreError::invalid_field(
                            record_offset,
                            tag,
                            format!(
                                "identifier at byte {offset} needs {} bytes, field has {}",
                                offset + 4,
                                field.len()
                            ),
                        ));
                    }
                    translate_at(field, offset, local)?;
                }
                IdLayout::Array { offset, stride } => {
                    let mut pos = offset;
                    while pos + 4 <= field.len() {
                        translate_at(field, pos, local)?;
                        pos += stride;
                    }
                }
            }
        }
    }
    Ok(())
}

fn translate_at(field: &mut [u8], pos: usize, local: &LocalLoadOrder) -> Result<()> {
    let raw = u32::from_le_bytes([field[pos], field[pos + 1], field[pos + 2], field[pos + 3]]);
    let global = local.translate(LocalId::from_raw(raw))?;
    field[pos..pos + 4].copy_from_slice(&global.raw().to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FieldWriter;
    use crate::load_order::LoadOrder;
    use std::collections::HashSet;

    fn mod_on_base() -> LocalLoadOrder {
        // Mod.esp sits at index 2 and declares only Base.esm (index 0)
        let order =
            LoadOrder::from_names("/data", ["Base.esm", "Other.esm", "Mod.esp"]).unwrap();
        LocalLoadOrder::derive(2, &["Base.esm".to_string()], &order).unwrap()
    }

    #[test]
    fn test_rows_are_unique() {
        let mut seen = HashSet::new();
        for row in ID_FIELDS {
            assert!(seen.insert((row.record, row.field)), "duplicate row {row:?}");
        }
    }

    #[test]
    fn test_listed_fields_are_rewritten() {
        let mut writer = FieldWriter::new();
        writer.zstring(Tag::new(*b"EDID"), "Guard");
        writer.u32(Tag::new(*b"NAME"), 0x0000_0042);
        writer.compound(Tag::new(*b"XLOC"), |b| {
            b.extend_from_slice(&5u32.to_le_bytes());
            b.extend_from_slice(&0x0100_0007u32.to_le_bytes());
        });
        let mut payload = writer.into_bytes();

        translate_payload(Tag::REFR, 0, &mut payload, &mod_on_base()).unwrap();

        let fields: Vec<_> = crate::format::Fields::new(&payload, 0)
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(fields[1].reader().read_u32().unwrap(), 0x0000_0042);
        let mut xloc = fields[2].reader();
        assert_eq!(xloc.read_u32().unwrap(), 5);
        assert_eq!(xloc.read_u32().unwrap(), 0x0200_0007);
    }

    #[test]
    fn test_arrays_are_rewritten() {
        let mut writer = FieldWriter::new();
        writer.compound(Tag::new(*b"XCLR"), |b| {
            b.extend_from_slice(&0x0100_0001u32.to_le_bytes());
            b.extend_from_slice(&0x0000_0002u32.to_le_bytes());
        });
        let mut payload = writer.into_bytes();
        translate_payload(Tag::CELL, 0, &mut payload, &mod_on_base()).unwrap();

        let mut regions = crate::format::Fields::new(&payload, 0)
            .next()
            .unwrap()
            .unwrap()
            .reader();
        assert_eq!(regions.read_u32().unwrap(), 0x0200_0001);
        assert_eq!(regions.read_u32().unwrap(), 0x0000_0002);
    }

    #[test]
    fn test_undeclared_slot_in_field_fails() {
        let mut writer = FieldWriter::new();
        writer.u32(Tag::new(*b"NAME"), 0x0500_0001);
        let mut payload = writer.into_bytes();
        let result = translate_payload(Tag::ACHR, 0, &mut payload, &mod_on_base());
        assert!(matches!(result, Err(StoreError::UndeclaredMaster { slot: 5, .. })));
    }

    #[test]
    fn test_short_identifier_field() {
        let mut writer = FieldWriter::new();
        writer.field(Tag::new(*b"NAME"), &[1, 2]);
        let mut payload = writer.into_bytes();
        let result = translate_payload(Tag::REFR, 64, &mut payload, &mod_on_base());
        assert!(matches!(result, Err(StoreError::InvalidField { offset: 64, .. })));
    }
}
