//! Cells, worldspaces and the records that live directly under them.

use crate::error::Result;
use crate::format::{RawRecord, Tag};
use crate::ident::GlobalId;
use crate::records::{expect_tags, optional_string, Record, DATA, EDID, FULL, XOWN};

const MODL: Tag = Tag::new(*b"MODL");
const XCLC: Tag = Tag::new(*b"XCLC");
const XCLW: Tag = Tag::new(*b"XCLW");
const XCLR: Tag = Tag::new(*b"XCLR");
const XCCM: Tag = Tag::new(*b"XCCM");
const XCWT: Tag = Tag::new(*b"XCWT");
const WNAM: Tag = Tag::new(*b"WNAM");
const CNAM: Tag = Tag::new(*b"CNAM");
const NAM2: Tag = Tag::new(*b"NAM2");
const PGRP: Tag = Tag::new(*b"PGRP");
const VHGT: Tag = Tag::new(*b"VHGT");
const VTEX: Tag = Tag::new(*b"VTEX");

/// Size of one road point on disk: position and connection count, padded
const ROAD_POINT_SIZE: usize = 16;

fn optional_id(record: &RawRecord, tag: Tag) -> Result<Option<GlobalId>> {
    record
        .field(tag)?
        .map(|f| f.reader().read_global_id())
        .transpose()
}

fn id_array(record: &RawRecord, tag: Tag) -> Result<Vec<GlobalId>> {
    let Some(field) = record.field(tag)? else {
        return Ok(Vec::new());
    };
    let mut reader = field.reader();
    let mut ids = Vec::with_capacity(field.data.len() / 4);
    while reader.remaining() >= 4 {
        ids.push(reader.read_global_id()?);
    }
    Ok(ids)
}

/// A static scenery object
#[derive(Debug, Clone, PartialEq)]
pub struct StaticObject {
    pub editor_id: Option<String>,
    pub model: Option<String>,
}

impl Record for StaticObject {
    const TAGS: &'static [Tag] = &[Tag::STAT];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        Ok(Self {
            editor_id: optional_string(record, EDID)?,
            model: optional_string(record, MODL)?,
        })
    }
}

/// Cell `DATA` flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellFlags(u8);

impl CellFlags {
    pub const INTERIOR: CellFlags = CellFlags(0x01);
    pub const HAS_WATER: CellFlags = CellFlags(0x02);
    pub const PUBLIC: CellFlags = CellFlags(0x20);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: CellFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub editor_id: Option<String>,
    pub name: Option<String>,
    pub flags: CellFlags,
    /// Exterior grid position; interiors have none
    pub grid: Option<(i32, i32)>,
    pub water_height: Option<f32>,
    pub owner: Option<GlobalId>,
    pub climate: Option<GlobalId>,
    pub water: Option<GlobalId>,
    pub regions: Vec<GlobalId>,
}

impl Cell {
    pub fn is_interior(&self) -> bool {
        self.flags.contains(CellFlags::INTERIOR)
    }
}

impl Record for Cell {
    const TAGS: &'static [Tag] = &[Tag::CELL];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;

        let flags = match record.field(DATA)? {
            Some(f) => CellFlags::from_bits(f.reader().read_u8()?),
            None => CellFlags::default(),
        };
        let grid = match record.field(XCLC)? {
            Some(f) => {
                f.expect_len(8)?;
                let mut r = f.reader();
                Some((r.read_i32()?, r.read_i32()?))
            }
            None => None,
        };
        let water_height = record
            .field(XCLW)?
            .map(|f| f.reader().read_f32())
            .transpose()?;

        Ok(Self {
            editor_id: optional_string(record, EDID)?,
            name: optional_string(record, FULL)?,
            flags,
            grid,
            water_height,
            owner: optional_id(record, XOWN)?,
            climate: optional_id(record, XCCM)?,
            water: optional_id(record, XCWT)?,
            regions: id_array(record, XCLR)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Worldspace {
    pub editor_id: Option<String>,
    pub name: Option<String>,
    pub parent: Option<GlobalId>,
    pub climate: Option<GlobalId>,
    pub water: Option<GlobalId>,
}

impl Record for Worldspace {
    const TAGS: &'static [Tag] = &[Tag::WRLD];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        Ok(Self {
            editor_id: optional_string(record, EDID)?,
            name: optional_string(record, FULL)?,
            parent: optional_id(record, WNAM)?,
            climate: optional_id(record, CNAM)?,
            water: optional_id(record, NAM2)?,
        })
    }
}

/// The road network of a worldspace; only the point count is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Road {
    pub point_count: usize,
}

impl Record for Road {
    const TAGS: &'static [Tag] = &[Tag::ROAD];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        let point_count = record
            .field(PGRP)?
            .map(|f| f.data.len() / ROAD_POINT_SIZE)
            .unwrap_or(0);
        Ok(Self { point_count })
    }
}

/// Terrain of one exterior cell
#[derive(Debug, Clone, PartialEq)]
pub struct Landscape {
    pub flags: u32,
    /// Base offset of the height map
    pub height_offset: Option<f32>,
    pub textures: Vec<GlobalId>,
}

impl Record for Landscape {
    const TAGS: &'static [Tag] = &[Tag::LAND];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        let flags = match record.field(DATA)? {
            Some(f) => f.reader().read_u32()?,
            None => 0,
        };
        let height_offset = record
            .field(VHGT)?
            .map(|f| f.reader().read_f32())
            .transpose()?;
        Ok(Self {
            flags,
            height_offset,
            textures: id_array(record, VTEX)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::test_support::raw;

    #[test]
    fn test_exterior_cell() {
        let record = raw(Tag::CELL, 0x0100_0010, |f| {
            f.zstring(EDID, "Wilderness");
            f.u8(DATA, 0x02);
            f.compound(XCLC, |b| {
                b.extend_from_slice(&(-3i32).to_le_bytes());
                b.extend_from_slice(&7i32.to_le_bytes());
            });
            f.compound(XCLR, |b| {
                b.extend_from_slice(&0x0000_1111u32.to_le_bytes());
                b.extend_from_slice(&0x0100_2222u32.to_le_bytes());
            });
        });
        let cell = Cell::decode(&record).unwrap();
        assert!(!cell.is_interior());
        assert!(cell.flags.contains(CellFlags::HAS_WATER));
        assert_eq!(cell.grid, Some((-3, 7)));
        assert_eq!(
            cell.regions,
            vec![GlobalId::from_raw(0x0000_1111), GlobalId::from_raw(0x0100_2222)]
        );
        assert_eq!(cell.owner, None);
    }

    #[test]
    fn test_short_grid_rejected() {
        let record = raw(Tag::CELL, 1, |f| f.u32(XCLC, 3));
        assert!(Cell::decode(&record).is_err());
    }

    #[test]
    fn test_road_and_land() {
        let road = raw(Tag::ROAD, 1, |f| f.field(PGRP, &[0u8; ROAD_POINT_SIZE * 3]));
        assert_eq!(Road::decode(&road).unwrap().point_count, 3);

        let land = raw(Tag::LAND, 2, |f| {
            f.u32(DATA, 0x1f);
            f.f32(VHGT, 1024.0);
            f.u32(VTEX, 0x0000_0abc);
        });
        let land = Landscape::decode(&land).unwrap();
        assert_eq!(land.flags, 0x1f);
        assert_eq!(land.height_offset, Some(1024.0));
        assert_eq!(land.textures, vec![GlobalId::from_raw(0xabc)]);
    }

    #[test]
    fn test_worldspace_ids() {
        let record = raw(Tag::WRLD, 3, |f| {
            f.zstring(EDID, "Tamriel");
            f.u32(WNAM, 0x0000_0042);
        });
        let world = Worldspace::decode(&record).unwrap();
        assert_eq!(world.editor_id.as_deref(), Some("Tamriel"));
        assert_eq!(world.parent, Some(GlobalId::from_raw(0x42)));
        assert_eq!(world.climate, None);
    }
}
