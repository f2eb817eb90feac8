//! Placed references: `REFR` objects, `ACHR` NPCs and `ACRE` creatures.

use crate::cursor::FieldReader;
use crate::error::Result;
use crate::format::{Encode, FieldWriter, RawRecord, Tag};
use crate::ident::GlobalId;
use crate::records::{expect_tags, Record, DATA, NAME, XOWN};

const XSCL: Tag = Tag::new(*b"XSCL");
const XESP: Tag = Tag::new(*b"XESP");
const XTEL: Tag = Tag::new(*b"XTEL");

/// Position and rotation (radians) in world units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
}

impl Placement {
    fn read(reader: &mut FieldReader<'_>) -> Result<Self> {
        let mut placement = Self::default();
        for v in placement.position.iter_mut() {
            *v = reader.read_f32()?;
        }
        for v in placement.rotation.iter_mut() {
            *v = reader.read_f32()?;
        }
        Ok(placement)
    }

    fn write(&self, out: &mut Vec<u8>) {
        for v in self.position.iter().chain(self.rotation.iter()) {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

/// Door link to another reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Teleport {
    pub destination: GlobalId,
    pub placement: Placement,
}

/// One placed instance of a base object inside a cell
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedReference {
    /// `REFR`, `ACHR` or `ACRE`
    pub kind: Tag,
    pub base: GlobalId,
    pub placement: Option<Placement>,
    pub scale: Option<f32>,
    pub enable_parent: Option<GlobalId>,
    pub owner: Option<GlobalId>,
    pub teleport: Option<Teleport>,
}

impl PlacedReference {
    pub fn new(kind: Tag, base: GlobalId) -> Self {
        Self {
            kind,
            base,
            placement: None,
            scale: None,
            enable_parent: None,
            owner: None,
            teleport: None,
        }
    }
}

impl Record for PlacedReference {
    const TAGS: &'static [Tag] = &[Tag::REFR, Tag::ACHR, Tag::ACRE];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        let mut reference = Self::new(
            record.header.tag,
            record.required_field(NAME)?.reader().read_global_id()?,
        );

        for field in record.fields() {
            let field = field?;
            let mut r = field.reader();
            match field.tag {
                DATA => {
                    field.expect_len(24)?;
                    reference.placement = Some(Placement::read(&mut r)?);
                }
                XSCL => reference.scale = Some(r.read_f32()?),
                XESP => reference.enable_parent = Some(r.read_global_id()?),
                XOWN => reference.owner = Some(r.read_global_id()?),
                XTEL => {
                    field.expect_len(28)?;
                    reference.teleport = Some(Teleport {
                        destination: r.read_global_id()?,
                        placement: Placement::read(&mut r)?,
                    });
                }
                _ => {}
            }
        }
        Ok(reference)
    }
}

impl Encode for PlacedReference {
    fn tag(&self) -> Tag {
        self.kind
    }

    fn encode_fields(&self, fields: &mut FieldWriter) {
        fields.u32(NAME, self.base.raw());
        if let Some(owner) = self.owner {
            fields.u32(XOWN, owner.raw());
        }
        if let Some(parent) = self.enable_parent {
            fields.compound(XESP, |b| {
                b.extend_from_slice(&parent.raw().to_le_bytes());
                b.extend_from_slice(&0u32.to_le_bytes());
            });
        }
        if let Some(teleport) = &self.teleport {
            fields.compound(XTEL, |b| {
                b.extend_from_slice(&teleport.destination.raw().to_le_bytes());
                teleport.placement.write(b);
            });
        }
        if let Some(scale) = self.scale {
            fields.f32(XSCL, scale);
        }
        if let Some(placement) = &self.placement {
            fields.compound(DATA, |b| placement.write(b));
        }
    }
}
