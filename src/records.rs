//! Typed record decoders.
//!
//! Each type implements [`Record`]: the tags it accepts and how to build itself
//! from a translated [`RawRecord`]. Identifier fields are already global by the
//! time `decode` runs, so decoders read them with
//! [`FieldReader::read_global_id`](crate::cursor::FieldReader::read_global_id).
//!
//! | Tag | Type |
//! |-----|------|
//! | `TES4` | [`PluginHeader`] |
//! | `GMST` | [`GameSetting`] |
//! | `GLOB` | [`GlobalVariable`] |
//! | `STAT` | [`StaticObject`] |
//! | `CELL` | [`Cell`] |
//! | `WRLD` | [`Worldspace`] |
//! | `ROAD` | [`Road`] |
//! | `REFR` `ACHR` `ACRE` | [`PlacedReference`] |
//! | `LAND` | [`Landscape`] |
//! | `DIAL` | [`DialogueTopic`] |
//! | `INFO` | [`DialogueInfo`] |
//!
//! `PGRD` has no decoder and is always skipped.

mod dialogue;
mod plugin;
mod reference;
mod setting;
mod world;

pub use dialogue::{DialogueInfo, DialogueTopic, Response, TopicKind};
pub use plugin::{Master, PluginHeader};
pub use reference::{PlacedReference, Placement, Teleport};
pub use setting::{GameSetting, GlobalVariable};
pub use world::{Cell, CellFlags, Landscape, Road, StaticObject, Worldspace};

use crate::error::{Result, StoreError};
use crate::format::{RawRecord, Tag};

/// A record type the store can decode
pub trait Record: Sized {
    /// Header tags this type decodes
    const TAGS: &'static [Tag];

    /// Build the record from its translated payload
    ///
    /// # Errors
    /// * `Desync` if the header tag is not one of [`Self::TAGS`]
    /// * `InvalidField` / `Truncated` for malformed fields
    fn decode(record: &RawRecord) -> Result<Self>;
}

pub(crate) const EDID: Tag = Tag::new(*b"EDID");
pub(crate) const FULL: Tag = Tag::new(*b"FULL");
pub(crate) const DATA: Tag = Tag::new(*b"DATA");
pub(crate) const NAME: Tag = Tag::new(*b"NAME");
pub(crate) const XOWN: Tag = Tag::new(*b"XOWN");

/// Fail with a desync unless the record carries one of `tags`
pub(crate) fn expect_tags<Id>(record: &RawRecord<Id>, tags: &[Tag]) -> Result<()> {
    if tags.contains(&record.header.tag) {
        return Ok(());
    }
    let expected = tags
        .iter()
        .map(Tag::to_string)
        .collect::<Vec<_>>()
        .join("|");
    Err(StoreError::desync(
        record.header.offset,
        expected,
        record.header.tag,
    ))
}

/// Optional NUL-terminated string field
pub(crate) fn optional_string<Id>(record: &RawRecord<Id>, tag: Tag) -> Result<Option<String>> {
    record.field(tag)?.map(|f| f.zstring()).transpose()
}
