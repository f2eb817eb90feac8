//! Game settings (`GMST`) and global variables (`GLOB`).

use crate::error::{Result, StoreError};
use crate::format::{Encode, FieldWriter, RawRecord, Tag};
use crate::records::{expect_tags, Record, DATA, EDID};
use crate::settings::SettingValue;

const FNAM: Tag = Tag::new(*b"FNAM");
const FLTV: Tag = Tag::new(*b"FLTV");

/// An engine tunable; the type of `DATA` follows the editor id's first letter
#[derive(Debug, Clone, PartialEq)]
pub struct GameSetting {
    pub editor_id: String,
    pub value: SettingValue,
}

impl Record for GameSetting {
    const TAGS: &'static [Tag] = &[Tag::GMST];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        let editor_id = record.required_field(EDID)?.zstring()?;
        let data = record.required_field(DATA)?;

        let value = match editor_id.chars().next() {
            Some('i') => SettingValue::Int(data.reader().read_i32()?),
            Some('f') => SettingValue::Float(data.reader().read_f32()?),
            Some('s') => SettingValue::Text(data.zstring()?),
            _ => {
                return Err(StoreError::invalid_field(
                    record.header.offset,
                    EDID,
                    format!("cannot infer a value type from '{editor_id}'"),
                ))
            }
        };
        Ok(Self { editor_id, value })
    }
}

impl Encode for GameSetting {
    fn tag(&self) -> Tag {
        Tag::GMST
    }

    fn encode_fields(&self, fields: &mut FieldWriter) {
        fields.zstring(EDID, &self.editor_id);
        match &self.value {
            SettingValue::Int(v) => fields.i32(DATA, *v),
            SettingValue::Float(v) => fields.f32(DATA, *v),
            SettingValue::Text(v) => fields.zstring(DATA, v),
        }
    }
}

/// A script-visible global. The value is always stored as a float.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub editor_id: String,
    pub value: SettingValue,
}

impl Record for GlobalVariable {
    const TAGS: &'static [Tag] = &[Tag::GLOB];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        let editor_id = record.required_field(EDID)?.zstring()?;
        let kind = record.required_field(FNAM)?.reader().read_u8()?;
        let stored = match record.field(FLTV)? {
            Some(f) => f.reader().read_f32()?,
            None => 0.0,
        };

        let value = match kind {
            b's' | b'l' => SettingValue::Int(stored as i32),
            b'f' => SettingValue::Float(stored),
            other => {
                return Err(StoreError::invalid_field(
                    record.header.offset,
                    FNAM,
                    format!("unknown global type {:?}", other as char),
                ))
            }
        };
        Ok(Self { editor_id, value })
    }
}
