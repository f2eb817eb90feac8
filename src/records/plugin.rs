//! `TES4` file header.

use crate::error::Result;
use crate::format::{Encode, FieldWriter, RawRecord, Tag};
use crate::records::{expect_tags, optional_string, Record, DATA};

const HEDR: Tag = Tag::new(*b"HEDR");
const CNAM: Tag = Tag::new(*b"CNAM");
const SNAM: Tag = Tag::new(*b"SNAM");
const MAST: Tag = Tag::new(*b"MAST");

/// One declared master
#[derive(Debug, Clone, PartialEq)]
pub struct Master {
    pub name: String,
    /// Size of the master when the plugin was saved; informational only
    pub size: u64,
}

/// The record every plugin starts with
#[derive(Debug, Clone, PartialEq)]
pub struct PluginHeader {
    pub version: f32,
    pub record_count: u32,
    pub next_object_id: u32,
    pub author: Option<String>,
    pub description: Option<String>,
    pub masters: Vec<Master>,
}

impl Default for PluginHeader {
    fn default() -> Self {
        Self {
            version: 1.0,
            record_count: 0,
            next_object_id: 0x800,
            author: None,
            description: None,
            masters: Vec::new(),
        }
    }
}

impl PluginHeader {
    /// Header declaring `names` as masters, in order
    pub fn with_masters<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            masters: names
                .iter()
                .map(|name| Master {
                    name: name.as_ref().to_string(),
                    size: 0,
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Declared master names, read straight from an untranslated header.
    ///
    /// The local load order is derived from this list, so it has to be readable
    /// before any identifier can be translated.
    pub fn master_names<Id>(record: &RawRecord<Id>) -> Result<Vec<String>> {
        expect_tags(record, Self::TAGS)?;
        record
            .fields_tagged(MAST)?
            .iter()
            .map(|f| f.zstring())
            .collect()
    }

    pub fn master_names_iter(&self) -> impl Iterator<Item = &str> {
        self.masters.iter().map(|m| m.name.as_str())
    }
}

impl Record for PluginHeader {
    const TAGS: &'static [Tag] = &[Tag::TES4];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;

        let hedr = record.required_field(HEDR)?;
        hedr.expect_len(12)?;
        let mut r = hedr.reader();
        let version = r.read_f32()?;
        let record_count = r.read_u32()?;
        let next_object_id = r.read_u32()?;

        // each MAST may be followed by a DATA carrying the master's size
        let mut masters: Vec<Master> = Vec::new();
        for field in record.fields() {
            let field = field?;
            if field.tag == MAST {
                masters.push(Master {
                    name: field.zstring()?,
                    size: 0,
                });
            } else if field.tag == DATA {
                if let Some(last) = masters.last_mut() {
                    field.expect_len(8)?;
                    last.size = field.reader().read_u64()?;
                }
            }
        }

        Ok(Self {
            version,
            record_count,
            next_object_id,
            author: optional_string(record, CNAM)?,
            description: optional_string(record, SNAM)?,
            masters,
        })
    }
}

impl Encode for PluginHeader {
    fn tag(&self) -> Tag {
        Tag::TES4
    }

    fn encode_fields(&self, fields: &mut FieldWriter) {
        fields.compound(HEDR, |b| {
            b.extend_from_slice(&self.version.to_le_bytes());
            b.extend_from_slice(&self.record_count.to_le_bytes());
            b.extend_from_slice(&self.next_object_id.to_le_bytes());
        });
        if let Some(author) = &self.author {
            fields.zstring(CNAM, author);
        }
        if let Some(description) = &self.description {
            fields.zstring(SNAM, description);
        }
        for master in &self.masters {
            fields.zstring(MAST, &master.name);
            fields.u64(DATA, master.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::test_support::{encoded, raw};
    use proptest::prelude::*;

    #[test]
    fn test_header_round_trip() {
        let header = PluginHeader {
            version: 0.8,
            record_count: 12,
            next_object_id: 0x1000,
            author: Some("Modder".to_string()),
            description: Some("Adds a tower".to_string()),
            masters: vec![
                Master {
                    name: "Base.esm".to_string(),
                    size: 1024,
                },
                Master {
                    name: "Expansion.esm".to_string(),
                    size: 2048,
                },
            ],
        };
        let decoded = PluginHeader::decode(&encoded(&header)).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(
            decoded.master_names_iter().collect::<Vec<_>>(),
            vec!["Base.esm", "Expansion.esm"]
        );
    }

    #[test]
    fn test_master_names_without_hedr() {
        let record = raw(Tag::TES4, 0, |f| {
            f.zstring(MAST, "Base.esm");
        });
        assert_eq!(PluginHeader::master_names(&record).unwrap(), vec!["Base.esm"]);
        assert!(PluginHeader::decode(&record).is_err());
    }

    proptest! {
        #[test]
        fn prop_header_round_trips(
            version in -1.0e3f32..1.0e3,
            record_count in any::<u32>(),
            next_object_id in any::<u32>(),
            author in prop::option::of("[ -~]{0,24}"),
            description in prop::option::of("[ -~]{0,48}"),
            masters in prop::collection::vec(("[A-Za-z0-9 _]{1,16}\\.es[mp]", any::<u64>()), 0..8),
        ) {
            let header = PluginHeader {
                version,
                record_count,
                next_object_id,
                author,
                description,
                masters: masters
                    .into_iter()
                    .map(|(name, size)| Master { name, size })
                    .collect(),
            };
            prop_assert_eq!(PluginHeader::decode(&encoded(&header)).unwrap(), header);
        }
    }
}
