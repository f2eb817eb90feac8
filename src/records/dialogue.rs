//! Dialogue topics (`DIAL`) and their responses (`INFO`).

use crate::error::Result;
use crate::format::{RawRecord, Tag};
use crate::ident::GlobalId;
use crate::records::{expect_tags, optional_string, Record, DATA, EDID, FULL, NAME};

const QSTI: Tag = Tag::new(*b"QSTI");
const PNAM: Tag = Tag::new(*b"PNAM");
const TRDT: Tag = Tag::new(*b"TRDT");
const NAM1: Tag = Tag::new(*b"NAM1");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Topic,
    Conversation,
    Combat,
    Persuasion,
    Detection,
    Service,
    Miscellaneous,
    Other(u8),
}

impl From<u8> for TopicKind {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Topic,
            1 => Self::Conversation,
            2 => Self::Combat,
            3 => Self::Persuasion,
            4 => Self::Detection,
            5 => Self::Service,
            6 => Self::Miscellaneous,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueTopic {
    pub editor_id: Option<String>,
    pub name: Option<String>,
    pub kind: TopicKind,
    pub quests: Vec<GlobalId>,
}

impl Record for DialogueTopic {
    const TAGS: &'static [Tag] = &[Tag::DIAL];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        let kind = match record.field(DATA)? {
            Some(f) => TopicKind::from(f.reader().read_u8()?),
            None => TopicKind::Topic,
        };
        let quests = record
            .fields_tagged(QSTI)?
            .iter()
            .map(|f| f.reader().read_global_id())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            editor_id: optional_string(record, EDID)?,
            name: optional_string(record, FULL)?,
            kind,
            quests,
        })
    }
}

/// One spoken line of an `INFO`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub emotion: u32,
    pub emotion_value: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueInfo {
    pub kind: TopicKind,
    pub flags: u8,
    pub quest: Option<GlobalId>,
    /// The info this one follows in its topic
    pub previous: Option<GlobalId>,
    /// Topics this response links to
    pub topics: Vec<GlobalId>,
    pub responses: Vec<Response>,
}

impl Record for DialogueInfo {
    const TAGS: &'static [Tag] = &[Tag::INFO];

    fn decode(record: &RawRecord) -> Result<Self> {
        expect_tags(record, Self::TAGS)?;
        let mut info = Self {
            kind: TopicKind::Topic,
            flags: 0,
            quest: None,
            previous: None,
            topics: Vec::new(),
            responses: Vec::new(),
        };

        for field in record.fields() {
            let field = field?;
            let mut r = field.reader();
            match field.tag {
                DATA => {
                    info.kind = TopicKind::from(r.read_u8()?);
                    if r.remaining() >= 2 {
                        r.read_u8()?;
                        info.flags = r.read_u8()?;
                    }
                }
                QSTI => info.quest = Some(r.read_global_id()?),
                PNAM => info.previous = Some(r.read_global_id()?),
                NAME => info.topics.push(r.read_global_id()?),
                TRDT => {
                    field.expect_len(8)?;
                    info.responses.push(Response {
                        emotion: r.read_u32()?,
                        emotion_value: r.read_i32()?,
                        text: String::new(),
                    });
                }
                NAM1 => {
                    let text = field.zstring()?;
                    match info.responses.last_mut() {
                        Some(last) if last.text.is_empty() => last.text = text,
                        _ => info.responses.push(Response {
                            text,
                            ..Response::default()
                        }),
                    }
                }
                _ => {}
            }
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::test_support::raw;

    #[test]
    fn test_topic_with_quests() {
        let record = raw(Tag::DIAL, 1, |f| {
            f.zstring(EDID, "GREETING");
            f.u32(QSTI, 0x0000_0100);
            f.u32(QSTI, 0x0100_0200);
            f.u8(DATA, 0);
        });
        let topic = DialogueTopic::decode(&record).unwrap();
        assert_eq!(topic.kind, TopicKind::Topic);
        assert_eq!(
            topic.quests,
            vec![GlobalId::from_raw(0x100), GlobalId::from_raw(0x0100_0200)]
        );
    }

    #[test]
    fn test_info_responses_pair_up() {
        let record = raw(Tag::INFO, 2, |f| {
            f.field(DATA, &[1, 0, 0x04]);
            f.u32(QSTI, 0x0000_0100);
            f.u32(NAME, 0x0000_0300);
            f.compound(TRDT, |b| {
                b.extend_from_slice(&3u32.to_le_bytes());
                b.extend_from_slice(&50i32.to_le_bytes());
            });
            f.zstring(NAM1, "Greetings.");
            f.zstring(NAM1, "Farewell.");
        });
        let info = DialogueInfo::decode(&record).unwrap();
        assert_eq!(info.kind, TopicKind::Conversation);
        assert_eq!(info.flags, 0x04);
        assert_eq!(info.quest, Some(GlobalId::from_raw(0x100)));
        assert_eq!(info.topics, vec![GlobalId::from_raw(0x300)]);
        assert_eq!(info.responses.len(), 2);
        assert_eq!(info.responses[0].emotion_value, 50);
        assert_eq!(info.responses[0].text, "Greetings.");
        assert_eq!(info.responses[1].text, "Farewell.");
    }
}
