//! Group headers.
//!
//! Groups are separators, not records. `Top` groups hold a flat run of one record
//! type; every other kind sits inside the cell, world and topic hierarchies and
//! holds either further groups or a small fixed set of record types.

use crate::error::{Result, StoreError};
use crate::format::{Tag, GROUP_HEADER_SIZE};
use crate::ident::GlobalId;

/// Group kind, stored on disk as an `i32` ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupType {
    /// One per record type; label is the record tag
    Top,
    /// Label is the parent world
    WorldChildren,
    /// Label is the block number
    InteriorCellBlock,
    /// Label is the sub-block number
    InteriorCellSubBlock,
    /// Label is a grid coordinate
    ExteriorCellBlock,
    /// Label is a grid coordinate
    ExteriorCellSubBlock,
    /// Label is the parent cell
    CellChildren,
    /// Label is the parent topic
    TopicChildren,
    CellPersistentChildren,
    CellTemporaryChildren,
    CellVisibleDistantChildren,
}

impl GroupType {
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        Some(match ordinal {
            0 => Self::Top,
            1 => Self::WorldChildren,
            2 => Self::InteriorCellBlock,
            3 => Self::InteriorCellSubBlock,
            4 => Self::ExteriorCellBlock,
            5 => Self::ExteriorCellSubBlock,
            6 => Self::CellChildren,
            7 => Self::TopicChildren,
            8 => Self::CellPersistentChildren,
            9 => Self::CellTemporaryChildren,
            10 => Self::CellVisibleDistantChildren,
            _ => return None,
        })
    }

    pub fn ordinal(&self) -> i32 {
        match self {
            Self::Top => 0,
            Self::WorldChildren => 1,
            Self::InteriorCellBlock => 2,
            Self::InteriorCellSubBlock => 3,
            Self::ExteriorCellBlock => 4,
            Self::ExteriorCellSubBlock => 5,
            Self::CellChildren => 6,
            Self::TopicChildren => 7,
            Self::CellPersistentChildren => 8,
            Self::CellTemporaryChildren => 9,
            Self::CellVisibleDistantChildren => 10,
        }
    }

    /// Whether this is one of the three cell partitions
    pub fn is_cell_partition(&self) -> bool {
        matches!(
            self,
            Self::CellPersistentChildren
                | Self::CellTemporaryChildren
                | Self::CellVisibleDistantChildren
        )
    }
}

/// The 4-byte label union, interpreted according to the group type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLabel<Id = GlobalId> {
    RecordType(Tag),
    Parent(Id),
    Block(i32),
    /// Exterior grid coordinate; stored on disk as `y` then `x`
    Grid { x: i16, y: i16 },
}

impl GroupLabel<u32> {
    /// Interpret raw label bytes for a group type, leaving identifiers as stored
    pub fn decode(group_type: GroupType, raw: [u8; 4]) -> Self {
        match group_type {
            GroupType::Top => Self::RecordType(Tag::new(raw)),
            GroupType::InteriorCellBlock | GroupType::InteriorCellSubBlock => {
                Self::Block(i32::from_le_bytes(raw))
            }
            GroupType::ExteriorCellBlock | GroupType::ExteriorCellSubBlock => Self::Grid {
                y: i16::from_le_bytes([raw[0], raw[1]]),
                x: i16::from_le_bytes([raw[2], raw[3]]),
            },
            _ => Self::Parent(u32::from_le_bytes(raw)),
        }
    }

    pub fn encode(&self) -> [u8; 4] {
        match *self {
            Self::RecordType(tag) => tag.bytes(),
            Self::Parent(id) => id.to_le_bytes(),
            Self::Block(n) => n.to_le_bytes(),
            Self::Grid { x, y } => {
                let y = y.to_le_bytes();
                let x = x.to_le_bytes();
                [y[0], y[1], x[0], x[1]]
            }
        }
    }
}

impl<Id> GroupLabel<Id> {
    pub fn try_map_id<J>(self, f: impl FnOnce(Id) -> Result<J>) -> Result<GroupLabel<J>> {
        Ok(match self {
            Self::RecordType(tag) => GroupLabel::RecordType(tag),
            Self::Parent(id) => GroupLabel::Parent(f(id)?),
            Self::Block(n) => GroupLabel::Block(n),
            Self::Grid { x, y } => GroupLabel::Grid { x, y },
        })
    }

    pub fn record_type(&self) -> Option<Tag> {
        match self {
            Self::RecordType(tag) => Some(*tag),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<&Id> {
        match self {
            Self::Parent(id) => Some(id),
            _ => None,
        }
    }
}

/// A decoded group header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group<Id = GlobalId> {
    pub group_type: GroupType,
    pub label: GroupLabel<Id>,
    /// Total size including the 20-byte header
    pub size: u32,
    pub stamp: u32,
    /// Absolute offset of the `GRUP` marker
    pub offset: u64,
}

impl<Id> Group<Id> {
    /// Offset of the first child unit.
    pub fn content_offset(&self) -> u64 {
        self.offset + GROUP_HEADER_SIZE
    }

    /// Offset just past the last child unit.
    pub fn end_offset(&self) -> u64 {
        self.offset + u64::from(self.size)
    }

    pub fn try_map_id<J>(self, f: impl FnOnce(Id) -> Result<J>) -> Result<Group<J>> {
        Ok(Group {
            group_type: self.group_type,
            label: self.label.try_map_id(f)?,
            size: self.size,
            stamp: self.stamp,
            offset: self.offset,
        })
    }

    /// Ensure this group is of the expected kind
    pub fn expect_type(self, expected: GroupType) -> Result<Self> {
        if self.group_type != expected {
            return Err(StoreError::group_schema(
                self.offset,
                format!("expected {expected:?} group, found {:?}", self.group_type),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_cover_all_kinds() {
        for ordinal in 0..=10 {
            let kind = GroupType::from_ordinal(ordinal).unwrap();
            assert_eq!(kind.ordinal(), ordinal);
        }
        assert_eq!(GroupType::from_ordinal(11), None);
        assert_eq!(GroupType::from_ordinal(-1), None);
    }

    #[test]
    fn test_label_interpretation() {
        let grid = GroupLabel::decode(GroupType::ExteriorCellBlock, [0xff, 0xff, 0x02, 0x00]);
        assert_eq!(grid, GroupLabel::Grid { x: 2, y: -1 });
        assert_eq!(grid.encode(), [0xff, 0xff, 0x02, 0x00]);

        let top = GroupLabel::decode(GroupType::Top, *b"CELL");
        assert_eq!(top.record_type(), Some(Tag::CELL));

        let parent = GroupLabel::decode(GroupType::CellTemporaryChildren, [1, 0, 0, 1]);
        assert_eq!(parent.parent(), Some(&0x0100_0001));

        let block = GroupLabel::decode(GroupType::InteriorCellSubBlock, 7i32.to_le_bytes());
        assert_eq!(block, GroupLabel::Block(7));
    }

    #[test]
    fn test_expect_type() {
        let group = Group {
            group_type: GroupType::CellChildren,
            label: GroupLabel::Parent(1u32),
            size: 20,
            stamp: 0,
            offset: 64,
        };
        assert_eq!(group.end_offset(), 84);
        assert!(group.expect_type(GroupType::CellChildren).is_ok());
        match group.expect_type(GroupType::Top) {
            Err(StoreError::GroupSchema { offset, .. }) => assert_eq!(offset, 64),
            other => panic!("expected GroupSchema, got {other:?}"),
        }
    }
}
