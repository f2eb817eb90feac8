//! Four-byte ASCII type tags.

use bstr::ByteSlice;
use std::fmt;

/// A record, group or field type tag such as `CELL` or `EDID`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; 4]);

impl Tag {
    pub const TES4: Tag = Tag(*b"TES4");
    pub const GRUP: Tag = Tag(*b"GRUP");
    pub const GMST: Tag = Tag(*b"GMST");
    pub const GLOB: Tag = Tag(*b"GLOB");
    pub const STAT: Tag = Tag(*b"STAT");
    pub const CELL: Tag = Tag(*b"CELL");
    pub const WRLD: Tag = Tag(*b"WRLD");
    pub const ROAD: Tag = Tag(*b"ROAD");
    pub const REFR: Tag = Tag(*b"REFR");
    pub const ACHR: Tag = Tag(*b"ACHR");
    pub const ACRE: Tag = Tag(*b"ACRE");
    pub const LAND: Tag = Tag(*b"LAND");
    pub const PGRD: Tag = Tag(*b"PGRD");
    pub const DIAL: Tag = Tag(*b"DIAL");
    pub const INFO: Tag = Tag(*b"INFO");

    /// Field that carries the true size of the next field.
    pub const XXXX: Tag = Tag(*b"XXXX");

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Whether a `Top` group with this label holds a hierarchy instead of a flat run.
    pub fn is_structural(&self) -> bool {
        matches!(*self, Tag::CELL | Tag::WRLD | Tag::DIAL)
    }

    /// Whether this is one of the placed-object reference types.
    pub fn is_placed_reference(&self) -> bool {
        matches!(*self, Tag::REFR | Tag::ACHR | Tag::ACRE)
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_bstr())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0.as_bstr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_lossy_ascii() {
        assert_eq!(Tag::CELL.to_string(), "CELL");
        assert_eq!(format!("{:?}", Tag::REFR), "Tag(REFR)");
        let garbage = Tag::new([0xff, b'A', b'B', b'C']);
        assert_eq!(garbage.to_string(), "\u{FFFD}ABC");
    }

    #[test]
    fn test_structural_labels() {
        assert!(Tag::CELL.is_structural());
        assert!(Tag::WRLD.is_structural());
        assert!(Tag::DIAL.is_structural());
        assert!(!Tag::GMST.is_structural());
        assert!(Tag::ACRE.is_placed_reference());
        assert!(!Tag::LAND.is_placed_reference());
    }
}
