//! Plugin fixtures shared by the integration tests.
#![allow(dead_code)]

use plugin_store::format::{FieldWriter, PluginWriter, RecordFlags};
use plugin_store::records::{GameSetting, PlacedReference, PluginHeader};
use plugin_store::{
    Coordinator, EvictionPolicy, GlobalId, GroupLabel, GroupType, LoadOrder, SettingValue,
    StoreConfig, Tag,
};
use tempfile::TempDir;

pub const EDID: Tag = Tag::new(*b"EDID");
pub const MODL: Tag = Tag::new(*b"MODL");
pub const DATA: Tag = Tag::new(*b"DATA");
pub const PGRP: Tag = Tag::new(*b"PGRP");
pub const NAM1: Tag = Tag::new(*b"NAM1");
pub const XCLC: Tag = Tag::new(*b"XCLC");

pub const NO_FLAGS: RecordFlags = RecordFlags::from_bits(0);

/// Directory of plugin files that lives as long as the fixture
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn write(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.dir.path().join(name), bytes).expect("Failed to write plugin");
    }

    pub fn coordinator(&self, names: &[&str], pool_size: usize) -> Coordinator {
        self.coordinator_with(names, pool_size, EvictionPolicy::Random)
    }

    pub fn coordinator_with(
        &self,
        names: &[&str],
        pool_size: usize,
        eviction: EvictionPolicy,
    ) -> Coordinator {
        let load_order = LoadOrder::from_names(self.dir.path(), names.iter().copied())
            .expect("Failed to build load order");
        let config = StoreConfig {
            pool_size,
            eviction,
            seed: Some(7),
            data_dir: None,
        };
        Coordinator::new(load_order, &config).expect("Failed to create coordinator")
    }

    /// The standard three-file set: `Base.esm`, `Other.esm`, `Mod.esp`
    pub fn standard() -> Self {
        let fixture = Self::new();
        fixture.write("Base.esm", &base_plugin());
        fixture.write("Other.esm", &empty_plugin(&[]));
        fixture.write("Mod.esp", &mod_plugin(&["Base.esm"]));
        fixture
    }
}

pub const STANDARD: &[&str] = &["Base.esm", "Other.esm", "Mod.esp"];

pub fn edid(f: &mut FieldWriter, text: &str) {
    f.zstring(EDID, text);
}

/// Writer with the file header already written
pub fn plugin_with_masters(masters: &[&str]) -> PluginWriter {
    let mut writer = PluginWriter::new();
    writer.write_record(0, NO_FLAGS, &PluginHeader::with_masters(masters));
    writer
}

pub fn empty_plugin(masters: &[&str]) -> Vec<u8> {
    plugin_with_masters(masters).into_bytes()
}

fn reference(kind: Tag, base: u32) -> PlacedReference {
    PlacedReference::new(kind, GlobalId::from_raw(base))
}

fn parent(id: u32) -> GroupLabel<u32> {
    GroupLabel::Parent(id)
}

/// A master exercising every hierarchy the driver knows.
///
/// | id | record |
/// |----|--------|
/// | 0x010, 0x011 | GMST iMaxLevel, fJumpHeight |
/// | 0x100, 0x101 | STAT Rock, Tree |
/// | 0x200 | interior CELL Inn, one persistent REFR 0x300 |
/// | 0x201 | interior CELL Cellar, no children |
/// | 0x400 | WRLD Tamriel with ROAD 0x405 |
/// | 0x401 | persistent world CELL, ACHR 0x406 |
/// | 0x402 | exterior CELL (0, 0), LAND 0x403 and REFR 0x404 |
/// | 0x500 | DIAL GREETING with INFO 0x501 |
pub fn base_plugin() -> Vec<u8> {
    let mut w = plugin_with_masters(&[]);

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::GMST));
    w.write_record(
        0x010,
        NO_FLAGS,
        &GameSetting {
            editor_id: "iMaxLevel".to_string(),
            value: SettingValue::Int(50),
        },
    );
    w.write_record(
        0x011,
        NO_FLAGS,
        &GameSetting {
            editor_id: "fJumpHeight".to_string(),
            value: SettingValue::Float(64.0),
        },
    );
    w.end_group();

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::STAT));
    w.record(Tag::STAT, NO_FLAGS, 0x100, |f| {
        edid(f, "Rock");
        f.zstring(MODL, "rock.nif");
    });
    w.record(Tag::STAT, NO_FLAGS, 0x101, |f| {
        edid(f, "Tree");
        f.zstring(MODL, "tree.nif");
    });
    w.end_group();

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::CELL));
    w.begin_group(GroupType::InteriorCellBlock, GroupLabel::Block(0));
    w.begin_group(GroupType::InteriorCellSubBlock, GroupLabel::Block(0));
    w.record(Tag::CELL, NO_FLAGS, 0x200, |f| {
        edid(f, "Inn");
        f.u8(DATA, 0x01);
    });
    w.begin_group(GroupType::CellChildren, parent(0x200));
    w.begin_group(GroupType::CellPersistentChildren, parent(0x200));
    w.write_record(0x300, NO_FLAGS, &reference(Tag::REFR, 0x100));
    w.end_group();
    w.end_group();
    w.record(Tag::CELL, NO_FLAGS, 0x201, |f| {
        edid(f, "Cellar");
        f.u8(DATA, 0x01);
    });
    w.end_group();
    w.end_group();
    w.end_group();

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::WRLD));
    w.record(Tag::WRLD, NO_FLAGS, 0x400, |f| edid(f, "Tamriel"));
    w.begin_group(GroupType::WorldChildren, parent(0x400));
    w.record(Tag::ROAD, NO_FLAGS, 0x405, |f| f.field(PGRP, &[0u8; 32]));
    w.record(Tag::CELL, NO_FLAGS, 0x401, |f| f.u8(DATA, 0x00));
    w.begin_group(GroupType::CellChildren, parent(0x401));
    w.begin_group(GroupType::CellPersistentChildren, parent(0x401));
    w.write_record(0x406, NO_FLAGS, &reference(Tag::ACHR, 0x101));
    w.end_group();
    w.end_group();
    w.begin_group(GroupType::ExteriorCellBlock, GroupLabel::Grid { x: 0, y: 0 });
    w.begin_group(GroupType::ExteriorCellSubBlock, GroupLabel::Grid { x: 0, y: 0 });
    w.record(Tag::CELL, NO_FLAGS, 0x402, |f| {
        f.u8(DATA, 0x00);
        f.compound(XCLC, |b| {
            b.extend_from_slice(&0i32.to_le_bytes());
            b.extend_from_slice(&0i32.to_le_bytes());
        });
    });
    w.begin_group(GroupType::CellChildren, parent(0x402));
    w.begin_group(GroupType::CellTemporaryChildren, parent(0x402));
    w.record(Tag::LAND, NO_FLAGS, 0x403, |f| f.u32(DATA, 0x1f));
    w.write_record(0x404, NO_FLAGS, &reference(Tag::REFR, 0x100));
    w.end_group();
    w.end_group();
    w.end_group();
    w.end_group();
    w.end_group();
    w.end_group();

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::DIAL));
    w.record(Tag::DIAL, NO_FLAGS, 0x500, |f| {
        edid(f, "GREETING");
        f.u8(DATA, 0);
    });
    w.begin_group(GroupType::TopicChildren, parent(0x500));
    w.record(Tag::INFO, NO_FLAGS, 0x501, |f| {
        f.field(DATA, &[0, 0, 0]);
        f.zstring(NAM1, "Hello.");
    });
    w.end_group();
    w.end_group();

    w.into_bytes()
}

/// Records in [`base_plugin`], file header included
pub const BASE_RECORDS: u64 = 17;
/// Groups in [`base_plugin`], nested ones included
pub const BASE_GROUPS: u64 = 17;

/// A plugin overriding `Base.esm`; `masters` decides how its slots resolve.
///
/// Slot 0 is the first master, slot `masters.len()` the plugin itself.
///
/// - GMST 0x010 iMaxLevel = 60 (override)
/// - STAT 0x100 MossyRock (override), STAT own 0x800 Statue
/// - CELL 0x200 (override) with temporary REFR own 0x801 placing own 0x800
pub fn mod_plugin(masters: &[&str]) -> Vec<u8> {
    let own = (masters.len() as u32) << 24;
    let mut w = plugin_with_masters(masters);

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::GMST));
    w.write_record(
        0x010,
        NO_FLAGS,
        &GameSetting {
            editor_id: "iMaxLevel".to_string(),
            value: SettingValue::Int(60),
        },
    );
    w.end_group();

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::STAT));
    w.record(Tag::STAT, NO_FLAGS, 0x100, |f| {
        edid(f, "MossyRock");
        f.zstring(MODL, "rock_moss.nif");
    });
    w.record(Tag::STAT, NO_FLAGS, own | 0x800, |f| edid(f, "Statue"));
    w.end_group();

    w.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::CELL));
    w.begin_group(GroupType::InteriorCellBlock, GroupLabel::Block(0));
    w.begin_group(GroupType::InteriorCellSubBlock, GroupLabel::Block(0));
    w.record(Tag::CELL, NO_FLAGS, 0x200, |f| {
        edid(f, "Inn");
        f.u8(DATA, 0x01);
    });
    w.begin_group(GroupType::CellChildren, parent(0x200));
    w.begin_group(GroupType::CellTemporaryChildren, parent(0x200));
    w.write_record(own | 0x801, NO_FLAGS, &reference(Tag::REFR, own | 0x800));
    w.end_group();
    w.end_group();
    w.end_group();
    w.end_group();
    w.end_group();

    w.into_bytes()
}
