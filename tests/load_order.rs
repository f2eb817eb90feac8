mod common;

use common::*;
use plugin_store::records::{GameSetting, PlacedReference, StaticObject};
use plugin_store::traversal::{walk_file, walk_load_order};
use plugin_store::{
    EvictionPolicy, GlobalId, HandlerSet, RecordIndex, SettingValue, SettingsHandler,
    StoreError, Tag,
};
use std::collections::HashMap;
use std::sync::Arc;

#[test]
fn mod_identifiers_translate_through_masters() {
    let fixture = Fixture::standard();
    let coordinator = fixture.coordinator(STANDARD, 2);

    let mut references = Vec::new();
    let mut handlers = HandlerSet::new();
    handlers.on::<PlacedReference, _>(|header, reference, context| {
        references.push((header.id, reference.base, context.cell));
        Ok(())
    });
    walk_file(&coordinator, 2, &mut handlers).expect("walk failed");
    drop(handlers);

    // slot 0 is Base.esm (global 0), slot 1 is Mod.esp itself (global 2)
    assert_eq!(
        references,
        vec![(
            GlobalId::new(2, 0x801),
            GlobalId::new(2, 0x800),
            Some(GlobalId::new(0, 0x200)),
        )]
    );
    let local = coordinator.local_load_order(2).unwrap();
    assert_eq!(local.masters(), ["Base.esm".to_string()]);
    assert_eq!(local.global_index_of_slot(1), Some(2));
}

#[test]
fn missing_master_fails_only_that_file() {
    let fixture = Fixture::new();
    fixture.write("Base.esm", &base_plugin());
    fixture.write("Mod.esp", &mod_plugin(&["Expansion.esm"]));
    let coordinator = fixture.coordinator(&["Base.esm", "Mod.esp"], 2);

    let outcome = walk_load_order(&coordinator, &mut HandlerSet::new());
    assert_eq!(outcome.walked.len(), 1);
    assert_eq!(outcome.walked[0].0, 0);
    assert_eq!(outcome.failures.len(), 1);

    let failure = &outcome.failures[0];
    assert_eq!(failure.index, 1);
    assert_eq!(failure.name, "Mod.esp");
    match failure.error.root() {
        StoreError::MissingMaster { file, master } => {
            assert_eq!(file, "Mod.esp");
            assert_eq!(master, "Expansion.esm");
        }
        other => panic!("expected MissingMaster, got {other:?}"),
    }
}

#[test]
fn undeclared_slot_names_the_file() {
    let fixture = Fixture::new();
    fixture.write("Base.esm", &base_plugin());
    let mut w = plugin_with_masters(&["Base.esm"]);
    w.begin_group(
        plugin_store::GroupType::Top,
        plugin_store::GroupLabel::RecordType(Tag::STAT),
    );
    w.record(Tag::STAT, NO_FLAGS, 0x0500_0001, |f| edid(f, "Orphan"));
    w.end_group();
    fixture.write("Mod.esp", &w.into_bytes());
    let coordinator = fixture.coordinator(&["Base.esm", "Mod.esp"], 2);

    let err = walk_file(&coordinator, 1, &mut HandlerSet::new()).unwrap_err();
    match err.root() {
        StoreError::UndeclaredMaster {
            file,
            id,
            slot,
            declared,
        } => {
            assert_eq!(file, "Mod.esp");
            assert_eq!(*id, 0x0500_0001);
            assert_eq!(*slot, 5);
            assert_eq!(*declared, 2);
        }
        other => panic!("expected UndeclaredMaster, got {other:?}"),
    }
    assert!(err.to_string().contains("Mod.esp"));
}

#[test]
fn index_records_overrides_and_defers_decoding() {
    let fixture = Fixture::standard();
    let coordinator = fixture.coordinator(STANDARD, 1);

    let (index, failures) = RecordIndex::build(&coordinator);
    assert!(failures.is_empty());
    assert_eq!(index.len(), (BASE_RECORDS - 1) as usize + 2);
    assert_eq!(index.override_count(), 3);
    assert_eq!(index.overrides_in(2), 3);
    assert_eq!(index.overrides_in(0), 0);

    let rock = GlobalId::new(0, 0x100);
    assert_eq!(index.get(rock).map(|l| l.file), Some(2));
    let mut accessor = index
        .accessor(&coordinator, rock)
        .unwrap()
        .expect("indexed record");
    let (header, object) = accessor.read_record::<StaticObject>().unwrap();
    assert_eq!(header.id, rock);
    assert_eq!(object.editor_id.as_deref(), Some("MossyRock"));

    let tree = GlobalId::new(0, 0x101);
    let location = index.get(tree).copied().expect("indexed record");
    assert_eq!(location.file, 0);
    assert_eq!(location.tag, Tag::STAT);
    assert!(index.accessor(&coordinator, GlobalId::new(1, 1)).unwrap().is_none());
}

#[test]
fn settings_flow_into_sink_in_load_order() {
    let fixture = Fixture::standard();
    let coordinator = fixture.coordinator(STANDARD, 2);

    let mut settings: HashMap<String, SettingValue> = HashMap::new();
    let mut handlers = HandlerSet::new();
    SettingsHandler::new(&mut settings).register(&mut handlers);
    let outcome = walk_load_order(&coordinator, &mut handlers);
    drop(handlers);

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.totals().per_tag[&Tag::GMST], 3);
    assert_eq!(settings.len(), 2);
    assert_eq!(settings["iMaxLevel"], SettingValue::Int(60));
    assert_eq!(settings["fJumpHeight"], SettingValue::Float(64.0));
}

#[test]
fn pool_stays_bounded_over_many_plugins() {
    let fixture = Fixture::new();
    let names: Vec<String> = (0..8).map(|i| format!("Plugin{i}.esm")).collect();
    for name in &names {
        fixture.write(name, &base_plugin());
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    for policy in [EvictionPolicy::Random, EvictionPolicy::Lru] {
        let coordinator = fixture.coordinator_with(&refs, 3, policy);
        let mut accessors: Vec<_> = (0..refs.len())
            .map(|file| coordinator.accessor(file).unwrap())
            .collect();

        // interleave reads so every file is reopened many times
        for _ in 0..3 {
            for accessor in accessors.iter_mut() {
                let header = accessor.skip_record().unwrap();
                assert!(coordinator.open_handle_count() <= 3);
                assert!(coordinator.is_open(accessor.file()));
                if header.tag == Tag::TES4 {
                    assert!(accessor.peek_group_type().unwrap().is_some());
                    accessor.read_group().unwrap();
                }
            }
        }

        if policy == EvictionPolicy::Lru {
            let open: Vec<usize> = (0..refs.len()).filter(|f| coordinator.is_open(*f)).collect();
            assert_eq!(open, vec![5, 6, 7]);
        }
    }
}

#[test]
fn accessor_copies_move_independently() {
    let fixture = Fixture::standard();
    let coordinator = fixture.coordinator(STANDARD, 1);

    let mut first = coordinator.accessor_by_name("base.ESM").unwrap();
    let tag = first.peek_record_type().unwrap();
    assert_eq!(first.position(), 0);
    let header = first.read_record_header().unwrap();
    assert_eq!(Some(header.tag), tag);
    assert_eq!(first.position(), 20);

    let mut reader = coordinator.accessor(0).unwrap();
    let skipper = {
        let mut a = reader;
        a.skip_record().unwrap();
        a
    };
    assert_eq!(reader.position(), 0);
    reader.read_raw_record().unwrap();
    assert_eq!(reader.position(), skipper.position());
    assert_eq!(skipper.position(), header.end_offset());

    // reading on through either copy sees the same next unit
    let mut a = reader;
    let mut b = skipper;
    assert_eq!(a.read_group().unwrap(), b.read_group().unwrap());
    let (ha, sa) = a.read_record::<GameSetting>().unwrap();
    let hb = b.skip_record().unwrap();
    assert_eq!(ha, hb);
    assert_eq!(a.position(), b.position());
    assert_eq!(sa.editor_id, "iMaxLevel");

    assert!(matches!(
        coordinator.accessor_by_name("Missing.esp"),
        Err(StoreError::UnknownPlugin { .. })
    ));
}

#[test]
fn readers_share_the_pool_across_threads() {
    let fixture = Fixture::standard();
    let coordinator = Arc::new(fixture.coordinator(STANDARD, 1));

    std::thread::scope(|scope| {
        for round in 0..4 {
            for file in 0..STANDARD.len() {
                let coordinator = Arc::clone(&coordinator);
                scope.spawn(move || {
                    let stats = walk_file(&coordinator, file, &mut HandlerSet::new())
                        .unwrap_or_else(|e| panic!("round {round}, file {file}: {e}"));
                    assert!(stats.records() >= 1);
                });
            }
        }
    });
    assert!(coordinator.open_handle_count() <= 1);
}

#[test]
fn failed_file_leaves_no_overrides_in_index() {
    let fixture = Fixture::new();
    fixture.write("Base.esm", &base_plugin());
    let mut broken = mod_plugin(&["Base.esm"]);
    // cut into the final reference, after the GMST and STAT overrides
    broken.truncate(broken.len() - 3);
    fixture.write("Mod.esp", &broken);
    let coordinator = fixture.coordinator(&["Base.esm", "Mod.esp"], 2);

    let (index, failures) = RecordIndex::build(&coordinator);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 1);
    assert!(matches!(failures[0].error.root(), StoreError::Truncated { .. }));

    assert_eq!(index.len(), (BASE_RECORDS - 1) as usize);
    assert_eq!(index.override_count(), 0);
    assert_eq!(index.overrides_in(1), 0);
    for id in [GlobalId::new(0, 0x10), GlobalId::new(0, 0x100)] {
        assert_eq!(index.get(id).map(|l| l.file), Some(0));
    }
}
