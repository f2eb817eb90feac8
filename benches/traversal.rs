use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plugin_store::format::{PluginWriter, RecordFlags};
use plugin_store::records::PluginHeader;
use plugin_store::traversal::walk_load_order;
use plugin_store::{
    Coordinator, EvictionPolicy, GroupLabel, GroupType, HandlerSet, LoadOrder, RecordIndex,
    StoreConfig, Tag,
};
use tempfile::TempDir;

const PLUGINS: usize = 24;

fn create_test_plugin(records: u32, compressed: bool) -> Vec<u8> {
    let flags = RecordFlags::default();
    let mut writer = PluginWriter::new();
    writer.write_record(0, flags, &PluginHeader::default());
    writer.begin_group(GroupType::Top, GroupLabel::RecordType(Tag::STAT));
    for serial in 0..records {
        let build = |f: &mut plugin_store::format::FieldWriter| {
            f.zstring(Tag::new(*b"EDID"), &format!("Static{serial:06}"));
            f.zstring(Tag::new(*b"MODL"), &format!("meshes/static/{serial:06}.nif"));
        };
        if compressed {
            writer.compressed_record(Tag::STAT, flags, 0x800 + serial, build);
        } else {
            writer.record(Tag::STAT, flags, 0x800 + serial, build);
        }
    }
    writer.end_group();
    writer.into_bytes()
}

fn create_load_order(records: u32) -> (TempDir, LoadOrder) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let names: Vec<String> = (0..PLUGINS).map(|i| format!("Plugin{i:02}.esm")).collect();
    for (i, name) in names.iter().enumerate() {
        std::fs::write(dir.path().join(name), create_test_plugin(records, i % 2 == 1))
            .expect("Failed to write plugin");
    }
    let load_order =
        LoadOrder::from_names(dir.path(), names.iter()).expect("Failed to build load order");
    (dir, load_order)
}

fn coordinator(load_order: &LoadOrder, pool_size: usize, eviction: EvictionPolicy) -> Coordinator {
    let config = StoreConfig {
        pool_size,
        eviction,
        seed: Some(1),
        data_dir: None,
    };
    Coordinator::new(load_order.clone(), &config).expect("Failed to create coordinator")
}

fn bench_skip_walk(c: &mut Criterion) {
    let (_dir, load_order) = create_load_order(2_000);
    let mut group = c.benchmark_group("skip_walk");
    group.sample_size(10);

    for pool_size in [2, 8, 32] {
        for eviction in [EvictionPolicy::Random, EvictionPolicy::Lru] {
            let label = format!("{eviction:?}");
            group.bench_with_input(BenchmarkId::new(label, pool_size), &pool_size, |b, &size| {
                b.iter(|| {
                    let coordinator = coordinator(&load_order, size, eviction);
                    let outcome = walk_load_order(&coordinator, &mut HandlerSet::new());
                    black_box(outcome.totals().records())
                })
            });
        }
    }
    group.finish();
}

fn bench_index_then_decode(c: &mut Criterion) {
    let (_dir, load_order) = create_load_order(2_000);
    let mut group = c.benchmark_group("index");
    group.sample_size(10);

    group.bench_function("build", |b| {
        b.iter(|| {
            let coordinator = coordinator(&load_order, 8, EvictionPolicy::Random);
            let (index, _) = RecordIndex::build(&coordinator);
            black_box(index.len())
        })
    });

    group.bench_function("decode_all_statics", |b| {
        let coordinator = coordinator(&load_order, 8, EvictionPolicy::Random);
        let (index, _) = RecordIndex::build(&coordinator);
        let ids: Vec<_> = index.ids_tagged(Tag::STAT).collect();
        b.iter(|| {
            for id in &ids {
                if let Ok(Some(mut accessor)) = index.accessor(&coordinator, *id) {
                    let record = accessor.read_raw_record().expect("Failed to read record");
                    black_box(record.payload().len());
                }
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_skip_walk, bench_index_then_decode);
criterion_main!(benches);
