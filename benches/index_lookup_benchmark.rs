use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use debtags_index::indexer::{obtain_working_debtags, obtain_working_vocabulary, DebtagsIndexer};
use debtags_index::Config;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;

const FACETS: [&str; 6] = ["role", "suite", "use", "works-with", "interface", "implemented-in"];

// Sources for `pkg_count` packages over the facets above, ten tags each
fn create_sources(config: &Config, pkg_count: usize) {
    fs::create_dir_all(&config.source_dir).unwrap();

    let mut voc = String::new();
    for facet in FACETS {
        writeln!(voc, "Facet: {}\nDescription: {} facet\n", facet, facet).unwrap();
        for t in 0..10 {
            writeln!(voc, "Tag: {}::t{}\nDescription: tag {}\n", facet, t, t).unwrap();
        }
    }
    fs::write(config.source_dir.join("bench.voc"), voc).unwrap();

    let mut tags = String::new();
    for pkg in 0..pkg_count {
        let facet = FACETS[pkg % FACETS.len()];
        writeln!(tags, "pkg{:06}: {}::t{}, suite::t{}", pkg, facet, pkg % 10, pkg % 3).unwrap();
    }
    fs::write(config.source_dir.join("bench.tag"), tags).unwrap();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");

    for pkg_count in [1_000, 20_000] {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(temp_dir.path());
        create_sources(&config, pkg_count);

        group.bench_with_input(BenchmarkId::new("debtags", pkg_count), &config, |b, config| {
            b.iter(|| {
                let indexer = DebtagsIndexer::debtags(config, None);
                let paths = indexer.system_paths().clone();
                black_box(indexer.rebuild(&paths).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(temp_dir.path());
    create_sources(&config, 20_000);

    let voc = obtain_working_vocabulary(&config).unwrap().unwrap();
    let db = obtain_working_debtags(&config, Some(&voc)).unwrap().unwrap();

    let mut group = c.benchmark_group("lookup");

    group.bench_function("tag_by_name", |b| {
        b.iter(|| black_box(voc.tag_by_name(black_box("works-with::t7"))));
    });

    group.bench_function("item_id", |b| {
        b.iter(|| black_box(db.item_id(black_box("pkg012345"))));
    });

    group.bench_function("tags_of_item", |b| {
        b.iter(|| black_box(db.tags_of_item(black_box("pkg012345"))));
    });

    let query: BTreeSet<String> = ["role::t0", "suite::t0"].iter().map(|s| s.to_string()).collect();
    group.bench_function("items_having_all_tags", |b| {
        b.iter(|| black_box(db.items_having_all_tags(black_box(&query))));
    });

    // Served from the record cache after the first iteration
    let tag = voc.tag_by_name("role::t1").unwrap();
    group.bench_function("tag_data_warm", |b| {
        b.iter(|| black_box(voc.tag_data(&tag).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_rebuild, bench_lookup);
criterion_main!(benches);
