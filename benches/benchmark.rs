//! Benchmarks for the project document and storage scanner.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use idealab::storage::{scan, MemoryKvStore, MemoryObjectStore, ObjectStore, ReferenceIndex};
use idealab::{MediaKind, Project, ProjectManager, ScriptCut, StorageKey, StoredValue};

fn project_with_cuts(id: &str, cuts: usize) -> Project {
    let mut project = Project::new(id).with_series_name("Bench");
    for i in 0..cuts {
        let cut_id = format!("{}-cut-{}", id, i);
        let image = StorageKey::media(MediaKind::Images, &cut_id).to_reference();
        let audio = StorageKey::media(MediaKind::Audio, &cut_id).to_reference();
        project = project.with_cut(
            ScriptCut::new(&cut_id)
                .with_line("Narrator", "The tide comes in.")
                .with_duration(2.5)
                .with_final_image(image)
                .with_audio(audio),
        );
    }
    project
}

/// `projects` snapshots with `cuts` cuts each, all media present, plus one
/// orphan per project.
fn populated_store(projects: usize, cuts: usize) -> MemoryObjectStore {
    let mut store = MemoryObjectStore::new();
    for p in 0..projects {
        let id = format!("p{}", p);
        let project = project_with_cuts(&id, cuts);
        for key in project.media_references() {
            store.put(&key, StoredValue::blob(vec![0; 2048], "image/png")).unwrap();
        }
        let mut manager = ProjectManager::from_project(project).unwrap();
        store
            .put(&format!("project-{}", id), StoredValue::blob(manager.save(), "application/automerge"))
            .unwrap();
        store
            .put(&format!("media-images-stray-{}", id), StoredValue::text("data:image/png;base64,AA"))
            .unwrap();
    }
    store
}

fn bench_index_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_rebuild");
    for projects in [1usize, 10, 50] {
        let store = populated_store(projects, 20);
        let kv = MemoryKvStore::new();
        group.bench_with_input(BenchmarkId::from_parameter(projects), &projects, |b, _| {
            b.iter(|| black_box(ReferenceIndex::rebuild(&store, &kv).unwrap()))
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    for projects in [1usize, 10, 50] {
        let store = populated_store(projects, 20);
        let kv = MemoryKvStore::new();
        let index = ReferenceIndex::rebuild(&store, &kv).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(projects), &projects, |b, _| {
            b.iter(|| black_box(scan(&store, &kv, &index).unwrap()))
        });
    }
    group.finish();
}

fn bench_media_references(c: &mut Criterion) {
    c.bench_function("media_references_100_cuts", |b| {
        let project = project_with_cuts("p", 100);
        b.iter(|| black_box(project.media_references()))
    });
}

fn bench_save(c: &mut Criterion) {
    c.bench_function("save_100_cuts", |b| {
        let mut manager = ProjectManager::from_project(project_with_cuts("p", 100)).unwrap();
        b.iter(|| black_box(manager.save()))
    });
}

fn bench_update_state(c: &mut Criterion) {
    c.bench_function("set_series_name_reconcile", |b| {
        let mut manager = ProjectManager::from_project(project_with_cuts("p", 100)).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            manager
                .update_state(|state| state.series_name = format!("Series {}", i))
                .unwrap();
            i += 1;
        })
    });
}

fn bench_targeted_update(c: &mut Criterion) {
    c.bench_function("set_series_name_direct", |b| {
        let mut manager = ProjectManager::from_project(project_with_cuts("p", 100)).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            manager.set_series_name(&format!("Series {}", i)).unwrap();
            i += 1;
        })
    });
}

fn bench_attach_cut_media(c: &mut Criterion) {
    c.bench_function("attach_cut_media_direct", |b| {
        let mut manager = ProjectManager::from_project(project_with_cuts("p", 100)).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            let reference = format!("idb://media-images-new-{}", i);
            manager.attach_cut_media("p-cut-50", MediaKind::Images, &reference).unwrap();
            i += 1;
        })
    });
}

criterion_group!(
    benches,
    bench_index_rebuild,
    bench_scan,
    bench_media_references,
    bench_save,
    bench_update_state,
    bench_targeted_update,
    bench_attach_cut_media,
);

criterion_main!(benches);
