//! End-to-end planning tests: snapshot a real tree, build a plan, and
//! check the operations without ever applying them.

use media_sweeper::core::config::EngineConfig;
use media_sweeper::core::fingerprint::{FingerprintEngine, Strategy};
use media_sweeper::core::grouper;
use media_sweeper::core::plan::builder::{self, MirrorMode};
use media_sweeper::core::plan::OpKind;
use media_sweeper::core::naming::{GridResolver, SortStrategy};
use media_sweeper::core::walker::{Selection, TreeWalker, WalkConfig, WalkResult};
use media_sweeper::events::null_sender;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn write_file(path: &Path, contents: &[u8], mtime_secs: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs);
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

fn media_snapshot(root: &Path) -> WalkResult {
    TreeWalker::new(WalkConfig::default()).walk(&[root.to_path_buf()])
}

fn full_snapshot(root: &Path) -> WalkResult {
    let config = WalkConfig {
        include_hidden: true,
        selection: Selection::All,
        ..WalkConfig::default()
    };
    TreeWalker::new(config).walk(&[root.to_path_buf()])
}

fn engine() -> FingerprintEngine {
    FingerprintEngine::new(EngineConfig {
        workers: 4,
        verify_bytes: true,
    })
}

#[test]
fn dedup_keeps_the_oldest_copy() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("a.jpg"), b"same pixels", 1_000_000);
    write_file(&tmp.path().join("b.jpg"), b"same pixels", 2_000_000);
    write_file(&tmp.path().join("c.jpg"), b"same pixels", 3_000_000);

    let walk = media_snapshot(tmp.path());
    let set = engine().fingerprint_all(&walk.records, Strategy::Content, &null_sender());
    let groups = grouper::group(&walk.records, &set);
    assert_eq!(groups.len(), 1);

    let plan = builder::dedup_plan(tmp.path(), &groups, None, true).unwrap();
    assert_eq!(plan.len(), 2);
    assert!(plan.ops.iter().all(|op| op.kind == OpKind::Delete));
    assert!(plan
        .ops
        .iter()
        .all(|op| !op.source.ends_with("a.jpg")));
}

#[test]
fn distinct_files_produce_an_empty_dedup_plan() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("a.jpg"), b"first", 1_000_000);
    write_file(&tmp.path().join("b.jpg"), b"second", 2_000_000);

    let walk = media_snapshot(tmp.path());
    let set = engine().fingerprint_all(&walk.records, Strategy::Content, &null_sender());
    let groups = grouper::group(&walk.records, &set);

    let plan = builder::dedup_plan(tmp.path(), &groups, None, true).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn planning_mutates_nothing() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.jpg");
    let b = tmp.path().join("b.jpg");
    write_file(&a, b"same pixels", 1_000_000);
    write_file(&b, b"same pixels", 2_000_000);

    let walk = media_snapshot(tmp.path());
    let set = engine().fingerprint_all(&walk.records, Strategy::Content, &null_sender());
    let groups = grouper::group(&walk.records, &set);
    let plan = builder::dedup_plan(tmp.path(), &groups, None, true).unwrap();
    assert!(!plan.is_empty());

    assert!(a.exists());
    assert!(b.exists());
    assert_eq!(fs::read(&b).unwrap(), b"same pixels");
}

#[test]
fn identical_trees_yield_identical_operations() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("x/a.jpg"), b"one", 1_000_000);
    write_file(&tmp.path().join("x/b.jpg"), b"one", 2_000_000);
    write_file(&tmp.path().join("y/c.jpg"), b"two", 3_000_000);
    write_file(&tmp.path().join("y/d.jpg"), b"two", 4_000_000);

    let build = || {
        let walk = media_snapshot(tmp.path());
        let set = engine().fingerprint_all(&walk.records, Strategy::Content, &null_sender());
        let groups = grouper::group(&walk.records, &set);
        builder::dedup_plan(tmp.path(), &groups, None, true).unwrap()
    };

    let first = build();
    let second = build();
    assert_eq!(first.ops, second.ops);
}

#[test]
fn quarantine_plan_moves_instead_of_deleting() {
    let tmp = TempDir::new().unwrap();
    let quarantine = TempDir::new().unwrap();
    write_file(&tmp.path().join("a.jpg"), b"same", 1_000_000);
    write_file(&tmp.path().join("album/b.jpg"), b"same", 2_000_000);

    let walk = media_snapshot(tmp.path());
    let set = engine().fingerprint_all(&walk.records, Strategy::Content, &null_sender());
    let groups = grouper::group(&walk.records, &set);
    let plan =
        builder::dedup_plan(tmp.path(), &groups, Some(quarantine.path()), true).unwrap();

    let mv = plan.ops.iter().find(|op| op.kind == OpKind::Move).unwrap();
    assert_eq!(
        mv.dest.as_ref().unwrap(),
        &quarantine.path().join("album").join("b.jpg")
    );
    assert!(plan.ops.iter().all(|op| op.kind != OpKind::Delete));
}

#[test]
fn remove_files_plans_deletes_and_prunes() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("album/photo.jpg"), b"keep", 1_000_000);
    write_file(&tmp.path().join("album/.DS_Store"), b"junk", 1_000_000);
    write_file(&tmp.path().join("junk/sub/Thumbs.db"), b"junk", 1_000_000);

    let walk = full_snapshot(tmp.path());
    let plan = builder::remove_files_plan(
        tmp.path(),
        &walk,
        &[r"^\.DS_Store$".to_string(), r"(?i)^thumbs\.db$".to_string()],
        true,
    )
    .unwrap();

    let deletes: Vec<&PathBuf> = plan
        .ops
        .iter()
        .filter(|op| op.kind == OpKind::Delete)
        .map(|op| &op.source)
        .collect();
    assert_eq!(deletes.len(), 2);

    let prunes: Vec<&PathBuf> = plan
        .ops
        .iter()
        .filter(|op| op.kind == OpKind::RemoveEmptyDir)
        .map(|op| &op.source)
        .collect();
    // album keeps photo.jpg; junk/sub and junk become empty.
    assert_eq!(
        prunes,
        vec![
            &tmp.path().join("junk").join("sub"),
            &tmp.path().join("junk")
        ]
    );
}

#[test]
fn sort_by_date_buckets_on_modification_time() {
    let tmp = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    // 2023-03-14 (no EXIF, so mtime decides the bucket)
    write_file(&tmp.path().join("shot.jpg"), b"pixels", 1_678_800_000);

    let walk = media_snapshot(tmp.path());
    let plan = builder::sort_plan(
        tmp.path(),
        dst.path(),
        &walk.records,
        SortStrategy::ByDate,
        &GridResolver,
        MirrorMode::Copy,
    )
    .unwrap();

    assert_eq!(plan.len(), 2);
    assert_eq!(plan.ops[0].kind, OpKind::CreateDir);
    assert_eq!(
        plan.ops[0].source,
        dst.path().join("2023").join("03")
    );
    assert_eq!(plan.ops[1].kind, OpKind::Copy);
    assert_eq!(
        plan.ops[1].dest.as_ref().unwrap(),
        &dst.path().join("2023").join("03").join("shot.jpg")
    );
}

#[test]
fn sort_suffixes_only_distinct_occupants() {
    let tmp = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    // 2023-03-14
    write_file(&tmp.path().join("shot.jpg"), b"pixels", 1_678_800_000);
    write_file(&tmp.path().join("other.jpg"), b"frames", 1_678_800_100);

    let bucket = dst.path().join("2023").join("03");
    fs::create_dir_all(&bucket).unwrap();
    // Same bytes as shot.jpg, a leftover from an earlier mirror run.
    write_file(&bucket.join("shot.jpg"), b"pixels", 1_678_900_000);
    // Same name as other.jpg but different bytes, so it must keep its slot.
    write_file(&bucket.join("other.jpg"), b"not frames", 1_678_900_000);

    let walk = media_snapshot(tmp.path());
    let plan = builder::sort_plan(
        tmp.path(),
        dst.path(),
        &walk.records,
        SortStrategy::ByDate,
        &GridResolver,
        MirrorMode::Copy,
    )
    .unwrap();

    let dests: Vec<&PathBuf> = plan
        .ops
        .iter()
        .filter(|op| op.kind == OpKind::Copy)
        .map(|op| op.dest.as_ref().unwrap())
        .collect();
    assert_eq!(dests, vec![&bucket.join("other_1.jpg")]);
}

#[test]
fn sort_without_coordinates_lands_in_the_unknown_bucket() {
    let tmp = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    write_file(&tmp.path().join("shot.jpg"), b"pixels", 1_678_800_000);

    let walk = media_snapshot(tmp.path());
    let plan = builder::sort_plan(
        tmp.path(),
        dst.path(),
        &walk.records,
        SortStrategy::ByLocation,
        &GridResolver,
        MirrorMode::Copy,
    )
    .unwrap();

    let copy = plan.ops.iter().find(|op| op.kind == OpKind::Copy).unwrap();
    assert!(copy
        .dest
        .as_ref()
        .unwrap()
        .starts_with(dst.path().join("Unknown")));
}

#[test]
fn rename_assigns_sequence_by_age() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("beach.jpg"), b"b", 2_000_000);
    write_file(&tmp.path().join("aaa.jpg"), b"a", 3_000_000);
    write_file(&tmp.path().join("clip.mp4"), b"c", 1_000_000);

    let walk = media_snapshot(tmp.path());
    let plan = builder::rename_plan(tmp.path(), &walk.records, 6).unwrap();

    let dest_of = |name: &str| {
        plan.ops
            .iter()
            .find(|op| op.source.ends_with(name))
            .and_then(|op| op.dest.clone())
            .unwrap()
    };
    // Oldest image first in the IMG_ sequence; videos get their own.
    assert_eq!(dest_of("beach.jpg"), tmp.path().join("IMG_000001.JPG"));
    assert_eq!(dest_of("aaa.jpg"), tmp.path().join("IMG_000002.JPG"));
    assert_eq!(dest_of("clip.mp4"), tmp.path().join("VID_000001.MP4"));
}

#[test]
fn find_marked_dupes_reports_without_planning() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("photo_dupe(1).jpg"), b"x", 1_000_000);
    write_file(&tmp.path().join("photo.jpg"), b"x", 1_000_000);

    let walk = media_snapshot(tmp.path());
    let hits = builder::find_marked_dupes(&walk, r"_dupe\(\d+\)$").unwrap();

    assert_eq!(hits.len(), 1);
    assert!(hits[0].ends_with("photo_dupe(1).jpg"));
    assert!(tmp.path().join("photo_dupe(1).jpg").exists());
}
