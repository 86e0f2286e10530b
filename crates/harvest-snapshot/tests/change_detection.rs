//! Change detection over real directory trees.

use harvest_snapshot::{DirectorySpec, FilterPolicy, Snapshot, SnapshotDiffer, SnapshotTaker};
use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

fn write(root: &Path, rel: &str, body: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, body).unwrap();
    path
}

fn bump_mtime(path: &Path, secs: u64) {
    let when = SystemTime::now() + Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

#[test]
fn new_and_touched_files_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let spec = DirectorySpec::filtered(dir.path(), FilterPolicy::default());
    let taker = SnapshotTaker::new();

    let untouched = write(dir.path(), "keep.txt", "same");
    let touched = write(dir.path(), "data/table.csv", "a,b");
    let removed = write(dir.path(), "old.json", "{}");

    let before = taker.take(&spec);
    assert_eq!(before.len(), 3);

    bump_mtime(&touched, 60);
    fs::remove_file(&removed).unwrap();
    let created = write(dir.path(), "out/report.md", "# report");
    write(dir.path(), "out/ignored.py", "print()");

    let after = taker.take(&spec);
    let changed = SnapshotDiffer::diff(&before, &after);

    let got: Vec<PathBuf> = changed.into_iter().collect();
    let mut expected = vec![touched, created];
    expected.sort();
    assert_eq!(got, expected);
    assert!(after.contains(&untouched));
}

#[test]
fn files_inside_excluded_dirs_never_appear() {
    let dir = tempfile::tempdir().unwrap();
    let spec = DirectorySpec::filtered(dir.path(), FilterPolicy::default());
    let taker = SnapshotTaker::new();

    let before = taker.take(&spec);
    for rel in [
        "node_modules/a/index.html",
        ".git/info/notes.txt",
        "deep/__pycache__/x.json",
        ".playwright-mcp/page.png",
    ] {
        write(dir.path(), rel, "x");
    }
    let after = taker.take(&spec);

    assert!(after.is_empty());
    assert!(SnapshotDiffer::diff(&before, &after).is_empty());
}

#[test]
fn root_created_during_run_is_fully_new() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join(".playwright-mcp");
    let spec = DirectorySpec::unrestricted(&root);
    let taker = SnapshotTaker::new();

    let before = taker.take(&spec);
    assert!(before.is_empty());

    write(&root, "page-1.png", "png");
    write(&root, "traces/t.zip", "zip");
    let after = taker.take(&spec);

    assert_eq!(SnapshotDiffer::diff(&before, &after).len(), 2);
}

proptest! {
    #[test]
    fn diff_never_reports_paths_missing_from_after(
        before in proptest::collection::hash_map("[a-e]{1,3}", 0i128..4, 0..12),
        after in proptest::collection::hash_map("[a-e]{1,3}", 0i128..4, 0..12),
    ) {
        let to_snapshot = |m: &std::collections::HashMap<String, i128>| -> Snapshot {
            m.iter().map(|(k, v)| (PathBuf::from(format!("/{k}")), *v)).collect()
        };
        let b = to_snapshot(&before);
        let a = to_snapshot(&after);
        let changed = SnapshotDiffer::diff(&b, &a);

        for path in changed.iter() {
            prop_assert!(a.contains(path));
            prop_assert_ne!(b.get(path), a.get(path));
        }
        for (path, stamp) in a.iter() {
            if b.get(path) != Some(stamp) {
                prop_assert!(changed.contains(path));
            }
        }
    }
}
