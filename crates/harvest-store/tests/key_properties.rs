//! Naming properties of derived keys.

use harvest_snapshot::DEFAULT_ALLOWED_EXTENSIONS;
use harvest_store::{Category, KeyDeriver};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn sample_paths(base: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for ext in DEFAULT_ALLOWED_EXTENSIONS {
        paths.push(base.join(format!("report.{ext}")));
        paths.push(base.join("out").join(format!("report.{ext}")));
        paths.push(base.join("out").join("pages").join(format!("index.{ext}")));
        paths.push(base.join("screens").join(format!("shot-1.{ext}")));
    }
    paths
}

#[test]
fn sample_paths_do_not_collide() {
    let base = PathBuf::from("/usr/src/app");
    let paths = sample_paths(&base);
    let keys: HashSet<String> = paths
        .iter()
        .map(|p| KeyDeriver::derive("run", Category::WorkspaceOutputs.as_str(), &base, p))
        .collect();
    assert_eq!(keys.len(), paths.len());
}

#[test]
fn categories_separate_identical_paths() {
    let base = PathBuf::from("/tool");
    let file = base.join("page.png");
    let a = KeyDeriver::derive("r", Category::ToolArtifacts.as_str(), &base, &file);
    let b = KeyDeriver::derive("r", Category::WorkspaceOutputs.as_str(), &base, &file);
    assert_ne!(a, b);
}

#[test]
fn runs_separate_identical_paths() {
    let base = PathBuf::from("/tool");
    let file = base.join("page.png");
    assert_ne!(
        KeyDeriver::derive("r1", "tool-artifacts", &base, &file),
        KeyDeriver::derive("r2", "tool-artifacts", &base, &file)
    );
}

proptest! {
    #[test]
    fn derive_is_idempotent(
        run in "[a-zA-Z0-9]{0,12}",
        segments in proptest::collection::vec("[a-z0-9.-]{1,8}", 1..5),
        tool in any::<bool>(),
    ) {
        let category = if tool { Category::ToolArtifacts } else { Category::WorkspaceOutputs };
        let base = PathBuf::from("/root/base");
        let file = segments.iter().fold(base.clone(), |acc, s| acc.join(s));

        let first = KeyDeriver::derive(&run, category.as_str(), &base, &file);
        let second = KeyDeriver::derive(&run, category.as_str(), &base, &file);
        prop_assert_eq!(&first, &second);
        prop_assert!(!first.contains(std::path::MAIN_SEPARATOR));
        prop_assert!(first.contains(category.as_str()));
    }

    #[test]
    fn distinct_underscore_free_paths_get_distinct_keys(
        a in proptest::collection::vec("[a-z0-9.-]{1,6}", 1..4),
        b in proptest::collection::vec("[a-z0-9.-]{1,6}", 1..4),
    ) {
        // Flattening is injective as long as names carry no '_' themselves.
        let base = PathBuf::from("/w");
        let pa = a.iter().fold(base.clone(), |acc, s| acc.join(s));
        let pb = b.iter().fold(base.clone(), |acc, s| acc.join(s));
        prop_assume!(pa != pb);
        prop_assume!(a.iter().chain(b.iter()).all(|s| s != "." && s != ".."));

        prop_assert_ne!(
            KeyDeriver::derive("run", "workspace-outputs", &base, &pa),
            KeyDeriver::derive("run", "workspace-outputs", &base, &pb)
        );
    }
}
