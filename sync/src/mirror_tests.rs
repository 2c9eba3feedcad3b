//! Tests for snapshot comparison and destructive mirroring

use super::*;
use std::path::{Path, PathBuf};
use rstest::*;
use tempfile::TempDir;
use tokio::fs;

/// Temporary workspace with empty `source` and `dest` directories
struct Workspace {
    _temp_dir: TempDir,
    source: PathBuf,
    dest: PathBuf,
}

#[fixture]
fn workspace() -> Workspace {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    let dest = temp_dir.path().join("dest");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&dest).unwrap();
    Workspace { _temp_dir: temp_dir, source, dest }
}

async fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(path, content).await.unwrap();
    }
}

fn listing(root: &Path) -> Vec<String> {
    DirectorySnapshot::build(root).unwrap().files().map(str::to_string).collect()
}

mod snapshot_tests {
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn test_snapshot_records_relative_file_paths(workspace: Workspace) {
        write_files(&workspace.source, &[("a.txt", "a"), ("sub/b.txt", "b"), ("sub/deep/c.txt", "c")]).await;
        fs::create_dir_all(workspace.source.join("empty")).await.unwrap();

        let snapshot = snapshot_directory(&workspace.source).await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.contains("sub/deep/c.txt"));
        assert!(!snapshot.contains("empty"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_missing_root_is_an_access_error(workspace: Workspace) {
        let err = snapshot_directory(workspace.source.join("nope")).await.unwrap_err();
        assert!(err.is_access_failure());
    }
}

mod reconcile_tests {
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn test_differing_trees_are_replaced(workspace: Workspace) {
        write_files(&workspace.source, &[("a.txt", "source a"), ("sub/b.txt", "source b")]).await;
        write_files(&workspace.dest, &[("a.txt", "old a"), ("sub/c.txt", "stale")]).await;

        let outcome = mirror_once(&workspace.source, &workspace.dest).await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Mirrored { files_copied: 2, missing: 1, extra: 1 }
        );
        assert_eq!(listing(&workspace.dest), vec!["a.txt", "sub/b.txt"]);
        assert!(!workspace.dest.join("sub/c.txt").exists());
        // The whole tree is recopied, so shared names pick up source content
        assert_eq!(fs::read(workspace.dest.join("a.txt")).await.unwrap(), b"source a");
    }

    #[rstest]
    #[tokio::test]
    async fn test_identical_file_sets_are_left_alone(workspace: Workspace) {
        write_files(&workspace.source, &[("a.txt", "new"), ("sub/b.txt", "new")]).await;
        write_files(&workspace.dest, &[("a.txt", "old"), ("sub/b.txt", "old")]).await;

        let outcome = mirror_once(&workspace.source, &workspace.dest).await.unwrap();

        assert_eq!(outcome, SyncOutcome::NoChange { files: 2 });
        assert!(!outcome.is_mirrored());
        assert_eq!(fs::read(workspace.dest.join("a.txt")).await.unwrap(), b"old");
    }

    #[rstest]
    #[tokio::test]
    async fn test_second_reconcile_is_a_no_op(workspace: Workspace) {
        write_files(&workspace.source, &[("Main/config/profile.sav", "p"), ("Main/config/campaign.sav", "c")]).await;
        write_files(&workspace.dest, &[("leftover.tmp", "x")]).await;

        let engine = MirrorEngine::default();
        let first = engine.reconcile(&workspace.source, &workspace.dest).await.unwrap();
        let second = engine.reconcile(&workspace.source, &workspace.dest).await.unwrap();

        assert!(first.is_mirrored());
        assert_eq!(second, SyncOutcome::NoChange { files: 2 });
        assert_eq!(listing(&workspace.source), listing(&workspace.dest));
    }

    #[rstest]
    #[case::empty_destination(&[], 3, 0)]
    #[case::one_extra(&["a.txt", "b.txt", "c/d.txt", "e.txt"], 0, 1)]
    #[case::one_missing(&["a.txt", "b.txt"], 1, 0)]
    #[case::disjoint(&["x.txt", "y/z.txt"], 3, 2)]
    #[tokio::test]
    async fn test_outcome_counts(
        workspace: Workspace,
        #[case] dest_files: &[&str],
        #[case] missing: usize,
        #[case] extra: usize,
    ) {
        write_files(&workspace.source, &[("a.txt", "a"), ("b.txt", "b"), ("c/d.txt", "d")]).await;
        for file in dest_files {
            write_files(&workspace.dest, &[(*file, "old")]).await;
        }

        let outcome = mirror_once(&workspace.source, &workspace.dest).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Mirrored { files_copied: 3, missing, extra });
        assert_eq!(listing(&workspace.dest), vec!["a.txt", "b.txt", "c/d.txt"]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_empty_source_empties_destination(workspace: Workspace) {
        write_files(&workspace.dest, &[("old.sav", "old")]).await;

        let outcome = mirror_once(&workspace.source, &workspace.dest).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Mirrored { files_copied: 0, missing: 0, extra: 1 });
        assert!(workspace.dest.is_dir());
        assert!(listing(&workspace.dest).is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_times_not_preserved_when_disabled(workspace: Workspace) {
        write_files(&workspace.source, &[("a.txt", "a")]).await;
        let old = filetime::FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(workspace.source.join("a.txt"), old).unwrap();

        let engine = MirrorEngine::new(MirrorOptions { preserve_times: false });
        engine.reconcile(&workspace.source, &workspace.dest).await.unwrap();

        let copied = std::fs::metadata(workspace.dest.join("a.txt")).unwrap();
        assert_ne!(filetime::FileTime::from_last_modification_time(&copied), old);
        assert!(!engine.options().preserve_times);
    }

    #[cfg(unix)]
    #[rstest]
    #[tokio::test]
    async fn test_directory_symlinks_are_not_descended(workspace: Workspace) {
        let outside = workspace.source.parent().unwrap().join("outside");
        write_files(&outside, &[("secret.txt", "s")]).await;
        write_files(&workspace.source, &[("a.txt", "a")]).await;
        std::os::unix::fs::symlink(&outside, workspace.source.join("linked")).unwrap();

        mirror_once(&workspace.source, &workspace.dest).await.unwrap();

        assert_eq!(listing(&workspace.dest), vec!["a.txt"]);
        assert!(!workspace.dest.join("linked").exists());
    }
}
