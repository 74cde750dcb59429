//! Startup scan and prune.
//!
//! Both run once at storage server startup: the scan enumerates the files to
//! offer for registration, and the prune removes directories left empty after
//! the naming server's delete list has been applied.

use std::io;

use faro_core::Path;
use tracing::warn;

/// Enumerates the logical paths of all regular files under `root`.
///
/// Entries whose names cannot form a legal path component (non-UTF-8, or
/// containing a reserved character) are skipped with a warning; they can
/// never be addressed through the filesystem.
pub fn scan_files(root: &std::path::Path) -> io::Result<Vec<Path>> {
    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), Path::root())];

    while let Some((dir, logical)) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(?name, "skipping non-UTF-8 entry");
                continue;
            };

            let child = match logical.join(name) {
                Ok(child) => child,
                Err(e) => {
                    warn!(name, error = %e, "skipping unaddressable entry");
                    continue;
                }
            };

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push((entry.path(), child));
            } else if file_type.is_file() {
                files.push(child);
            }
        }
    }

    Ok(files)
}

/// Removes empty directories beneath `root`, bottom-up.
///
/// The root itself is kept. Transient I/O errors on a single directory are
/// logged and skipped; the prune never fails.
pub fn prune_empty_dirs(root: &std::path::Path) {
    fn prune(dir: &std::path::Path, keep: bool) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(?dir, error = %e, "prune: cannot read directory");
                return;
            }
        };

        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                prune(&entry.path(), false);
            }
        }

        if keep {
            return;
        }
        match std::fs::read_dir(dir) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    if let Err(e) = std::fs::remove_dir(dir) {
                        warn!(?dir, error = %e, "prune: cannot remove directory");
                    }
                }
            }
            Err(e) => warn!(?dir, error = %e, "prune: cannot re-read directory"),
        }
    }

    prune(root, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &std::path::Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::File::create(path).unwrap();
    }

    #[test]
    fn test_scan_finds_nested_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/b.txt"));
        touch(&dir.path().join("c/d/e.txt"));
        touch(&dir.path().join("top.txt"));
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let mut found: Vec<String> = scan_files(dir.path())
            .unwrap()
            .iter()
            .map(Path::to_string)
            .collect();
        found.sort();

        assert_eq!(found, vec!["/a/b.txt", "/c/d/e.txt", "/top.txt"]);
    }

    #[test]
    fn test_scan_empty_root() {
        let dir = TempDir::new().unwrap();
        assert!(scan_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_prune_removes_empty_chains() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        touch(&dir.path().join("keep/f.txt"));

        prune_empty_dirs(dir.path());

        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("keep/f.txt").exists());
        // The root itself survives.
        assert!(dir.path().exists());
    }

    #[test]
    fn test_prune_keeps_partially_full_dirs() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/f.txt"));
        std::fs::create_dir_all(dir.path().join("a/empty")).unwrap();

        prune_empty_dirs(dir.path());

        assert!(dir.path().join("a/f.txt").exists());
        assert!(!dir.path().join("a/empty").exists());
    }
}
