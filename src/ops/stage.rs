use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::index::{read_index, write_index, Index, IndexEntry};
use crate::object::{write_object, Object};
use crate::repo::Repository;

/// worktree-relative canonical name for a user-supplied path
///
/// the path is absolutized lexically (so it need not exist yet), checked
/// against the worktree, and normalized to forward slashes.
fn worktree_rel(repo: &Repository, path: &Path) -> Result<String> {
    let abs = std::path::absolute(path).with_path(path)?;

    // collapse . and .. the way the shell user thinks of them
    let mut normalized = PathBuf::new();
    for comp in abs.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let rel = normalized
        .strip_prefix(repo.worktree())
        .map_err(|_| Error::OutsideWorktree(path.to_path_buf()))?;

    let mut name = String::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => {
                if !name.is_empty() {
                    name.push('/');
                }
                name.push_str(&part.to_string_lossy());
            }
            _ => return Err(Error::OutsideWorktree(path.to_path_buf())),
        }
    }
    if name.is_empty() {
        // the worktree root itself is not a stageable path
        return Err(Error::OutsideWorktree(path.to_path_buf()));
    }
    Ok(name)
}

/// remove paths from the index, optionally also deleting worktree files
///
/// unless missing_ok, a requested path absent from the index fails the
/// whole call before any file or the index is touched.
pub fn rm(repo: &Repository, paths: &[PathBuf], delete: bool, missing_ok: bool) -> Result<()> {
    let index = read_index(repo)?;

    let mut requested = HashSet::new();
    for path in paths {
        requested.insert(worktree_rel(repo, path)?);
    }

    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for entry in index.entries {
        if requested.remove(&entry.name) {
            removed.push(entry.name);
        } else {
            kept.push(entry);
        }
    }

    if !requested.is_empty() && !missing_ok {
        let mut missing: Vec<String> = requested.into_iter().collect();
        missing.sort();
        return Err(Error::NotInIndex(missing));
    }

    if delete {
        for name in &removed {
            let path = repo.worktree().join(name);
            fs::remove_file(&path).with_path(&path)?;
            log::debug!("deleted {}", name);
        }
    }

    write_index(repo, &Index { entries: kept })
}

/// stage files: store their blobs and refresh their index entries
pub fn add(repo: &Repository, paths: &[PathBuf]) -> Result<()> {
    // validate everything up front so one bad path leaves the index alone;
    // repeated arguments collapse to one entry
    let mut seen = HashSet::new();
    let mut staged = Vec::new();
    for path in paths {
        let name = worktree_rel(repo, path)?;
        let abs = repo.worktree().join(&name);
        let file_type = fs::symlink_metadata(&abs)
            .map_err(|_| Error::NotAFile(path.clone()))?
            .file_type();
        if !file_type.is_file() && !file_type.is_symlink() {
            return Err(Error::NotAFile(path.clone()));
        }
        if seen.insert(name.clone()) {
            staged.push((abs, name));
        }
    }

    // drop any stale entries for these paths, then re-stage them
    rm(repo, paths, false, true)?;

    let mut index = read_index(repo)?;
    for (abs, name) in staged {
        let meta = fs::symlink_metadata(&abs).with_path(&abs)?;
        let content = if meta.file_type().is_symlink() {
            read_link_bytes(&abs)?
        } else {
            fs::read(&abs).with_path(&abs)?
        };
        let sha = write_object(repo, &Object::Blob(content))?;
        log::debug!("staged {} as {}", name, sha);
        index.entries.push(IndexEntry::from_metadata(name, sha, &meta));
    }

    write_index(repo, &index)
}

#[cfg(unix)]
fn read_link_bytes(path: &Path) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    let target = fs::read_link(path).with_path(path)?;
    Ok(target.as_os_str().as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MODE_REGULAR, MODE_SYMLINK};
    use crate::object::read_object;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo");
        Repository::create(&path).unwrap();
        // reopen through find so the worktree path is canonical
        let repo = Repository::find(&path).unwrap();
        (dir, repo)
    }

    fn write_file(repo: &Repository, name: &str, content: &[u8]) -> PathBuf {
        let path = repo.worktree().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_add_stages_blob() {
        let (_dir, repo) = test_repo();
        let path = write_file(&repo, "a.txt", b"hello");

        add(&repo, &[path]).unwrap();

        let index = read_index(&repo).unwrap();
        assert_eq!(index.entries.len(), 1);
        let entry = &index.entries[0];
        assert_eq!(entry.name, "a.txt");
        assert_eq!(entry.mode_type, MODE_REGULAR);
        assert_eq!(entry.mode_perms, 0o644);
        assert_eq!(
            entry.sha.to_hex(),
            "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0"
        );

        // the blob is in the store
        let obj = read_object(&repo, &entry.sha).unwrap();
        assert_eq!(obj, Object::Blob(b"hello".to_vec()));
    }

    #[test]
    fn test_add_is_a_restage() {
        let (_dir, repo) = test_repo();
        let path = write_file(&repo, "a.txt", b"one");
        add(&repo, &[path.clone()]).unwrap();

        fs::write(&path, b"two").unwrap();
        add(&repo, &[path]).unwrap();

        let index = read_index(&repo).unwrap();
        assert_eq!(index.entries.len(), 1);
        let obj = read_object(&repo, &index.entries[0].sha).unwrap();
        assert_eq!(obj, Object::Blob(b"two".to_vec()));
    }

    #[test]
    fn test_add_nested_path() {
        let (_dir, repo) = test_repo();
        let path = write_file(&repo, "src/deep/mod.rs", b"mod x;");

        add(&repo, &[path]).unwrap();

        let index = read_index(&repo).unwrap();
        assert_eq!(index.entries[0].name, "src/deep/mod.rs");
    }

    #[cfg(unix)]
    #[test]
    fn test_add_executable_and_symlink() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, repo) = test_repo();
        let exe = write_file(&repo, "run.sh", b"#!/bin/sh\n");
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        let link = repo.worktree().join("link");
        std::os::unix::fs::symlink("a.txt", &link).unwrap();

        add(&repo, &[exe, link]).unwrap();

        let index = read_index(&repo).unwrap();
        let by_name = |n: &str| index.entries.iter().find(|e| e.name == n).unwrap();
        assert_eq!(by_name("run.sh").mode_perms, 0o755);
        assert_eq!(by_name("link").mode_type, MODE_SYMLINK);

        // a symlink's blob is its target
        let obj = read_object(&repo, &by_name("link").sha).unwrap();
        assert_eq!(obj, Object::Blob(b"a.txt".to_vec()));
    }

    #[test]
    fn test_add_outside_worktree() {
        let (dir, repo) = test_repo();
        let outside = dir.path().join("elsewhere.txt");
        fs::write(&outside, b"x").unwrap();

        assert!(matches!(
            add(&repo, &[outside]),
            Err(Error::OutsideWorktree(_))
        ));
    }

    #[test]
    fn test_add_directory_rejected() {
        let (_dir, repo) = test_repo();
        let sub = repo.worktree().join("sub");
        fs::create_dir(&sub).unwrap();

        assert!(matches!(add(&repo, &[sub]), Err(Error::NotAFile(_))));
    }

    #[test]
    fn test_rm_removes_entry_and_file() {
        let (_dir, repo) = test_repo();
        let path = write_file(&repo, "a.txt", b"hello");
        add(&repo, &[path.clone()]).unwrap();

        rm(&repo, &[path.clone()], true, false).unwrap();

        assert!(read_index(&repo).unwrap().entries.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_rm_not_in_index_changes_nothing() {
        let (_dir, repo) = test_repo();
        let staged = write_file(&repo, "a.txt", b"hello");
        add(&repo, &[staged]).unwrap();
        let loose = write_file(&repo, "loose.txt", b"keep me");

        let result = rm(&repo, &[loose.clone()], true, false);

        assert!(matches!(result, Err(Error::NotInIndex(_))));
        assert!(loose.exists());
        assert_eq!(read_index(&repo).unwrap().entries.len(), 1);
    }

    #[test]
    fn test_rm_outside_worktree() {
        let (dir, repo) = test_repo();
        let outside = dir.path().join("elsewhere.txt");

        assert!(matches!(
            rm(&repo, &[outside], true, false),
            Err(Error::OutsideWorktree(_))
        ));
    }
}
