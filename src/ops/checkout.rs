use std::fs;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Oid;
use crate::object::tree::{EntryKind, TreeEntry};
use crate::object::{read_object, Object, ObjectKind};
use crate::ops::read_tree_entries;
use crate::repo::Repository;
use crate::resolve::require_object;

/// materialize a tree-ish into an empty (or new) directory
pub fn checkout(repo: &Repository, name: &str, target: &Path) -> Result<()> {
    let tree = require_object(repo, name, ObjectKind::Tree)?;

    if target.exists() {
        if !target.is_dir() {
            return Err(Error::NotADirectory(target.to_path_buf()));
        }
        if target.read_dir().with_path(target)?.next().is_some() {
            return Err(Error::TargetNotEmpty(target.to_path_buf()));
        }
    } else {
        fs::create_dir_all(target).with_path(target)?;
    }

    checkout_tree(repo, &tree, target)
}

fn checkout_tree(repo: &Repository, tree: &Oid, target: &Path) -> Result<()> {
    for entry in read_tree_entries(repo, tree)? {
        let dest = target.join(entry_file_name(&entry.path));

        match entry.kind()? {
            EntryKind::Tree => {
                fs::create_dir(&dest).with_path(&dest)?;
                checkout_tree(repo, &entry.sha, &dest)?;
            }
            EntryKind::Blob => {
                let data = read_blob(repo, &entry)?;
                fs::write(&dest, data).with_path(&dest)?;
                if entry.mode_value()? & 0o111 != 0 {
                    set_executable(&dest)?;
                }
            }
            EntryKind::Symlink => {
                let data = read_blob(repo, &entry)?;
                make_symlink(&data, &dest)?;
            }
            EntryKind::Gitlink => {
                // a submodule mount point: the commit it names lives elsewhere
                fs::create_dir(&dest).with_path(&dest)?;
                log::debug!("skipping gitlink {}", dest.display());
            }
        }
    }
    Ok(())
}

fn read_blob(repo: &Repository, entry: &TreeEntry) -> Result<Vec<u8>> {
    match read_object(repo, &entry.sha)? {
        Object::Blob(data) => Ok(data),
        other => Err(Error::CorruptObject {
            oid: entry.sha.to_hex(),
            reason: format!("tree leaf points at a {}", other.kind().as_str()),
        }),
    }
}

#[cfg(unix)]
fn entry_file_name(path: &[u8]) -> &std::ffi::OsStr {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(path)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).with_path(path)
}

#[cfg(unix)]
fn make_symlink(target: &[u8], dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(entry_file_name(target), dest).with_path(dest)
}
