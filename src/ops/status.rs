use std::collections::{HashMap, HashSet};
use std::fs;

use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Oid;
use crate::ignore::{check_ignore, read_ignore_rules};
use crate::index::{read_index, IndexEntry, MODE_SYMLINK};
use crate::object::tree::EntryKind;
use crate::object::{Object, ObjectKind};
use crate::ops::read_tree_entries;
use crate::refs::{head_branch, resolve_ref};
use crate::repo::Repository;
use crate::resolve::require_object;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// the three-way comparison printed by status
pub struct Status {
    /// current branch, None when HEAD is detached
    pub branch: Option<String>,
    /// what HEAD resolves to, None on an unborn branch
    pub head: Option<Oid>,
    /// index vs HEAD tree
    pub staged: Vec<(String, ChangeKind)>,
    /// worktree vs index
    pub unstaged: Vec<(String, ChangeKind)>,
    pub untracked: Vec<String>,
}

/// flatten a tree into a worktree-relative path -> oid map
pub fn tree_to_map(repo: &Repository, tree: &Oid) -> Result<HashMap<String, Oid>> {
    let mut map = HashMap::new();
    flatten(repo, tree, "", &mut map)?;
    Ok(map)
}

fn flatten(
    repo: &Repository,
    tree: &Oid,
    prefix: &str,
    map: &mut HashMap<String, Oid>,
) -> Result<()> {
    for entry in read_tree_entries(repo, tree)? {
        let name = String::from_utf8_lossy(&entry.path);
        let path = if prefix.is_empty() {
            name.into_owned()
        } else {
            format!("{}/{}", prefix, name)
        };
        if entry.kind()? == EntryKind::Tree {
            flatten(repo, &entry.sha, &path, map)?;
        } else {
            map.insert(path, entry.sha);
        }
    }
    Ok(())
}

/// compute branch state, staged and unstaged changes, and untracked files
pub fn status(repo: &Repository) -> Result<Status> {
    let index = read_index(repo)?;
    let branch = head_branch(repo)?;
    let head = resolve_ref(repo, "HEAD")?;

    // staged: compare the index against HEAD's tree
    let mut head_map = match head {
        Some(_) => {
            let tree = require_object(repo, "HEAD", ObjectKind::Tree)?;
            tree_to_map(repo, &tree)?
        }
        None => HashMap::new(),
    };
    let mut staged = Vec::new();
    for entry in &index.entries {
        match head_map.remove(&entry.name) {
            Some(sha) if sha == entry.sha => {}
            Some(_) => staged.push((entry.name.clone(), ChangeKind::Modified)),
            None => staged.push((entry.name.clone(), ChangeKind::Added)),
        }
    }
    let mut deleted: Vec<String> = head_map.into_keys().collect();
    deleted.sort();
    staged.extend(deleted.into_iter().map(|name| (name, ChangeKind::Deleted)));

    // every file in the worktree, for untracked detection
    let mut all_files: HashSet<String> = HashSet::new();
    let walker = WalkDir::new(repo.worktree())
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| Error::Io {
            path: repo.worktree().to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_dir() {
            if let Ok(rel) = entry.path().strip_prefix(repo.worktree()) {
                all_files.insert(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    // unstaged: compare the index against the worktree
    let mut unstaged = Vec::new();
    for entry in &index.entries {
        let path = repo.worktree().join(&entry.name);
        match fs::symlink_metadata(&path) {
            Err(_) => unstaged.push((entry.name.clone(), ChangeKind::Deleted)),
            Ok(meta) => {
                if stat_times_differ(entry, &meta) && hash_worktree_file(repo, entry)? != entry.sha
                {
                    unstaged.push((entry.name.clone(), ChangeKind::Modified));
                }
            }
        }
        all_files.remove(&entry.name);
    }

    // untracked: the rest, minus whatever the ignore rules cover
    let ignore = read_ignore_rules(repo)?;
    let mut untracked = Vec::new();
    for file in all_files {
        if !check_ignore(&ignore, &file)? {
            untracked.push(file);
        }
    }
    untracked.sort();

    Ok(Status {
        branch,
        head,
        staged,
        unstaged,
        untracked,
    })
}

/// fast path: unchanged stat times mean an unchanged file
#[cfg(unix)]
fn stat_times_differ(entry: &IndexEntry, meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;

    let entry_ctime = i64::from(entry.ctime.0) * 1_000_000_000 + i64::from(entry.ctime.1);
    let entry_mtime = i64::from(entry.mtime.0) * 1_000_000_000 + i64::from(entry.mtime.1);
    let fs_ctime = meta.ctime() * 1_000_000_000 + meta.ctime_nsec();
    let fs_mtime = meta.mtime() * 1_000_000_000 + meta.mtime_nsec();

    entry_ctime != fs_ctime || entry_mtime != fs_mtime
}

/// hash the worktree version of an entry without storing it
fn hash_worktree_file(repo: &Repository, entry: &IndexEntry) -> Result<Oid> {
    let path = repo.worktree().join(&entry.name);
    let content = if entry.mode_type == MODE_SYMLINK {
        link_target_bytes(&path)?
    } else {
        fs::read(&path).with_path(&path)?
    };
    Ok(Object::Blob(content).id())
}

#[cfg(unix)]
fn link_target_bytes(path: &std::path::Path) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    let target = fs::read_link(path).with_path(path)?;
    Ok(target.as_os_str().as_bytes().to_vec())
}
