use std::fmt;

use crate::error::Result;
use crate::hash::Oid;
use crate::object::tree::EntryKind;
use crate::object::ObjectKind;
use crate::ops::read_tree_entries;
use crate::repo::Repository;
use crate::resolve::require_object;

/// one ls-tree output line
pub struct TreeListing {
    /// mode zero-padded to six digits, as git prints it
    pub mode: String,
    pub kind: &'static str,
    pub sha: Oid,
    pub path: String,
}

impl fmt::Display for TreeListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\t{}", self.mode, self.kind, self.sha, self.path)
    }
}

/// list a tree-ish, optionally recursing into subtrees
pub fn ls_tree(repo: &Repository, name: &str, recursive: bool) -> Result<Vec<TreeListing>> {
    let oid = require_object(repo, name, ObjectKind::Tree)?;
    let mut lines = Vec::new();
    walk(repo, &oid, recursive, "", &mut lines)?;
    Ok(lines)
}

fn walk(
    repo: &Repository,
    oid: &Oid,
    recursive: bool,
    prefix: &str,
    lines: &mut Vec<TreeListing>,
) -> Result<()> {
    for entry in read_tree_entries(repo, oid)? {
        let kind = entry.kind()?;
        let name = String::from_utf8_lossy(&entry.path);
        let path = if prefix.is_empty() {
            name.into_owned()
        } else {
            format!("{}/{}", prefix, name)
        };

        if recursive && kind == EntryKind::Tree {
            walk(repo, &entry.sha, recursive, &path, lines)?;
        } else {
            lines.push(TreeListing {
                mode: format!("{:0>6}", String::from_utf8_lossy(&entry.mode)),
                kind: kind.type_name(),
                sha: entry.sha,
                path,
            });
        }
    }
    Ok(())
}
