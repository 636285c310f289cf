use std::collections::HashMap;

use chrono::Local;

use crate::config::Identity;
use crate::error::Result;
use crate::hash::Oid;
use crate::index::{read_index, Index, IndexEntry};
use crate::object::kvlm::Kvlm;
use crate::object::tree::TreeEntry;
use crate::object::{write_object, Object};
use crate::refs::{resolve_ref, update_head};
use crate::repo::Repository;

fn dirname(name: &str) -> &str {
    name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn basename(name: &str) -> &str {
    name.rsplit_once('/').map(|(_, base)| base).unwrap_or(name)
}

enum TreeNode {
    File(IndexEntry),
    Subtree { name: String, oid: Oid },
}

/// fold the flat index into nested tree objects, bottom-up
///
/// directories are processed longest-key first (ties reverse-lexicographic)
/// so every subtree is written before the tree that references it. returns
/// the root tree id; an empty index yields the empty tree.
pub fn write_tree_from_index(repo: &Repository, index: &Index) -> Result<Oid> {
    let mut contents: HashMap<String, Vec<TreeNode>> = HashMap::new();
    contents.insert(String::new(), Vec::new());

    for entry in &index.entries {
        let dir = dirname(&entry.name);
        // every ancestor directory gets a bucket, even when empty so far
        let mut key = dirname(dir);
        while !key.is_empty() {
            contents.entry(key.to_string()).or_default();
            key = dirname(key);
        }
        contents
            .entry(dir.to_string())
            .or_default()
            .push(TreeNode::File(entry.clone()));
    }

    let mut order: Vec<String> = contents.keys().cloned().collect();
    order.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| b.cmp(a)));

    let mut root = Oid::ZERO;
    for dir in order {
        let nodes = contents.remove(&dir).unwrap_or_default();

        let mut entries = Vec::with_capacity(nodes.len());
        for node in nodes {
            entries.push(match node {
                TreeNode::File(e) => TreeEntry {
                    mode: format!("{:02o}{:04o}", e.mode_type, e.mode_perms).into_bytes(),
                    path: basename(&e.name).as_bytes().to_vec(),
                    sha: e.sha,
                },
                TreeNode::Subtree { name, oid } => TreeEntry {
                    mode: b"40000".to_vec(),
                    path: name.into_bytes(),
                    sha: oid,
                },
            });
        }

        let oid = write_object(repo, &Object::Tree(entries))?;
        if dir.is_empty() {
            root = oid;
        } else {
            // the parent bucket was seeded above and sorts after its child
            contents
                .entry(dirname(&dir).to_string())
                .or_default()
                .push(TreeNode::Subtree {
                    name: basename(&dir).to_string(),
                    oid,
                });
        }
    }

    Ok(root)
}

/// ±HHMM from a utc offset in whole minutes
fn format_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.abs();
    format!("{}{:02}{:02}", sign, abs / 60, abs % 60)
}

/// `name <email> <unix-seconds> <±HHMM>` for the current local time
pub(crate) fn signature_line(identity: &Identity) -> String {
    let now = Local::now();
    format!(
        "{} {} {}",
        identity,
        now.timestamp(),
        format_offset(now.offset().local_minus_utc() / 60)
    )
}

/// assemble and store a commit object
///
/// header order is fixed: tree, parents in the given order, author,
/// committer. the message always gains a trailing newline.
pub fn create_commit(
    repo: &Repository,
    tree: &Oid,
    parents: &[Oid],
    signature: &str,
    message: &str,
) -> Result<Oid> {
    let mut kvlm = Kvlm::new();
    kvlm.push(b"tree", tree.to_hex());
    for parent in parents {
        kvlm.push(b"parent", parent.to_hex());
    }
    kvlm.push(b"author", signature.as_bytes().to_vec());
    kvlm.push(b"committer", signature.as_bytes().to_vec());

    let mut message = message.trim().to_string();
    message.push('\n');
    kvlm.set_message(message);

    write_object(repo, &Object::Commit(kvlm))
}

/// the commit operation: trees from the index, then the commit object,
/// then the branch behind HEAD advances
pub fn commit(repo: &Repository, message: &str, identity: &Identity) -> Result<Oid> {
    let index = read_index(repo)?;
    let tree = write_tree_from_index(repo, &index)?;
    let parents: Vec<Oid> = resolve_ref(repo, "HEAD")?.into_iter().collect();

    let oid = create_commit(repo, &tree, &parents, &signature_line(identity), message)?;
    update_head(repo, &oid)?;

    log::debug!("committed {}", oid);
    Ok(oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MODE_REGULAR, MODE_SYMLINK};
    use crate::object::read_object;
    use crate::ops::tree_to_map;
    use crate::refs::head_branch;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    fn entry(name: &str, hex: &str) -> IndexEntry {
        IndexEntry {
            ctime: (0, 0),
            mtime: (0, 0),
            dev: 0,
            ino: 0,
            mode_type: MODE_REGULAR,
            mode_perms: 0o644,
            uid: 0,
            gid: 0,
            fsize: 0,
            sha: Oid::from_hex(hex).unwrap(),
            flag_assume_valid: false,
            flag_stage: 0,
            name: name.to_string(),
        }
    }

    const BLOB: &str = "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0";

    #[test]
    fn test_empty_index_builds_empty_tree() {
        let (_dir, repo) = test_repo();
        let root = write_tree_from_index(&repo, &Index::new()).unwrap();
        assert_eq!(root.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn test_single_file_tree() {
        let (_dir, repo) = test_repo();
        let index = Index {
            entries: vec![entry("a.txt", BLOB)],
        };

        let root = write_tree_from_index(&repo, &index).unwrap();
        let Object::Tree(entries) = read_object(&repo, &root).unwrap() else {
            panic!("root is not a tree");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mode, b"100644");
        assert_eq!(entries[0].path, b"a.txt");
        assert_eq!(entries[0].sha.to_hex(), BLOB);
    }

    #[test]
    fn test_nested_dirs_fold_bottom_up() {
        let (_dir, repo) = test_repo();
        let index = Index {
            entries: vec![
                entry("a.txt", BLOB),
                entry("src/deep/mod.rs", BLOB),
                entry("src/lib.rs", BLOB),
            ],
        };

        let root = write_tree_from_index(&repo, &index).unwrap();

        // the flattened tree matches the index's name -> sha map
        let map = tree_to_map(&repo, &root).unwrap();
        assert_eq!(map.len(), 3);
        for e in &index.entries {
            assert_eq!(map.get(&e.name), Some(&e.sha), "missing {}", e.name);
        }
    }

    #[test]
    fn test_unchanged_subtree_hashes_identically() {
        let (_dir, repo) = test_repo();
        let sub = Index {
            entries: vec![entry("sub/x", BLOB)],
        };
        let with_more = Index {
            entries: vec![entry("other", BLOB), entry("sub/x", BLOB)],
        };

        let first = write_tree_from_index(&repo, &sub).unwrap();
        let second = write_tree_from_index(&repo, &with_more).unwrap();

        // the sub/ tree inside `second` is the same object written by `first`
        let Object::Tree(entries) = read_object(&repo, &second).unwrap() else {
            panic!("root is not a tree");
        };
        let sub_entry = entries.iter().find(|e| e.path == b"sub").unwrap();
        let Object::Tree(first_entries) = read_object(&repo, &first).unwrap() else {
            panic!("first root is not a tree");
        };
        let first_sub = first_entries.iter().find(|e| e.path == b"sub").unwrap();
        assert_eq!(sub_entry.sha, first_sub.sha);
    }

    #[test]
    fn test_symlink_entry_mode() {
        let (_dir, repo) = test_repo();
        let mut link = entry("link", BLOB);
        link.mode_type = MODE_SYMLINK;
        link.mode_perms = 0;

        let root = write_tree_from_index(&repo, &Index { entries: vec![link] }).unwrap();
        let Object::Tree(entries) = read_object(&repo, &root).unwrap() else {
            panic!("root is not a tree");
        };
        assert_eq!(entries[0].mode, b"120000");
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0), "+0000");
        assert_eq!(format_offset(120), "+0200");
        assert_eq!(format_offset(-330), "-0530");
    }

    #[test]
    fn test_create_commit_header_order() {
        let (_dir, repo) = test_repo();
        let tree = Oid::from_hex("4b825dc642cb6eb9a060e54bf8d69288fbee4904").unwrap();
        let parent = Oid::from_hex(BLOB).unwrap();

        let oid = create_commit(
            &repo,
            &tree,
            &[parent],
            "Ada Lovelace <ada@example.com> 1527025023 +0200",
            "  subject  ",
        )
        .unwrap();

        let Object::Commit(kvlm) = read_object(&repo, &oid).unwrap() else {
            panic!("not a commit");
        };
        let expected = format!(
            "tree {}\nparent {}\nauthor {sig}\ncommitter {sig}\n\nsubject\n",
            tree.to_hex(),
            parent.to_hex(),
            sig = "Ada Lovelace <ada@example.com> 1527025023 +0200",
        );
        assert_eq!(kvlm.serialize(), expected.as_bytes());
    }

    #[test]
    fn test_commit_updates_branch() {
        let (_dir, repo) = test_repo();
        let identity = Identity {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        };

        let first = {
            let index = Index {
                entries: vec![entry("a.txt", BLOB)],
            };
            crate::index::write_index(&repo, &index).unwrap();
            commit(&repo, "first", &identity).unwrap()
        };

        assert_eq!(head_branch(&repo).unwrap().as_deref(), Some("master"));
        assert_eq!(resolve_ref(&repo, "HEAD").unwrap(), Some(first));

        // a zero-parent commit, then a child carrying it as parent
        let Object::Commit(kvlm) = read_object(&repo, &first).unwrap() else {
            panic!("not a commit");
        };
        assert!(kvlm.get(b"parent").is_none());

        let second = commit(&repo, "second", &identity).unwrap();
        let Object::Commit(kvlm) = read_object(&repo, &second).unwrap() else {
            panic!("not a commit");
        };
        assert_eq!(kvlm.get(b"parent").unwrap(), first.to_hex().as_bytes());
    }
}
