use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::object::{read_object, Object};
use crate::repo::Repository;
use crate::resolve::unique_oid;

/// render the ancestry of a commit as a graphviz digraph
pub fn log_dot(repo: &Repository, name: &str) -> Result<String> {
    let oid = unique_oid(repo, name)?;

    let mut out = String::from("digraph bootgitlog{\n");
    out.push_str("  node[shape=rect]\n");
    let mut seen = HashSet::new();
    walk(repo, &oid, &mut seen, &mut out)?;
    out.push_str("}\n");
    Ok(out)
}

fn walk(repo: &Repository, oid: &Oid, seen: &mut HashSet<Oid>, out: &mut String) -> Result<()> {
    if !seen.insert(*oid) {
        return Ok(());
    }

    let Object::Commit(kvlm) = read_object(repo, oid)? else {
        return Err(Error::WrongType {
            name: oid.to_hex(),
            expected: "commit",
        });
    };

    let message = String::from_utf8_lossy(kvlm.message());
    let subject = message
        .trim()
        .lines()
        .next()
        .unwrap_or("")
        .replace('\\', "\\\\")
        .replace('"', "\\\"");

    let hex = oid.to_hex();
    out.push_str(&format!("  c_{} [label=\"{}: {}\"]\n", hex, &hex[..7], subject));

    for parent in kvlm.get_all(b"parent") {
        let parent = std::str::from_utf8(parent)
            .map_err(|_| Error::CorruptObject {
                oid: hex.clone(),
                reason: "non-utf8 parent header".to_string(),
            })
            .and_then(Oid::from_hex)?;
        out.push_str(&format!("  c_{} -> c_{};\n", hex, parent.to_hex()));
        walk(repo, &parent, seen, out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::kvlm::Kvlm;
    use crate::object::write_object;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    fn write_commit(repo: &Repository, parents: &[Oid], message: &str) -> Oid {
        let mut kvlm = Kvlm::new();
        kvlm.push(b"tree", "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        for p in parents {
            kvlm.push(b"parent", p.to_hex());
        }
        kvlm.push(b"author", b"A <a@b> 0 +0000".to_vec());
        kvlm.push(b"committer", b"A <a@b> 0 +0000".to_vec());
        kvlm.set_message(message.as_bytes().to_vec());
        write_object(repo, &Object::Commit(kvlm)).unwrap()
    }

    #[test]
    fn test_linear_history() {
        let (_dir, repo) = test_repo();
        let a = write_commit(&repo, &[], "first\n");
        let b = write_commit(&repo, &[a], "second\n");

        let dot = log_dot(&repo, &b.to_hex()).unwrap();

        assert!(dot.starts_with("digraph bootgitlog{\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains(&format!("c_{} [label=\"{}: second\"]", b.to_hex(), &b.to_hex()[..7])));
        assert!(dot.contains(&format!("c_{} -> c_{};", b.to_hex(), a.to_hex())));
        assert!(dot.contains("first"));
    }

    #[test]
    fn test_merge_history_visits_each_commit_once() {
        let (_dir, repo) = test_repo();
        let root = write_commit(&repo, &[], "root\n");
        let left = write_commit(&repo, &[root], "left\n");
        let right = write_commit(&repo, &[root], "right\n");
        let merge = write_commit(&repo, &[left, right], "merge\n");

        let dot = log_dot(&repo, &merge.to_hex()).unwrap();

        assert_eq!(dot.matches("root").count(), 1);
        assert!(dot.contains(&format!("c_{} -> c_{};", merge.to_hex(), left.to_hex())));
        assert!(dot.contains(&format!("c_{} -> c_{};", merge.to_hex(), right.to_hex())));
    }

    #[test]
    fn test_subject_is_first_line_escaped() {
        let (_dir, repo) = test_repo();
        let oid = write_commit(&repo, &[], "say \"hi\" \\ back\nbody line\n");

        let dot = log_dot(&repo, &oid.to_hex()).unwrap();

        assert!(dot.contains("say \\\"hi\\\" \\\\ back"));
        assert!(!dot.contains("body line"));
    }

    #[test]
    fn test_non_commit_rejected() {
        let (_dir, repo) = test_repo();
        let blob = write_object(&repo, &Object::Blob(b"x".to_vec())).unwrap();

        assert!(matches!(
            log_dot(&repo, &blob.to_hex()),
            Err(Error::WrongType { .. })
        ));
    }
}
