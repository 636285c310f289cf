use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Oid;
use crate::repo::Repository;

/// resolve a ref file (gitdir-relative, e.g. "HEAD" or "refs/heads/master")
/// to an oid, following indirect `ref: ` pointers transitively
///
/// returns None when the file does not exist; a cycle is Malformed.
pub fn resolve_ref(repo: &Repository, name: &str) -> Result<Option<Oid>> {
    let mut visited = HashSet::new();
    resolve_ref_inner(repo, name, &mut visited)
}

fn resolve_ref_inner(
    repo: &Repository,
    name: &str,
    visited: &mut HashSet<String>,
) -> Result<Option<Oid>> {
    if !visited.insert(name.to_string()) {
        return Err(Error::MalformedRef {
            name: name.to_string(),
            reason: "reference cycle".to_string(),
        });
    }

    let path = repo.git_path(name);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(Error::Io { path, source }),
    };

    let content = content.trim_end();
    if let Some(target) = content.strip_prefix("ref: ") {
        resolve_ref_inner(repo, target.trim(), visited)
    } else {
        Oid::from_hex(content)
            .map(Some)
            .map_err(|_| Error::MalformedRef {
                name: name.to_string(),
                reason: format!("expected 40 hex chars, got {:?}", content),
            })
    }
}

/// every ref under refs/, resolved, in lexicographic order of full name
pub fn list_refs(repo: &Repository) -> Result<Vec<(String, Oid)>> {
    let mut refs = Vec::new();
    let base = repo.git_path("refs");
    if base.is_dir() {
        collect_refs(repo, &base, "refs", &mut refs)?;
    }
    Ok(refs)
}

fn collect_refs(
    repo: &Repository,
    dir: &Path,
    prefix: &str,
    refs: &mut Vec<(String, Oid)>,
) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_path(dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .with_path(dir)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let full = format!("{}/{}", prefix, name);
        if entry.path().is_dir() {
            collect_refs(repo, &entry.path(), &full, refs)?;
        } else if let Some(oid) = resolve_ref(repo, &full)? {
            refs.push((full, oid));
        }
    }
    Ok(())
}

/// create or update refs/<name>, writing the oid followed by a newline
pub fn create_ref(repo: &Repository, name: &str, oid: &Oid) -> Result<()> {
    let path = repo.git_path("refs").join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    fs::write(&path, format!("{}\n", oid.to_hex())).with_path(&path)?;
    log::debug!("refs/{} -> {}", name, oid);
    Ok(())
}

/// name of the branch HEAD points at, or None when detached
pub fn head_branch(repo: &Repository) -> Result<Option<String>> {
    let path = repo.git_path("HEAD");
    let content = fs::read_to_string(&path).with_path(&path)?;
    Ok(content
        .strip_prefix("ref: refs/heads/")
        .map(|b| b.trim_end().to_string()))
}

/// point the branch behind HEAD (or HEAD itself, when detached) at an oid
pub fn update_head(repo: &Repository, oid: &Oid) -> Result<()> {
    match head_branch(repo)? {
        Some(branch) => create_ref(repo, &format!("heads/{}", branch), oid),
        None => {
            let path = repo.git_path("HEAD");
            fs::write(&path, format!("{}\n", oid.to_hex())).with_path(&path)?;
            log::debug!("HEAD (detached) -> {}", oid);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    fn some_oid() -> Oid {
        Oid::from_hex("b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0").unwrap()
    }

    #[test]
    fn test_create_and_resolve() {
        let (_dir, repo) = test_repo();

        create_ref(&repo, "heads/master", &some_oid()).unwrap();
        let resolved = resolve_ref(&repo, "refs/heads/master").unwrap();
        assert_eq!(resolved, Some(some_oid()));
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let (_dir, repo) = test_repo();
        assert_eq!(resolve_ref(&repo, "refs/heads/nope").unwrap(), None);
    }

    #[test]
    fn test_head_resolves_through_branch() {
        let (_dir, repo) = test_repo();

        // fresh HEAD points at an unborn branch
        assert_eq!(resolve_ref(&repo, "HEAD").unwrap(), None);

        create_ref(&repo, "heads/master", &some_oid()).unwrap();
        assert_eq!(resolve_ref(&repo, "HEAD").unwrap(), Some(some_oid()));
    }

    #[test]
    fn test_cycle_is_malformed() {
        let (_dir, repo) = test_repo();

        fs::create_dir_all(repo.git_path("refs/heads")).unwrap();
        fs::write(repo.git_path("refs/heads/a"), "ref: refs/heads/b\n").unwrap();
        fs::write(repo.git_path("refs/heads/b"), "ref: refs/heads/a\n").unwrap();

        assert!(matches!(
            resolve_ref(&repo, "refs/heads/a"),
            Err(Error::MalformedRef { .. })
        ));
    }

    #[test]
    fn test_garbage_content_is_malformed() {
        let (_dir, repo) = test_repo();
        fs::write(repo.git_path("refs/heads/bad"), "not a hash\n").unwrap();
        assert!(matches!(
            resolve_ref(&repo, "refs/heads/bad"),
            Err(Error::MalformedRef { .. })
        ));
    }

    #[test]
    fn test_list_refs_sorted() {
        let (_dir, repo) = test_repo();

        create_ref(&repo, "tags/v1", &some_oid()).unwrap();
        create_ref(&repo, "heads/master", &some_oid()).unwrap();
        create_ref(&repo, "heads/dev", &some_oid()).unwrap();

        let refs = list_refs(&repo).unwrap();
        let names: Vec<_> = refs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["refs/heads/dev", "refs/heads/master", "refs/tags/v1"]
        );
    }

    #[test]
    fn test_head_branch() {
        let (_dir, repo) = test_repo();
        assert_eq!(head_branch(&repo).unwrap().as_deref(), Some("master"));

        fs::write(repo.git_path("HEAD"), format!("{}\n", some_oid())).unwrap();
        assert_eq!(head_branch(&repo).unwrap(), None);
    }

    #[test]
    fn test_update_head_on_branch() {
        let (_dir, repo) = test_repo();

        update_head(&repo, &some_oid()).unwrap();

        // HEAD itself is still symbolic; the branch moved
        assert_eq!(head_branch(&repo).unwrap().as_deref(), Some("master"));
        assert_eq!(
            resolve_ref(&repo, "refs/heads/master").unwrap(),
            Some(some_oid())
        );
    }

    #[test]
    fn test_update_head_detached() {
        let (_dir, repo) = test_repo();

        fs::write(
            repo.git_path("HEAD"),
            "0000000000000000000000000000000000000000\n",
        )
        .unwrap();
        update_head(&repo, &some_oid()).unwrap();

        assert_eq!(resolve_ref(&repo, "HEAD").unwrap(), Some(some_oid()));
    }
}
