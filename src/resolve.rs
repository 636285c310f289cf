use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::object::{objects_with_prefix, read_object, Object, ObjectKind};
use crate::refs::resolve_ref;
use crate::repo::Repository;

/// every oid a user-supplied name could mean
///
/// candidates are unioned, in order, from: the literal HEAD; stored objects
/// matching a 4-40 char hex prefix; and the name under refs/tags, refs/heads
/// and refs/remotes.
pub fn resolve_name(repo: &Repository, name: &str) -> Result<Vec<Oid>> {
    let mut candidates: Vec<Oid> = Vec::new();

    if name.trim().is_empty() {
        return Ok(candidates);
    }

    if name == "HEAD" {
        if let Some(oid) = resolve_ref(repo, "HEAD")? {
            candidates.push(oid);
        }
        return Ok(candidates);
    }

    if (4..=40).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_hexdigit()) {
        for hex in objects_with_prefix(repo, name)? {
            candidates.push(Oid::from_hex(&hex)?);
        }
    }

    for category in ["tags", "heads", "remotes"] {
        if let Some(oid) = resolve_ref(repo, &format!("refs/{}/{}", category, name))? {
            if !candidates.contains(&oid) {
                candidates.push(oid);
            }
        }
    }

    Ok(candidates)
}

/// resolve a name to exactly one oid, or fail NotFound / Ambiguous
pub fn unique_oid(repo: &Repository, name: &str) -> Result<Oid> {
    let candidates = resolve_name(repo, name)?;
    match candidates.len() {
        0 => Err(Error::NameNotFound(name.to_string())),
        1 => Ok(candidates[0]),
        _ => Err(Error::Ambiguous {
            name: name.to_string(),
            candidates: candidates.iter().map(Oid::to_hex).collect(),
        }),
    }
}

/// typed resolution: follow tags (and a commit's tree, when a tree is
/// wanted) until the object has the requested kind
///
/// with follow off, a kind mismatch yields None instead of chasing.
pub fn find_object(
    repo: &Repository,
    name: &str,
    kind: Option<ObjectKind>,
    follow: bool,
) -> Result<Option<Oid>> {
    let mut oid = unique_oid(repo, name)?;

    let Some(kind) = kind else {
        return Ok(Some(oid));
    };

    loop {
        let obj = read_object(repo, &oid)?;
        if obj.kind() == kind {
            return Ok(Some(oid));
        }
        if !follow {
            return Ok(None);
        }

        oid = match &obj {
            Object::Tag(kvlm) => header_oid(kvlm.get(b"object"), &oid)?,
            Object::Commit(kvlm) if kind == ObjectKind::Tree => {
                header_oid(kvlm.get(b"tree"), &oid)?
            }
            _ => return Ok(None),
        };
    }
}

/// like find_object, but a miss is an error naming the wanted kind
pub fn require_object(repo: &Repository, name: &str, kind: ObjectKind) -> Result<Oid> {
    find_object(repo, name, Some(kind), true)?.ok_or_else(|| Error::WrongType {
        name: name.to_string(),
        expected: kind.as_str(),
    })
}

fn header_oid(value: Option<&[u8]>, from: &Oid) -> Result<Oid> {
    let value = value.ok_or_else(|| Error::CorruptObject {
        oid: from.to_hex(),
        reason: "missing object/tree header".to_string(),
    })?;
    let hex = std::str::from_utf8(value).map_err(|_| Error::CorruptObject {
        oid: from.to_hex(),
        reason: "non-utf8 header value".to_string(),
    })?;
    Oid::from_hex(hex)
}
