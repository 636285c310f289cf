use crate::config::Identity;
use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::object::kvlm::Kvlm;
use crate::object::{read_object, write_object, Object};
use crate::ops::commit::signature_line;
use crate::refs::{create_ref, list_refs};
use crate::repo::Repository;
use crate::resolve::unique_oid;

/// names of all tags, sorted
pub fn list_tags(repo: &Repository) -> Result<Vec<String>> {
    Ok(list_refs(repo)?
        .into_iter()
        .filter_map(|(name, _)| name.strip_prefix("refs/tags/").map(str::to_string))
        .collect())
}

/// create a tag for a resolved name
///
/// lightweight tags are just a ref; annotated tags also store a tag object
/// recording the target's type, the tagger and a message.
pub fn create_tag(
    repo: &Repository,
    name: &str,
    target: &str,
    annotate: bool,
    identity: Option<&Identity>,
) -> Result<Oid> {
    let oid = unique_oid(repo, target)?;

    let ref_target = if annotate {
        let identity = identity.ok_or(Error::IdentityMissing)?;
        let target_kind = read_object(repo, &oid)?.kind();

        let mut kvlm = Kvlm::new();
        kvlm.push(b"object", oid.to_hex());
        kvlm.push(b"type", target_kind.as_str());
        kvlm.push(b"tag", name);
        kvlm.push(b"tagger", signature_line(identity));
        kvlm.set_message(format!("{}\n", name));

        write_object(repo, &Object::Tag(kvlm))?
    } else {
        oid
    };

    create_ref(repo, &format!("tags/{}", name), &ref_target)?;
    Ok(ref_target)
}
