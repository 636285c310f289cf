//! high-level operations on bootgit repositories

mod checkout;
mod commit;
mod log;
mod ls_tree;
mod stage;
mod status;
mod tag;

pub use checkout::checkout;
pub use commit::{commit, create_commit, write_tree_from_index};
pub use log::log_dot;
pub use ls_tree::{ls_tree, TreeListing};
pub use stage::{add, rm};
pub use status::{status, tree_to_map, ChangeKind, Status};
pub use tag::{create_tag, list_tags};

use crate::error::{Error, Result};
use crate::hash::Oid;
use crate::object::tree::TreeEntry;
use crate::object::{read_object, Object};
use crate::repo::Repository;

/// read an oid that must name a tree
pub(crate) fn read_tree_entries(repo: &Repository, oid: &Oid) -> Result<Vec<TreeEntry>> {
    match read_object(repo, oid)? {
        Object::Tree(entries) => Ok(entries),
        _ => Err(Error::WrongType {
            name: oid.to_hex(),
            expected: "tree",
        }),
    }
}
