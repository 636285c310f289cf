//! bootgit - a content-addressed version control core
//!
//! a minimal reimplementation of git's plumbing, byte-compatible with its
//! on-disk layout: the same repositories, objects, refs and index files
//! that git itself reads and writes.
//!
//! # Core concepts
//!
//! - **Object**: blob, tree, commit or tag; zlib-compressed and addressed
//!   by the SHA-1 of its `type length\0payload` frame
//! - **Ref**: a named pointer under `refs/`, direct (an id) or indirect
//!   (`ref: ` to another ref); `HEAD` is the entry point
//! - **Index**: the binary staging area (`DIRC` version 2) mirrored
//!   between the worktree and the next commit
//!
//! # Example usage
//!
//! ```no_run
//! use bootgit::{ops, Repository};
//! use std::path::Path;
//!
//! // initialize a repository and stage a file
//! let repo = Repository::create(Path::new("/path/to/repo")).unwrap();
//! ops::add(&repo, &[repo.worktree().join("a.txt")]).unwrap();
//!
//! // commit the staged tree
//! let identity = bootgit::user_identity().unwrap();
//! let oid = ops::commit(&repo, "initial commit", &identity).unwrap();
//! println!("{}", oid);
//! ```

mod config;
mod error;
mod hash;
mod ignore;
mod index;
mod object;
mod refs;
mod repo;
mod resolve;

pub mod ops;

pub use config::{user_identity, Config, Identity};
pub use error::{Error, Result};
pub use hash::Oid;
pub use ignore::{check_ignore, parse_rules, read_ignore_rules, IgnoreRule, IgnoreRules};
pub use index::{
    parse_index, read_index, serialize_index, write_index, Index, IndexEntry, MODE_GITLINK,
    MODE_REGULAR, MODE_SYMLINK,
};
pub use object::kvlm::Kvlm;
pub use object::tree::{EntryKind, TreeEntry};
pub use object::{objects_with_prefix, read_object, write_object, Object, ObjectKind};
pub use refs::{create_ref, head_branch, list_refs, resolve_ref, update_head};
pub use repo::Repository;
pub use resolve::{find_object, require_object, resolve_name, unique_oid};
