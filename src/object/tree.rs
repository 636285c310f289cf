use crate::error::{Error, Result};
use crate::hash::Oid;

/// what a tree entry points at, derived from the high bits of its mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Tree,
    Blob,
    Symlink,
    Gitlink,
}

impl EntryKind {
    /// object type printed by ls-tree (symlinks are blobs, gitlinks commits)
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Tree => "tree",
            EntryKind::Blob | EntryKind::Symlink => "blob",
            EntryKind::Gitlink => "commit",
        }
    }
}

/// a single tree entry: mode, name, object id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// ascii octal digits without leading zeros, e.g. b"100644" or b"40000"
    pub mode: Vec<u8>,
    /// name bytes, no NUL and no '/'
    pub path: Vec<u8>,
    pub sha: Oid,
}

impl TreeEntry {
    /// the mode as a number (the on-disk form is ascii octal)
    pub fn mode_value(&self) -> Result<u32> {
        let text = std::str::from_utf8(&self.mode)
            .map_err(|_| Error::BadEntryMode(String::from_utf8_lossy(&self.mode).into_owned()))?;
        u32::from_str_radix(text, 8).map_err(|_| Error::BadEntryMode(text.to_string()))
    }

    /// kind from the numeric mode: 04 tree, 10 blob, 12 symlink, 16 gitlink
    pub fn kind(&self) -> Result<EntryKind> {
        let mode = self.mode_value()?;
        match mode >> 12 {
            0o04 => Ok(EntryKind::Tree),
            0o10 => Ok(EntryKind::Blob),
            0o12 => Ok(EntryKind::Symlink),
            0o16 => Ok(EntryKind::Gitlink),
            _ => Err(Error::BadEntryMode(
                String::from_utf8_lossy(&self.mode).into_owned(),
            )),
        }
    }

    /// sort key: subtree names compare as if they ended in '/'
    pub fn sort_key(&self) -> Vec<u8> {
        let mut key = self.path.clone();
        if matches!(self.kind(), Ok(EntryKind::Tree)) {
            key.push(b'/');
        }
        key
    }
}

/// parse a tree payload: a run of `mode SP path NUL sha20` records
pub fn parse(raw: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < raw.len() {
        let sp = raw[pos..]
            .iter()
            .position(|&b| b == b' ')
            .map(|i| pos + i)
            .ok_or(Error::TruncatedEntry(pos))?;
        if sp == pos || sp - pos > 6 {
            return Err(Error::BadEntryMode(
                String::from_utf8_lossy(&raw[pos..sp]).into_owned(),
            ));
        }
        let mode = raw[pos..sp].to_vec();

        let nul = raw[sp..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| sp + i)
            .ok_or(Error::TruncatedEntry(sp))?;
        let path = raw[sp + 1..nul].to_vec();

        if nul + 21 > raw.len() {
            return Err(Error::TruncatedEntry(nul));
        }
        let sha = Oid::from_slice(&raw[nul + 1..nul + 21])?;

        entries.push(TreeEntry { mode, path, sha });
        pos = nul + 21;
    }

    Ok(entries)
}

/// emit a tree payload in canonical order
pub fn serialize(entries: &[TreeEntry]) -> Vec<u8> {
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut out = Vec::new();
    for entry in sorted {
        out.extend_from_slice(&entry.mode);
        out.push(b' ');
        out.extend_from_slice(&entry.path);
        out.push(0);
        out.extend_from_slice(entry.sha.as_bytes());
    }
    out
}
