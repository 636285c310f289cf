use std::fs::{self, OpenOptions};
use std::io::Write;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Oid;
use crate::repo::Repository;

/// recognized mode_type values (the high nibble of an on-disk mode)
pub const MODE_REGULAR: u16 = 0b1000;
pub const MODE_SYMLINK: u16 = 0b1010;
pub const MODE_GITLINK: u16 = 0b1110;

const INDEX_MAGIC: &[u8; 4] = b"DIRC";
const INDEX_VERSION: u32 = 2;
const ENTRY_FIXED_LEN: usize = 62;
const NAME_LEN_MAX: u16 = 0xFFF;

/// one staged file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// change and modification times, each (seconds, nanoseconds)
    pub ctime: (u32, u32),
    pub mtime: (u32, u32),
    pub dev: u32,
    pub ino: u32,
    pub mode_type: u16,
    /// 9-bit permission triple, 0o644 or 0o755 for regular files
    pub mode_perms: u16,
    pub uid: u32,
    pub gid: u32,
    pub fsize: u32,
    pub sha: Oid,
    pub flag_assume_valid: bool,
    /// two-bit stage number, 0 for normal entries
    pub flag_stage: u16,
    /// worktree-relative path with forward slashes
    pub name: String,
}

impl IndexEntry {
    /// build an entry for a worktree file from its (symlink) metadata
    #[cfg(unix)]
    pub fn from_metadata(name: String, sha: Oid, meta: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        let mode_type = if meta.file_type().is_symlink() {
            MODE_SYMLINK
        } else {
            MODE_REGULAR
        };
        let mode_perms = if mode_type == MODE_SYMLINK {
            0
        } else if meta.mode() & 0o111 != 0 {
            0o755
        } else {
            0o644
        };

        Self {
            ctime: (meta.ctime() as u32, meta.ctime_nsec() as u32),
            mtime: (meta.mtime() as u32, meta.mtime_nsec() as u32),
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            mode_type,
            mode_perms,
            uid: meta.uid(),
            gid: meta.gid(),
            fsize: meta.len() as u32,
            sha,
            flag_assume_valid: false,
            flag_stage: 0,
            name,
        }
    }

    fn sort_key(&self) -> (&[u8], u16) {
        (self.name.as_bytes(), self.flag_stage)
    }
}

/// the staging index
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Index {
    pub entries: Vec<IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }
}

fn be32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn be16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

/// read the staging index, or an empty one if the file does not exist
pub fn read_index(repo: &Repository) -> Result<Index> {
    let path = repo.git_path("index");
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Index::new()),
        Err(source) => return Err(Error::Io { path, source }),
    };
    parse_index(&raw)
}

/// parse the binary index format (DIRC version 2)
pub fn parse_index(raw: &[u8]) -> Result<Index> {
    if raw.len() < 12 + 20 {
        return Err(Error::TruncatedIndex(raw.len()));
    }
    if &raw[0..4] != INDEX_MAGIC {
        return Err(Error::BadMagic);
    }
    let version = be32(raw, 4);
    if version != INDEX_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let count = be32(raw, 8) as usize;

    let checksum = Oid::digest(&raw[..raw.len() - 20]);
    if checksum.as_bytes() != &raw[raw.len() - 20..] {
        return Err(Error::ChecksumMismatch);
    }

    let content = &raw[12..raw.len() - 20];
    let mut entries = Vec::with_capacity(count);
    let mut idx = 0;

    for _ in 0..count {
        if idx + ENTRY_FIXED_LEN > content.len() {
            return Err(Error::TruncatedIndex(12 + idx));
        }

        let mode = be16(content, idx + 26);
        let mode_type = mode >> 12;
        if ![MODE_REGULAR, MODE_SYMLINK, MODE_GITLINK].contains(&mode_type) {
            return Err(Error::MalformedIndexEntry {
                offset: 12 + idx,
                reason: format!("unrecognized mode type 0b{:04b}", mode_type),
            });
        }

        let flags = be16(content, idx + 60);
        let flag_assume_valid = flags & 0x8000 != 0;
        let flag_stage = (flags >> 12) & 0b11;
        let name_len = flags & NAME_LEN_MAX;

        let name_start = idx + ENTRY_FIXED_LEN;
        let name_bytes = if name_len < NAME_LEN_MAX {
            let end = name_start + name_len as usize;
            if end >= content.len() {
                return Err(Error::TruncatedIndex(12 + idx));
            }
            let bytes = &content[name_start..end];
            if content[end] != 0 {
                return Err(Error::NameNotNulTerminated(
                    String::from_utf8_lossy(bytes).into_owned(),
                ));
            }
            bytes
        } else {
            // 0xFFF means the real length did not fit: read until NUL
            let rel = content[name_start..]
                .iter()
                .position(|&b| b == 0)
                .ok_or(Error::TruncatedIndex(12 + name_start))?;
            &content[name_start..name_start + rel]
        };

        let name = String::from_utf8(name_bytes.to_vec()).map_err(|_| {
            Error::MalformedIndexEntry {
                offset: 12 + name_start,
                reason: "entry name is not utf-8".to_string(),
            }
        })?;

        entries.push(IndexEntry {
            ctime: (be32(content, idx), be32(content, idx + 4)),
            mtime: (be32(content, idx + 8), be32(content, idx + 12)),
            dev: be32(content, idx + 16),
            ino: be32(content, idx + 20),
            mode_type,
            mode_perms: mode & 0o777,
            uid: be32(content, idx + 28),
            gid: be32(content, idx + 32),
            fsize: be32(content, idx + 36),
            sha: Oid::from_slice(&content[idx + 40..idx + 60])?,
            flag_assume_valid,
            flag_stage,
            name,
        });

        // entries are padded with NULs to an 8-byte multiple
        let entry_len = ENTRY_FIXED_LEN + name_bytes.len() + 1;
        idx += entry_len + (8 - entry_len % 8) % 8;
    }

    // entries must arrive sorted by (name bytes, stage), strictly
    for pair in entries.windows(2) {
        match pair[0].sort_key().cmp(&pair[1].sort_key()) {
            std::cmp::Ordering::Less => {}
            std::cmp::Ordering::Equal => {
                return Err(Error::DuplicateEntry(pair[1].name.clone()));
            }
            std::cmp::Ordering::Greater => {
                return Err(Error::UnsortedEntries(pair[1].name.clone()));
            }
        }
    }

    Ok(Index { entries })
}

/// serialize the index: sorted entries, 8-byte padding, sha-1 trailer
pub fn serialize_index(index: &Index) -> Result<Vec<u8>> {
    let mut entries: Vec<&IndexEntry> = index.entries.iter().collect();
    entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    for pair in entries.windows(2) {
        if pair[0].sort_key() == pair[1].sort_key() {
            return Err(Error::DuplicateEntry(pair[1].name.clone()));
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_VERSION.to_be_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        validate_entry_name(&entry.name)?;

        out.extend_from_slice(&entry.ctime.0.to_be_bytes());
        out.extend_from_slice(&entry.ctime.1.to_be_bytes());
        out.extend_from_slice(&entry.mtime.0.to_be_bytes());
        out.extend_from_slice(&entry.mtime.1.to_be_bytes());
        out.extend_from_slice(&entry.dev.to_be_bytes());
        out.extend_from_slice(&entry.ino.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&((entry.mode_type << 12) | entry.mode_perms).to_be_bytes());
        out.extend_from_slice(&entry.uid.to_be_bytes());
        out.extend_from_slice(&entry.gid.to_be_bytes());
        out.extend_from_slice(&entry.fsize.to_be_bytes());
        out.extend_from_slice(entry.sha.as_bytes());

        let name_bytes = entry.name.as_bytes();
        let name_len = name_bytes.len().min(NAME_LEN_MAX as usize) as u16;
        let flags = ((entry.flag_assume_valid as u16) << 15)
            | ((entry.flag_stage & 0b11) << 12)
            | name_len;
        out.extend_from_slice(&flags.to_be_bytes());

        out.extend_from_slice(name_bytes);
        out.push(0);

        let entry_len = ENTRY_FIXED_LEN + name_bytes.len() + 1;
        out.resize(out.len() + (8 - entry_len % 8) % 8, 0);
    }

    let checksum = Oid::digest(&out);
    out.extend_from_slice(checksum.as_bytes());
    Ok(out)
}

/// serialize and atomically replace the index, holding index.lock
pub fn write_index(repo: &Repository, index: &Index) -> Result<()> {
    let data = serialize_index(index)?;

    let path = repo.git_path("index");
    let lock_path = repo.git_path("index.lock");

    let mut lock = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&lock_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(Error::LockHeld(lock_path));
        }
        Err(source) => {
            return Err(Error::Io {
                path: lock_path,
                source,
            })
        }
    };

    lock.write_all(&data).with_path(&lock_path)?;
    lock.sync_all().with_path(&lock_path)?;
    drop(lock);

    // the rename both publishes the new index and releases the lock
    fs::rename(&lock_path, &path).with_path(&path)?;

    log::debug!("index rewritten with {} entries", index.entries.len());
    Ok(())
}

fn validate_entry_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.ends_with('/')
        || name
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(Error::InvalidEntryName(name.to_string()));
    }
    Ok(())
}
