use std::path::PathBuf;

/// error type for bootgit operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a git repository (or any of the parent directories): {0}")]
    NoRepo(PathBuf),

    #[error("gitdir already exists and is not empty: {0}")]
    GitdirNotEmpty(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("unsupported repositoryformatversion: {0}")]
    UnsupportedFormatVersion(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("no such reference: {0}")]
    NameNotFound(String),

    #[error("ambiguous name {name}: candidates are:\n - {}", .candidates.join("\n - "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    #[error("{name} is not a {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
    },

    #[error("unknown object type: {0}")]
    UnknownType(String),

    #[error("malformed object header in {0}")]
    MalformedHeader(String),

    #[error("length mismatch in object {oid}: header says {expected}, payload is {actual}")]
    LengthMismatch {
        oid: String,
        expected: usize,
        actual: usize,
    },

    #[error("truncated tree entry at byte {0}")]
    TruncatedEntry(usize),

    #[error("bad tree entry mode: {0}")]
    BadEntryMode(String),

    #[error("hash mismatch: object {expected} hashes to {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("corrupt object {oid}: {reason}")]
    CorruptObject { oid: String, reason: String },

    #[error("malformed commit or tag header at byte {0}")]
    MalformedKvlm(usize),

    #[error("malformed reference {name}: {reason}")]
    MalformedRef { name: String, reason: String },

    #[error("invalid hash hex: {0}")]
    InvalidHex(String),

    #[error("bad index signature")]
    BadMagic,

    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    #[error("index checksum mismatch")]
    ChecksumMismatch,

    #[error("index entries out of order at {0}")]
    UnsortedEntries(String),

    #[error("duplicate index entry: {0}")]
    DuplicateEntry(String),

    #[error("index entry name not NUL-terminated: {0}")]
    NameNotNulTerminated(String),

    #[error("truncated index at byte {0}")]
    TruncatedIndex(usize),

    #[error("malformed index entry at byte {offset}: {reason}")]
    MalformedIndexEntry { offset: usize, reason: String },

    #[error("invalid index entry name: {0}")]
    InvalidEntryName(String),

    #[error("path outside the worktree: {0}")]
    OutsideWorktree(PathBuf),

    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    #[error("paths not in the index: {}", .0.join(", "))]
    NotInIndex(Vec<String>),

    #[error("checkout target not empty: {0}")]
    TargetNotEmpty(PathBuf),

    #[error("ignore check requires worktree-relative paths, got: {0}")]
    AbsoluteIgnorePath(PathBuf),

    #[error("index is locked (stale {0}?)")]
    LockHeld(PathBuf),

    #[error("no user identity: set user.name and user.email in your git config")]
    IdentityMissing,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// process exit code for this error: 1 user error, 2 io, 3 malformed repository
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Io { .. } => 2,
            Error::UnsupportedFormatVersion(_)
            | Error::MalformedHeader(_)
            | Error::LengthMismatch { .. }
            | Error::TruncatedEntry(_)
            | Error::BadEntryMode(_)
            | Error::HashMismatch { .. }
            | Error::CorruptObject { .. }
            | Error::MalformedKvlm(_)
            | Error::MalformedRef { .. }
            | Error::BadMagic
            | Error::UnsupportedVersion(_)
            | Error::ChecksumMismatch
            | Error::UnsortedEntries(_)
            | Error::DuplicateEntry(_)
            | Error::NameNotNulTerminated(_)
            | Error::TruncatedIndex(_)
            | Error::MalformedIndexEntry { .. }
            | Error::Config(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
