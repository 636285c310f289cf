pub mod kvlm;
pub mod tree;

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Oid;
use crate::repo::Repository;
use kvlm::Kvlm;
use tree::TreeEntry;

/// the four on-disk object types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            _ => Err(Error::UnknownType(s.to_string())),
        }
    }
}

/// a git object: the closed sum of the four on-disk types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
    Commit(Kvlm),
    Tag(Kvlm),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }

    /// deserialize a payload of the given kind
    pub fn from_payload(kind: ObjectKind, payload: Vec<u8>) -> Result<Self> {
        match kind {
            ObjectKind::Blob => Ok(Object::Blob(payload)),
            ObjectKind::Tree => Ok(Object::Tree(tree::parse(&payload)?)),
            ObjectKind::Commit => Ok(Object::Commit(Kvlm::parse(&payload)?)),
            ObjectKind::Tag => Ok(Object::Tag(Kvlm::parse(&payload)?)),
        }
    }

    /// serialize the payload (the bytes inside the frame)
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Object::Blob(data) => data.clone(),
            Object::Tree(entries) => tree::serialize(entries),
            Object::Commit(kvlm) | Object::Tag(kvlm) => kvlm.serialize(),
        }
    }

    /// the canonical frame: `type SP decimal-length NUL payload`
    pub fn frame(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut out = Vec::with_capacity(payload.len() + 16);
        out.extend_from_slice(self.kind().as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(payload.len().to_string().as_bytes());
        out.push(0);
        out.extend_from_slice(&payload);
        out
    }

    /// the object id: sha-1 of the frame
    pub fn id(&self) -> Oid {
        Oid::digest(&self.frame())
    }
}

/// filesystem path of an object in the store
pub fn object_path(repo: &Repository, oid: &Oid) -> PathBuf {
    let (dir, file) = oid.to_path_components();
    repo.git_path("objects").join(dir).join(file)
}

/// write an object into the store; idempotent, returns the id
pub fn write_object(repo: &Repository, obj: &Object) -> Result<Oid> {
    let frame = obj.frame();
    let oid = Oid::digest(&frame);

    let (dir, file) = oid.to_path_components();
    let obj_dir = repo.git_path("objects").join(dir);
    let path = obj_dir.join(file);

    // content-keyed: an existing file already holds these bytes
    if path.exists() {
        return Ok(oid);
    }

    fs::create_dir_all(&obj_dir).with_path(&obj_dir)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&frame).with_path(&path)?;
    let compressed = encoder.finish().with_path(&path)?;

    // atomic write: temp -> fsync -> rename
    let tmp_path = obj_dir.join(format!("tmp_obj_{}", uuid::Uuid::new_v4()));
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(&compressed).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }
    fs::rename(&tmp_path, &path).with_path(&path)?;

    let dir_file = File::open(&obj_dir).with_path(&obj_dir)?;
    dir_file.sync_all().with_path(&obj_dir)?;

    log::debug!("wrote {} {} ({} bytes)", obj.kind().as_str(), oid, frame.len());

    Ok(oid)
}

/// read an object, verifying frame, length and id
pub fn read_object(repo: &Repository, oid: &Oid) -> Result<Object> {
    let path = object_path(repo, oid);

    let compressed = fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(oid.to_hex())
        } else {
            Error::Io { path: path.clone(), source: e }
        }
    })?;

    let mut raw = Vec::new();
    ZlibDecoder::new(&compressed[..])
        .read_to_end(&mut raw)
        .map_err(|e| Error::CorruptObject {
            oid: oid.to_hex(),
            reason: format!("inflate failed: {}", e),
        })?;

    let sp = raw
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::MalformedHeader(oid.to_hex()))?;
    let nul = raw[sp..]
        .iter()
        .position(|&b| b == 0)
        .map(|i| sp + i)
        .ok_or_else(|| Error::MalformedHeader(oid.to_hex()))?;

    let kind_str = std::str::from_utf8(&raw[..sp])
        .map_err(|_| Error::MalformedHeader(oid.to_hex()))?;
    let kind = kind_str
        .parse::<ObjectKind>()
        .map_err(|_| Error::MalformedHeader(oid.to_hex()))?;

    let expected: usize = std::str::from_utf8(&raw[sp + 1..nul])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::MalformedHeader(oid.to_hex()))?;
    let payload = &raw[nul + 1..];
    if payload.len() != expected {
        return Err(Error::LengthMismatch {
            oid: oid.to_hex(),
            expected,
            actual: payload.len(),
        });
    }

    let actual = Oid::digest(&raw);
    if actual != *oid {
        return Err(Error::HashMismatch {
            expected: oid.to_hex(),
            actual: actual.to_hex(),
        });
    }

    Object::from_payload(kind, payload.to_vec())
}

/// hex ids of stored objects whose name starts with a hex prefix (>= 4 chars)
pub fn objects_with_prefix(repo: &Repository, prefix: &str) -> Result<Vec<String>> {
    let prefix = prefix.to_lowercase();
    let mut found = Vec::new();

    let dir = repo.git_path("objects").join(&prefix[..2]);
    if !dir.is_dir() {
        return Ok(found);
    }

    let rest = &prefix[2..];
    for entry in fs::read_dir(&dir).with_path(&dir)? {
        let entry = entry.with_path(&dir)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(rest) && name.len() == 38 {
            found.push(format!("{}{}", &prefix[..2], name));
        }
    }

    found.sort();
    Ok(found)
}
