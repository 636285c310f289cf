use crate::error::{Error, Result};

/// key-value list with message: the header format shared by commits and tags
///
/// keys keep their first-seen order and may carry several values (`parent`
/// repeats on merges); the free-form message follows a blank line. parsing
/// then emitting reproduces the input byte-for-byte.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Kvlm {
    fields: Vec<(Vec<u8>, Vec<Vec<u8>>)>,
    message: Vec<u8>,
}

fn find_byte(raw: &[u8], from: usize, byte: u8) -> Option<usize> {
    raw[from..].iter().position(|&b| b == byte).map(|i| from + i)
}

impl Kvlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// parse a commit or tag payload
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut kvlm = Self::new();
        let mut pos = 0;

        while pos < raw.len() {
            // a blank line separates the header from the message
            if raw[pos] == b'\n' {
                kvlm.message = raw[pos + 1..].to_vec();
                return Ok(kvlm);
            }

            let sp = find_byte(raw, pos, b' ').ok_or(Error::MalformedKvlm(pos))?;
            let nl = find_byte(raw, pos, b'\n').ok_or(Error::MalformedKvlm(pos))?;
            if nl < sp {
                return Err(Error::MalformedKvlm(pos));
            }
            let key = raw[pos..sp].to_vec();

            // the value continues over any following line that starts with a space
            let mut end = nl;
            while end + 1 < raw.len() && raw[end + 1] == b' ' {
                end = find_byte(raw, end + 1, b'\n').ok_or(Error::MalformedKvlm(end))?;
            }

            let mut value = Vec::with_capacity(end - sp);
            let mut i = sp + 1;
            while i < end {
                if raw[i] == b'\n' && i + 1 < end && raw[i + 1] == b' ' {
                    value.push(b'\n');
                    i += 2; // drop the continuation space
                } else {
                    value.push(raw[i]);
                    i += 1;
                }
            }

            kvlm.push(&key, value);
            pos = end + 1;
        }

        Ok(kvlm)
    }

    /// emit the payload, preserving key order and multiplicity
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, values) in &self.fields {
            for value in values {
                out.extend_from_slice(key);
                out.push(b' ');
                for &b in value {
                    out.push(b);
                    if b == b'\n' {
                        out.push(b' ');
                    }
                }
                out.push(b'\n');
            }
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// append a value for a key, keeping the key's first-seen position
    pub fn push(&mut self, key: &[u8], value: impl Into<Vec<u8>>) {
        let value = value.into();
        if let Some((_, values)) = self.fields.iter_mut().find(|(k, _)| k == key) {
            values.push(value);
        } else {
            self.fields.push((key.to_vec(), vec![value]));
        }
    }

    /// first value for a key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, values)| values.first())
            .map(|v| v.as_slice())
    }

    /// all values for a key, in insertion order
    pub fn get_all(&self, key: &[u8]) -> &[Vec<u8>] {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<Vec<u8>>) {
        self.message = message.into();
    }
}
