//! Immutable UTF-8 string with a cached "kind" tag, codepoint length, and hash.
//!
//! Grounded on `examples/original_source/src/vm/datatype/arstring.cpp` /
//! `arstring.h`: strings remember whether they are pure ASCII or the max
//! UTF-8 byte width of their codepoints, so `len()` in codepoints is O(1)
//! after construction instead of re-scanning every call.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Narrowest UTF-8 byte-width classification of a string's codepoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Ascii,
    Utf8Two,
    Utf8Three,
    Utf8Four,
}

impl StringKind {
    fn classify(s: &str) -> StringKind {
        let mut kind = StringKind::Ascii;
        for ch in s.chars() {
            let width = ch.len_utf8();
            kind = match (kind, width) {
                (_, 1) => kind,
                (StringKind::Ascii, 2) => StringKind::Utf8Two,
                (StringKind::Ascii, 3) => StringKind::Utf8Three,
                (StringKind::Ascii, 4) => StringKind::Utf8Four,
                (k, w) if (k as u8) < width_rank(w) => StringKind::from_rank(width_rank(w)),
                (k, _) => k,
            };
        }
        kind
    }
}

fn width_rank(byte_width: usize) -> u8 {
    match byte_width {
        1 => 0,
        2 => 1,
        3 => 2,
        _ => 3,
    }
}

impl StringKind {
    fn from_rank(rank: u8) -> StringKind {
        match rank {
            0 => StringKind::Ascii,
            1 => StringKind::Utf8Two,
            2 => StringKind::Utf8Three,
            _ => StringKind::Utf8Four,
        }
    }
}

/// An immutable Argon string.
#[derive(Debug)]
pub struct ArString {
    bytes: Box<str>,
    kind: StringKind,
    cp_len: usize,
    hash: u64,
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

impl ArString {
    pub fn new(s: impl Into<String>) -> Self {
        let s: String = s.into();
        let kind = StringKind::classify(&s);
        let cp_len = s.chars().count();
        let hash = fnv1a(s.as_bytes());
        ArString {
            bytes: s.into_boxed_str(),
            kind,
            cp_len,
            hash,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.bytes
    }

    pub fn kind(&self) -> StringKind {
        self.kind
    }

    /// Length in codepoints (not bytes).
    pub fn len(&self) -> usize {
        self.cp_len
    }

    pub fn is_empty(&self) -> bool {
        self.cp_len == 0
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for ArString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}
impl Eq for ArString {}

impl Hash for ArString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl std::fmt::Display for ArString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bytes)
    }
}

/// Process-wide intern dict for strings produced by the compiler's constant
/// pool or explicitly interned (e.g. atom backing, dict keys that are short
/// identifiers). Mirrors `StringIntern` in the original VM.
static INTERN_TABLE: Lazy<Mutex<HashMap<String, Arc<ArString>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn intern(s: &str) -> Arc<ArString> {
    let mut table = INTERN_TABLE.lock();
    if let Some(existing) = table.get(s) {
        return existing.clone();
    }
    let arc = Arc::new(ArString::new(s));
    table.insert(s.to_string(), arc.clone());
    arc
}
