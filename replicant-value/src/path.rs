//! Slash-delimited, percent-encoded container-key paths rooted at `/`.
//!
//! A [`Path`] names a node in a value tree the same way a JSON Pointer
//! does, but with a simpler escaping rule: segments are percent-encoded
//! so a container key containing `/` or `%` can't be mistaken for a path
//! separator.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A path rooted at `/`, stored as its decoded segments.
///
/// `Path::root()` (no segments) designates the whole value tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn root() -> Self {
        Path { segments: Vec::new() }
    }

    pub fn from_segments(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Path { segments: segments.into_iter().map(Into::into).collect() }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new path with one more segment appended.
    pub fn child(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Path { segments }
    }

    pub fn parse(s: &str) -> Self {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Path::root();
        }
        let segments = trimmed.split('/').map(percent_decode).collect();
        Path { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", percent_encode(seg))?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

/// Percent-encode `%` and `/` only — the two characters that would otherwise
/// be ambiguous with path syntax.
fn percent_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        match b {
            b'%' => out.push_str("%25"),
            b'/' => out.push_str("%2F"),
            _ => out.push(b as char),
        }
    }
    out
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PathVisitor;
        impl Visitor<'_> for PathVisitor {
            type Value = Path;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a slash-delimited path string")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<Path, E> {
                Ok(Path::parse(v))
            }
        }
        deserializer.deserialize_str(PathVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_round_trips() {
        assert_eq!(Path::root().to_string(), "/");
        assert_eq!(Path::parse("/"), Path::root());
    }

    #[test]
    fn nested_round_trips() {
        let p = Path::from_segments(["a", "b"]);
        assert_eq!(p.to_string(), "/a/b");
        assert_eq!(Path::parse("/a/b"), p);
    }

    #[test]
    fn escapes_slash_and_percent() {
        let p = Path::root().child("a/b").child("100%");
        let s = p.to_string();
        assert_eq!(s, "/a%2Fb/100%25");
        assert_eq!(Path::parse(&s), p);
    }

    #[test]
    fn serde_round_trip() {
        let p = Path::from_segments(["x", "y"]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"/x/y\"");
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
