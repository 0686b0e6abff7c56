//! Slash-separated locations inside the realtime store

use std::fmt;

use serde::{Deserialize, Serialize};

use super::BackendError;

const FORBIDDEN: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// A validated path such as `heart_rate_history/{user}/{timestamp}`.
///
/// The empty path is the root of the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbPath {
    segments: Vec<String>,
}

impl DbPath {
    /// The root of the store
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-separated path. Leading and trailing slashes are ignored.
    pub fn parse(path: &str) -> Result<Self, BackendError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut parsed = Self::root();
        for segment in trimmed.split('/') {
            parsed = parsed.child(segment)?;
        }
        Ok(parsed)
    }

    /// Append one segment
    pub fn child(&self, segment: &str) -> Result<Self, BackendError> {
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True when `self` equals `other` or lies above it.
    pub fn is_ancestor_of(&self, other: &DbPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// True when a change at one path is visible from the other.
    pub fn overlaps(&self, other: &DbPath) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }
}

pub(crate) fn validate_segment(segment: &str) -> Result<(), BackendError> {
    if segment.is_empty() {
        return Err(BackendError::InvalidPath("empty path segment".to_string()));
    }
    if let Some(c) = segment.chars().find(|c| FORBIDDEN.contains(c) || c.is_control()) {
        return Err(BackendError::InvalidPath(format!(
            "segment {:?} contains forbidden character {:?}",
            segment, c
        )));
    }
    Ok(())
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = DbPath::parse("/heart_rate_history/u1/001/").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.to_string(), "heart_rate_history/u1/001");
        assert_eq!(path.key(), Some("001"));
        assert_eq!(DbPath::parse("").unwrap(), DbPath::root());
    }

    #[test]
    fn test_rejects_bad_segments() {
        let root = DbPath::root();
        assert!(matches!(root.child(""), Err(BackendError::InvalidPath(_))));
        assert!(root.child("a/b").is_err());
        assert!(root.child("a.b").is_err());
        assert!(root.child("$key").is_err());
        assert!(DbPath::parse("a//b").is_err());
    }

    #[test]
    fn test_ancestry() {
        let history = DbPath::parse("heart_rate_history/u1").unwrap();
        let entry = history.child("002").unwrap();
        let other = DbPath::parse("heart_rate_history/u2").unwrap();

        assert!(history.is_ancestor_of(&entry));
        assert!(!entry.is_ancestor_of(&history));
        assert!(entry.overlaps(&history));
        assert!(!other.overlaps(&entry));
        assert!(DbPath::root().is_ancestor_of(&entry));
        assert_eq!(entry.parent(), Some(history));
    }
}
