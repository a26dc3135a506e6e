//! Registered courses.
//!
//! `courses.json` is either an object keyed by course id (values are
//! ignored) or an array of course ids.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    Map(BTreeMap<String, serde_json::Value>),
    List(Vec<String>),
}

/// Set of course ids the CLI will search or rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseRegistry {
    courses: BTreeSet<String>,
}

impl CourseRegistry {
    /// Parses registry JSON.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let file: RegistryFile = serde_json::from_slice(bytes)
            .context("Course registry must be a JSON object or array")?;
        let courses = match file {
            RegistryFile::Map(map) => map.into_keys().collect(),
            RegistryFile::List(list) => list.into_iter().collect(),
        };
        Ok(Self { courses })
    }

    /// Loads the registry file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read course registry: {}", path.display()))?;
        Self::from_json_slice(&bytes)
            .with_context(|| format!("Invalid course registry: {}", path.display()))
    }

    /// Returns true if `course` may be searched.
    pub fn is_registered(&self, course: &str) -> bool {
        self.courses.contains(course)
    }

    /// Registered course ids in sorted order.
    pub fn courses(&self) -> impl Iterator<Item = &str> {
        self.courses.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_registry() {
        let registry = CourseRegistry::from_json_slice(
            br#"{"kx2q9": {"email": "ta@school.edu"}, "cs61a": {}}"#,
        )
        .unwrap();
        assert!(registry.is_registered("kx2q9"));
        assert!(!registry.is_registered("cs70"));
        assert_eq!(registry.courses().collect::<Vec<_>>(), vec!["cs61a", "kx2q9"]);
    }

    #[test]
    fn test_array_registry() {
        let registry = CourseRegistry::from_json_slice(br#"["cs61a", "cs70"]"#).unwrap();
        assert!(registry.is_registered("cs70"));
    }

    #[test]
    fn test_invalid_registry() {
        assert!(CourseRegistry::from_json_slice(b"42").is_err());
    }

    #[test]
    fn test_missing_registry_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CourseRegistry::load(&dir.path().join("courses.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read course registry"));
    }
}
