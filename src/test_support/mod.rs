//! Test utilities for keel unit tests.
//!
//! Provides an in-memory [`FileSystem`] and fixtures for building rule sets
//! and assembled targets without touching disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use keel::test_support::fixtures::{module, Fixture, RuleBuilder};
//!
//! #[test]
//! fn test_example() {
//!     let mut fixture = Fixture::new()
//!         .with_launch(module("Launch").private_deps(&["Core"]))
//!         .with_module(module("Core"));
//!     fixture.fs.add_file("/ws/Engine/Source/Runtime/Core/Private/Core.cpp", "");
//!
//!     let target = fixture.assembled();
//!     assert_eq!(target.binaries.len(), 1);
//! }
//! ```

pub mod fixtures;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use crate::util::fs::FileSystem;

/// In-memory filesystem.
///
/// Adding a file implies every parent directory. Listings come back sorted
/// like [`RealFileSystem`](crate::util::fs::RealFileSystem)'s.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any earlier contents.
    pub fn add_file(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.files.insert(path, contents.into());
    }

    /// Add a directory and all of its parents.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> bool {
        self.files.remove(path.as_ref()).is_some()
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    fn enumerate_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.dirs.contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {}", dir.display()),
            ));
        }
        Ok(self
            .files
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )
        })
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        self.files.get(path).map(|c| c.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_filesystem() {
        let mut fs = MockFileSystem::new();
        fs.add_file("/ws/Core/Private/Core.cpp", "int x;");
        fs.add_file("/ws/Core/Private/A.cpp", "");

        assert!(fs.is_dir(Path::new("/ws/Core")));
        assert!(fs.exists(Path::new("/ws/Core/Private/Core.cpp")));
        assert!(!fs.is_dir(Path::new("/ws/Core/Private/Core.cpp")));
        assert_eq!(fs.file_size(Path::new("/ws/Core/Private/Core.cpp")), Some(6));

        let files = fs.enumerate_files(Path::new("/ws/Core")).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("/ws/Core/Private/A.cpp"),
                PathBuf::from("/ws/Core/Private/Core.cpp"),
            ]
        );

        fs.add_file("/ws/Core/Private/Core.cpp", "");
        assert_eq!(fs.file_size(Path::new("/ws/Core/Private/Core.cpp")), Some(0));
        assert!(fs.remove_file("/ws/Core/Private/A.cpp"));
        assert_eq!(
            fs.read_to_string(Path::new("/ws/Missing.cpp")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
