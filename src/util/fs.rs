//! Read-only filesystem access for graph construction.
//!
//! Graph construction only ever asks whether paths exist, enumerates module
//! directories and reads a handful of small files (precompiled manifests and
//! sources scanned for include directives). Everything goes through the
//! [`FileSystem`] trait so tests can run against an in-memory tree.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Read-only view of the filesystem.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Every file below `dir`, recursively, in sorted order.
    fn enumerate_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Size in bytes, or `None` when the file does not exist.
    fn file_size(&self, path: &Path) -> Option<u64>;
}

/// The host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn enumerate_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        fs::metadata(path).ok().map(|m| m.len())
    }
}

/// Select files under `base` matching any of the glob `patterns`.
///
/// Patterns are matched against paths relative to `base`, so this works for
/// any [`FileSystem`] implementation.
pub fn glob_files(fs: &dyn FileSystem, base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let compiled = patterns
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid glob pattern: {}", p)))
        .collect::<Result<Vec<_>>>()?;

    let candidates = fs
        .enumerate_files(base)
        .with_context(|| format!("failed to enumerate directory: {}", base.display()))?;

    let mut results: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|path| {
            let relative = path.strip_prefix(base).unwrap_or(path);
            compiled.iter().any(|p| p.matches_path(relative))
        })
        .collect();

    results.sort();
    results.dedup();
    Ok(results)
}

/// Lexically normalize a path, resolving `.` and `..` without touching disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Strip trailing path separators from a rule-supplied path.
pub fn trim_trailing_separators(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        path.to_path_buf()
    } else {
        PathBuf::from(trimmed)
    }
}

/// Check if a path is inside another path.
pub fn is_inside(path: &Path, parent: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(parent))
}

/// `dir/<base><extension>`, or `dir/<base>.<n><extension>` with the
/// smallest `n` from 2 that is not already in `claimed`. The returned path
/// is added to `claimed`.
pub fn claim_unique_path(
    claimed: &mut HashSet<PathBuf>,
    dir: &Path,
    base: &str,
    extension: &str,
) -> PathBuf {
    let mut path = dir.join(format!("{}{}", base, extension));
    let mut n = 2;
    while !claimed.insert(path.clone()) {
        path = dir.join(format!("{}.{}{}", base, n, extension));
        n += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files_on_disk() {
        let tmp = TempDir::new().unwrap();
        let private = tmp.path().join("Private");
        fs::create_dir_all(&private).unwrap();
        fs::write(private.join("Core.cpp"), "int x;").unwrap();
        fs::write(private.join("Misc.cpp"), "int y;").unwrap();
        fs::write(private.join("Notes.txt"), "notes").unwrap();

        let files =
            glob_files(&RealFileSystem, tmp.path(), &["Private/**/*.cpp".to_string()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() == "cpp"));
    }

    #[test]
    fn test_enumerate_is_sorted_and_recursive() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b/c")).unwrap();
        fs::write(tmp.path().join("b/c/z.cpp"), "").unwrap();
        fs::write(tmp.path().join("a.cpp"), "").unwrap();

        let files = RealFileSystem.enumerate_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.cpp"));
        assert!(files[1].ends_with("b/c/z.cpp"));
    }

    #[test]
    fn test_trim_trailing_separators() {
        assert_eq!(
            trim_trailing_separators(Path::new("Engine/Source/Public/")),
            PathBuf::from("Engine/Source/Public")
        );
        assert_eq!(
            trim_trailing_separators(Path::new("Engine\\Public\\\\")),
            PathBuf::from("Engine\\Public")
        );
    }

    #[test]
    fn test_is_inside_normalizes() {
        assert!(is_inside(
            Path::new("/ws/Engine/Plugins/../Source/Core"),
            Path::new("/ws/Engine")
        ));
        assert!(!is_inside(Path::new("/ws/Game/Source"), Path::new("/ws/Engine")));
    }

    #[test]
    fn test_claim_unique_path() {
        let mut claimed = HashSet::new();
        let dir = Path::new("/int/Core");
        assert_eq!(
            claim_unique_path(&mut claimed, dir, "Foo.cpp", ".o"),
            PathBuf::from("/int/Core/Foo.cpp.o")
        );
        assert_eq!(
            claim_unique_path(&mut claimed, dir, "Foo.cpp", ".o"),
            PathBuf::from("/int/Core/Foo.cpp.2.o")
        );
        assert_eq!(
            claim_unique_path(&mut claimed, dir, "Foo.cpp", ".o"),
            PathBuf::from("/int/Core/Foo.cpp.3.o")
        );
        assert_eq!(
            claim_unique_path(&mut claimed, Path::new("/int/Engine"), "Foo.cpp", ".o"),
            PathBuf::from("/int/Engine/Foo.cpp.o")
        );
    }
}
