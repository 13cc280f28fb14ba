//! Filesystem abstraction used by the download pipeline.
//!
//! Page staging, cover writes and archive output all go through
//! [`Filesystem`], so the pipeline can run against [`MemoryFilesystem`]
//! in tests.

use crate::error::{Result, TankobonError};
use crate::metadata::atomic_write_bytes;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// The file operations the pipeline needs.
pub trait Filesystem: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Write a whole file. Readers see either the old or the new contents.
    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;

    /// Remove a file or a directory tree. Missing paths are not an error.
    fn remove_all(&self, path: &Path) -> Result<()>;

    /// Direct children of a directory, sorted by path.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Shared handle to a filesystem.
pub type DynFilesystem = Arc<dyn Filesystem>;

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| TankobonError::io_with_path(e, path))
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        atomic_write_bytes(path, contents)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| TankobonError::io_with_path(e, path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TankobonError::io_with_path(e, path)),
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut children = fs::read_dir(path)
            .map_err(|e| TankobonError::io_with_path(e, path))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| TankobonError::io_with_path(e, path))?;
        children.sort();
        Ok(children)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// In-memory filesystem for tests.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<PathBuf, Node>>> {
        self.nodes
            .lock()
            .map_err(|_| TankobonError::Other("Memory filesystem lock poisoned".to_string()))
    }

    /// All file paths currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|(_, node)| matches!(node, Node::File(_)))
                    .map(|(path, _)| path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert_dirs(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) -> Result<()> {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            match nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(TankobonError::Io {
                        message: format!("{} is a file", ancestor.display()),
                        path: Some(ancestor.to_path_buf()),
                        source: None,
                    })
                }
                None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn not_found(path: &Path) -> TankobonError {
        TankobonError::io_with_path(
            std::io::Error::from(std::io::ErrorKind::NotFound),
            path,
        )
    }
}

impl Filesystem for MemoryFilesystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut nodes = self.lock()?;
        Self::insert_dirs(&mut nodes, path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut nodes = self.lock()?;
        if let Some(parent) = path.parent() {
            Self::insert_dirs(&mut nodes, parent)?;
        }
        if matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(TankobonError::Io {
                message: format!("{} is a directory", path.display()),
                path: Some(path.to_path_buf()),
                source: None,
            });
        }
        nodes.insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        match self.lock()?.get(path) {
            Some(Node::File(contents)) => Ok(contents.clone()),
            _ => Err(Self::not_found(path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock()
            .map(|nodes| nodes.contains_key(path))
            .unwrap_or(false)
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        self.lock()?.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let nodes = self.lock()?;
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(Self::not_found(path));
        }
        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(fs: &dyn Filesystem, root: &Path) {
        let chapter = root.join("Series").join("Chapter 1");
        fs.create_dir_all(&chapter).unwrap();
        assert!(fs.exists(&chapter));

        fs.write_file(&chapter.join("02.png"), b"two").unwrap();
        fs.write_file(&chapter.join("01.png"), b"one").unwrap();
        assert_eq!(fs.read_file(&chapter.join("01.png")).unwrap(), b"one");

        let listed = fs.list_dir(&chapter).unwrap();
        assert_eq!(listed, vec![chapter.join("01.png"), chapter.join("02.png")]);

        fs.write_file(&chapter.join("01.png"), b"uno").unwrap();
        assert_eq!(fs.read_file(&chapter.join("01.png")).unwrap(), b"uno");

        fs.remove_all(&root.join("Series")).unwrap();
        assert!(!fs.exists(&chapter));
        assert!(!fs.exists(&chapter.join("01.png")));
        fs.remove_all(&root.join("Series")).unwrap();
        assert!(fs.read_file(&chapter.join("01.png")).is_err());
    }

    #[test]
    fn test_os_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        exercise(&OsFilesystem, temp_dir.path());
    }

    #[test]
    fn test_memory_filesystem() {
        let fs = MemoryFilesystem::new();
        exercise(&fs, Path::new("/library"));
    }

    #[test]
    fn test_memory_write_creates_parents() {
        let fs = MemoryFilesystem::new();
        fs.write_file(Path::new("/a/b/c.txt"), b"x").unwrap();
        assert!(fs.exists(Path::new("/a/b")));
        assert_eq!(fs.files(), vec![PathBuf::from("/a/b/c.txt")]);
        assert!(fs.create_dir_all(Path::new("/a/b/c.txt/d")).is_err());
    }
}
