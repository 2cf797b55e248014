//! Level-at-a-time directory traversal
//!
//! A [`TreeWalker`] yields one [`DirLevel`] per directory: the directory's
//! path plus the names (not full paths) of its subdirectories and files.
//! Callers reconstruct full paths by joining. Two orders are supported:
//!
//! - [`WalkOrder::TopDown`] - a parent is yielded before its children, so
//!   a consumer creating directories sees each parent before anything
//!   inside it.
//! - [`WalkOrder::BottomUp`] - children are yielded before their parents,
//!   so a consumer deleting directories empties each one before reaching
//!   it (directory removal requires an empty directory).
//!
//! A walker is finite and not restartable; open a fresh one per pass.
//! Symbolic links are classified by following them (`tokio::fs::metadata`);
//! entries that resolve to neither a file nor a directory are ignored.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Traversal order for a [`TreeWalker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Parents before children (creation/copy passes)
    TopDown,
    /// Children before parents (deletion passes)
    BottomUp,
}

/// One directory level: the directory plus the names of its entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirLevel {
    /// Full path of the directory this level describes
    pub dir: PathBuf,
    /// Names of subdirectories, relative to `dir`, sorted
    pub subdirs: Vec<OsString>,
    /// Names of regular files, relative to `dir`, sorted
    pub files: Vec<OsString>,
}

/// A partially-visited directory on the bottom-up descent stack
#[derive(Debug)]
struct Frame {
    level: DirLevel,
    next_subdir: usize,
}

/// Lazy tree traversal rooted at a single directory
#[derive(Debug)]
pub struct TreeWalker {
    order: WalkOrder,
    /// Directories read but not yet yielded (top-down) or not yet
    /// descended into (the root, bottom-up)
    pending: Vec<PathBuf>,
    /// Ancestors whose children are still being visited (bottom-up only)
    frames: Vec<Frame>,
}

impl TreeWalker {
    /// Opens a walker over the tree rooted at `root`.
    ///
    /// # Errors
    /// Fails with a `NotFound` error when the root does not exist, and with
    /// `InvalidInput` when it exists but is not a directory.
    pub async fn open(root: impl Into<PathBuf>, order: WalkOrder) -> std::io::Result<Self> {
        let root = root.into();
        let metadata = tokio::fs::metadata(&root).await?;
        if !metadata.is_dir() {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("not a directory: {}", root.display()),
            ));
        }

        Ok(Self {
            order,
            pending: vec![root],
            frames: Vec::new(),
        })
    }

    /// Yields the next directory level, or `None` when the walk is done.
    pub async fn next_level(&mut self) -> std::io::Result<Option<DirLevel>> {
        match self.order {
            WalkOrder::TopDown => self.next_top_down().await,
            WalkOrder::BottomUp => self.next_bottom_up().await,
        }
    }

    async fn next_top_down(&mut self) -> std::io::Result<Option<DirLevel>> {
        let Some(dir) = self.pending.pop() else {
            return Ok(None);
        };
        let level = read_level(&dir).await?;
        // Reverse so the first subdir is popped (and yielded) first.
        for name in level.subdirs.iter().rev() {
            self.pending.push(dir.join(name));
        }
        Ok(Some(level))
    }

    async fn next_bottom_up(&mut self) -> std::io::Result<Option<DirLevel>> {
        // Seed the descent stack with the root on the first call.
        if let Some(root) = self.pending.pop() {
            let level = read_level(&root).await?;
            self.frames.push(Frame {
                level,
                next_subdir: 0,
            });
        }

        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(None);
            };

            if frame.next_subdir < frame.level.subdirs.len() {
                let child = frame.level.dir.join(&frame.level.subdirs[frame.next_subdir]);
                frame.next_subdir += 1;
                let level = read_level(&child).await?;
                self.frames.push(Frame {
                    level,
                    next_subdir: 0,
                });
            } else if let Some(frame) = self.frames.pop() {
                return Ok(Some(frame.level));
            }
        }
    }
}

/// Reads a single directory into a [`DirLevel`], sorting names for a
/// deterministic walk.
async fn read_level(dir: &Path) -> std::io::Result<DirLevel> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut subdirs = Vec::new();
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        let is_dir = if file_type.is_symlink() {
            // Follow the link; a dangling link resolves to neither kind.
            match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => Some(true),
                Ok(meta) if meta.is_file() => Some(false),
                _ => None,
            }
        } else if file_type.is_dir() {
            Some(true)
        } else if file_type.is_file() {
            Some(false)
        } else {
            None
        };

        match is_dir {
            Some(true) => subdirs.push(entry.file_name()),
            Some(false) => files.push(entry.file_name()),
            None => {}
        }
    }

    subdirs.sort();
    files.sort();

    Ok(DirLevel {
        dir: dir.to_path_buf(),
        subdirs,
        files,
    })
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    /// Builds: root/{top.txt, a/{one.txt, inner/{deep.txt}}, b/}
    async fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        tokio::fs::create_dir_all(root.join("a/inner")).await.unwrap();
        tokio::fs::create_dir(root.join("b")).await.unwrap();
        tokio::fs::write(root.join("top.txt"), b"t").await.unwrap();
        tokio::fs::write(root.join("a/one.txt"), b"1").await.unwrap();
        tokio::fs::write(root.join("a/inner/deep.txt"), b"d")
            .await
            .unwrap();
        dir
    }

    async fn collect(root: &Path, order: WalkOrder) -> Vec<DirLevel> {
        let mut walker = TreeWalker::open(root, order).await.unwrap();
        let mut levels = Vec::new();
        while let Some(level) = walker.next_level().await.unwrap() {
            levels.push(level);
        }
        levels
    }

    fn names(v: &[OsString]) -> Vec<&str> {
        v.iter().filter_map(|n| n.to_str()).collect()
    }

    #[tokio::test]
    async fn top_down_yields_parent_before_children() {
        let dir = sample_tree().await;
        let levels = collect(dir.path(), WalkOrder::TopDown).await;

        let dirs: Vec<&Path> = levels.iter().map(|l| l.dir.as_path()).collect();
        let pos = |p: &Path| dirs.iter().position(|d| *d == p).unwrap();

        assert_eq!(pos(dir.path()), 0);
        assert!(pos(&dir.path().join("a")) < pos(&dir.path().join("a/inner")));
        assert_eq!(levels.len(), 4);
    }

    #[tokio::test]
    async fn bottom_up_yields_children_before_parents() {
        let dir = sample_tree().await;
        let levels = collect(dir.path(), WalkOrder::BottomUp).await;

        let dirs: Vec<&Path> = levels.iter().map(|l| l.dir.as_path()).collect();
        let pos = |p: &Path| dirs.iter().position(|d| *d == p).unwrap();

        assert!(pos(&dir.path().join("a/inner")) < pos(&dir.path().join("a")));
        assert!(pos(&dir.path().join("a")) < pos(dir.path()));
        assert!(pos(&dir.path().join("b")) < pos(dir.path()));
        assert_eq!(levels.len(), 4);
    }

    #[tokio::test]
    async fn levels_carry_names_not_paths() {
        let dir = sample_tree().await;
        let levels = collect(dir.path(), WalkOrder::TopDown).await;

        let root_level = &levels[0];
        assert_eq!(names(&root_level.subdirs), vec!["a", "b"]);
        assert_eq!(names(&root_level.files), vec!["top.txt"]);
    }

    #[tokio::test]
    async fn both_orders_visit_the_same_directories() {
        let dir = sample_tree().await;
        let mut top: Vec<PathBuf> = collect(dir.path(), WalkOrder::TopDown)
            .await
            .into_iter()
            .map(|l| l.dir)
            .collect();
        let mut bottom: Vec<PathBuf> = collect(dir.path(), WalkOrder::BottomUp)
            .await
            .into_iter()
            .map(|l| l.dir)
            .collect();
        top.sort();
        bottom.sort();
        assert_eq!(top, bottom);
    }

    #[tokio::test]
    async fn empty_directory_is_a_single_empty_level() {
        let dir = TempDir::new().unwrap();
        let levels = collect(dir.path(), WalkOrder::BottomUp).await;
        assert_eq!(levels.len(), 1);
        assert!(levels[0].subdirs.is_empty());
        assert!(levels[0].files.is_empty());
    }

    #[tokio::test]
    async fn missing_root_fails_with_not_found() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let err = TreeWalker::open(&missing, WalkOrder::TopDown)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn file_root_fails_with_invalid_input() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        tokio::fs::write(&file, b"x").await.unwrap();

        let err = TreeWalker::open(&file, WalkOrder::TopDown)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
