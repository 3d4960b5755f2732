//! Target enumeration into an ordered file list
//!
//! The order of the returned entries defines how the logical piece stream is
//! concatenated, so it is always lexicographic by path components.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::TorrentError;
use super::metainfo::{FileEntry, FileLayout};

/// Ordered files of a target plus the information needed to read them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedFiles {
    root: PathBuf,
    layout: FileLayout,
    entries: Vec<FileEntry>,
}

impl EnumeratedFiles {
    /// `SingleFile` when the target is a file, `MultiFile` for directories.
    pub fn layout(&self) -> FileLayout {
        self.layout
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries
    }

    pub fn total_length(&self) -> u64 {
        self.entries.iter().map(|entry| entry.length).sum()
    }

    /// On-disk location of `entry`.
    pub fn source_path(&self, entry: &FileEntry) -> PathBuf {
        match self.layout {
            FileLayout::SingleFile => self.root.clone(),
            FileLayout::MultiFile => entry
                .path
                .iter()
                .fold(self.root.clone(), |path, component| path.join(component)),
        }
    }

    /// `(path, length)` pairs in stream order, ready for a chained reader.
    pub fn sources(&self) -> Vec<(PathBuf, u64)> {
        self.entries
            .iter()
            .map(|entry| (self.source_path(entry), entry.length))
            .collect()
    }

    /// Base name of the target, used when no torrent name is given.
    ///
    /// # Errors
    /// - `TorrentError::InvalidPath` - Target has no UTF-8 base name (e.g. `/`)
    pub fn default_name(&self) -> Result<String, TorrentError> {
        target_name(&self.root)
    }
}

/// Lists the files of `target` in stream order.
///
/// A regular file yields one entry named after its base name. A directory is
/// walked recursively; every regular file becomes an entry with its path
/// relative to the directory. Any listing or metadata failure aborts the
/// whole enumeration.
///
/// # Errors
/// - `TorrentError::TargetNotFound` - Target path does not exist
/// - `TorrentError::FileRead` - Directory listing or metadata lookup failed
/// - `TorrentError::InvalidPath` - Non-UTF-8 names or unsupported target type
pub async fn enumerate_files(target: &Path) -> Result<EnumeratedFiles, TorrentError> {
    let metadata = tokio::fs::metadata(target).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            TorrentError::TargetNotFound {
                path: target.to_path_buf(),
            }
        } else {
            read_error(target, e)
        }
    })?;

    if metadata.is_file() {
        let entry = FileEntry::new(vec![target_name(target)?], metadata.len());
        debug!("Single file target {} ({} bytes)", target.display(), entry.length);
        return Ok(EnumeratedFiles {
            root: target.to_path_buf(),
            layout: FileLayout::SingleFile,
            entries: vec![entry],
        });
    }

    if !metadata.is_dir() {
        return Err(TorrentError::InvalidPath {
            reason: format!("{} is neither a file nor a directory", target.display()),
        });
    }

    let entries = collect_files_recursively(target).await?;
    debug!(
        "Enumerated {} files under {}",
        entries.len(),
        target.display()
    );

    Ok(EnumeratedFiles {
        root: target.to_path_buf(),
        layout: FileLayout::MultiFile,
        entries,
    })
}

/// Collects all files in directory using iterative depth-first traversal
async fn collect_files_recursively(directory_path: &Path) -> Result<Vec<FileEntry>, TorrentError> {
    let mut files = Vec::new();
    let mut dirs_to_process = vec![directory_path.to_path_buf()];

    while let Some(current_dir) = dirs_to_process.pop() {
        let mut entries = tokio::fs::read_dir(&current_dir)
            .await
            .map_err(|e| read_error(&current_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| read_error(&current_dir, e))?
        {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| read_error(&path, e))?;

            if file_type.is_dir() {
                dirs_to_process.push(path);
                continue;
            }

            // Symlinks count as the file they point to; linked directories
            // are not descended into so cycles cannot occur.
            let metadata = if file_type.is_symlink() {
                tokio::fs::metadata(&path)
                    .await
                    .map_err(|e| read_error(&path, e))?
            } else {
                entry.metadata().await.map_err(|e| read_error(&path, e))?
            };

            if !metadata.is_file() {
                debug!("Skipping {} (not a regular file)", path.display());
                continue;
            }

            files.push(FileEntry::new(
                relative_components(directory_path, &path)?,
                metadata.len(),
            ));
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn relative_components(root: &Path, path: &Path) -> Result<Vec<String>, TorrentError> {
    let relative_path = path
        .strip_prefix(root)
        .map_err(|_| TorrentError::InvalidPath {
            reason: format!("{} is outside {}", path.display(), root.display()),
        })?;

    relative_path
        .components()
        .map(|component| {
            component
                .as_os_str()
                .to_str()
                .map(str::to_string)
                .ok_or_else(|| TorrentError::InvalidPath {
                    reason: format!("{} is not valid UTF-8", path.display()),
                })
        })
        .collect()
}

/// UTF-8 base name of `path`, the default torrent name for a target.
///
/// # Errors
/// - `TorrentError::InvalidPath` - Path has no UTF-8 final component
pub fn target_name(path: &Path) -> Result<String, TorrentError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| TorrentError::InvalidPath {
            reason: format!("{} has no usable base name", path.display()),
        })
}

fn read_error(path: &Path, source: io::Error) -> TorrentError {
    TorrentError::FileRead {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_single_file_uses_base_name() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("movie.mkv");
        fs::write(&file_path, vec![7u8; 10]).unwrap();

        let files = enumerate_files(&file_path).await.unwrap();

        assert_eq!(files.layout(), FileLayout::SingleFile);
        assert_eq!(
            files.entries(),
            &[FileEntry::new(vec!["movie.mkv".to_string()], 10)]
        );
        assert_eq!(files.source_path(&files.entries()[0]), file_path);
        assert_eq!(files.default_name().unwrap(), "movie.mkv");
    }

    #[tokio::test]
    async fn test_directory_sorted_and_relative() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("z.txt"), b"zz").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("b/nested/c.txt"), b"ccc").unwrap();
        fs::write(dir.path().join("b/.hidden"), b"").unwrap();

        let files = enumerate_files(dir.path()).await.unwrap();
        let paths: Vec<String> = files.entries().iter().map(FileEntry::display_path).collect();

        assert_eq!(files.layout(), FileLayout::MultiFile);
        assert_eq!(paths, vec!["a.txt", "b/.hidden", "b/nested/c.txt", "z.txt"]);
        assert_eq!(files.total_length(), 6);
        assert_eq!(
            files.source_path(&files.entries()[2]),
            dir.path().join("b").join("nested").join("c.txt")
        );
    }

    #[tokio::test]
    async fn test_empty_directory_yields_no_entries() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("empty_child")).unwrap();

        let files = enumerate_files(dir.path()).await.unwrap();

        assert!(files.entries().is_empty());
        assert_eq!(files.total_length(), 0);
    }

    #[tokio::test]
    async fn test_missing_target() {
        let dir = TempDir::new().unwrap();
        let result = enumerate_files(&dir.path().join("missing")).await;
        assert!(matches!(result, Err(TorrentError::TargetNotFound { .. })));
    }

    #[tokio::test]
    async fn test_enumeration_is_stable() {
        let dir = TempDir::new().unwrap();
        for name in ["q", "c", "x", "a", "m"] {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        let first = enumerate_files(dir.path()).await.unwrap();
        let second = enumerate_files(dir.path()).await.unwrap();
        assert_eq!(first, second);
    }
}
