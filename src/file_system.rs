/*
 * This module provides the filesystem access helpers shared by the selection
 * providers: one-level directory listing with symlink resolution and a
 * stable ordering, plus the stat predicates used when filtering checked
 * paths. It defines errors specific to these operations; callers in the
 * propagation paths treat any error as "subtree is empty" after logging,
 * never as fatal.
 */
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum FileSystemError {
    Io(io::Error),
    InvalidPath(PathBuf),
}

impl From<io::Error> for FileSystemError {
    fn from(err: io::Error) -> Self {
        FileSystemError::Io(err)
    }
}

impl std::fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemError::Io(e) => write!(f, "I/O error: {e}"),
            FileSystemError::InvalidPath(p) => write!(f, "Invalid path: {p:?}"),
        }
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSystemError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileSystemError>;

/*
 * One directly contained entry of a listed directory. `is_dir` reflects the
 * symlink target for symlinked entries, so a symlink to a directory lists
 * and recurses like a directory. Broken symlinks never appear; they are
 * skipped during listing.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/*
 * Lists the immediate children of `dir_path`, resolving symlinks to decide
 * directory-ness and dropping broken links. Entries are sorted directories
 * first, then by name, for a stable presentation order.
 */
pub fn list_entries(dir_path: &Path) -> Result<Vec<DirEntryInfo>> {
    if !dir_path.is_dir() {
        return Err(FileSystemError::InvalidPath(dir_path.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry_result in fs::read_dir(dir_path)? {
        let entry = entry_result?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let file_type = entry.file_type()?;
        let is_symlink = file_type.is_symlink();
        let is_dir = if is_symlink {
            // Resolve the link target; a failing stat means the link is broken.
            match fs::metadata(&path) {
                Ok(meta) => meta.is_dir(),
                Err(e) => {
                    log::debug!("FileSystem: Skipping broken symlink {path:?}: {e}");
                    continue;
                }
            }
        } else {
            file_type.is_dir()
        };

        entries.push(DirEntryInfo {
            path,
            name,
            is_dir,
            is_symlink,
        });
    }

    entries.sort_by(|a, b| {
        if a.is_dir && !b.is_dir {
            std::cmp::Ordering::Less
        } else if !a.is_dir && b.is_dir {
            std::cmp::Ordering::Greater
        } else {
            a.name.cmp(&b.name)
        }
    });

    Ok(entries)
}

/*
 * True when `path` currently exists on disk as a regular file or as a
 * symbolic link whose target resolves. This is the filter applied to every
 * entry returned from `get_checked_files`: directories and stale paths never
 * pass it.
 */
pub fn exists_as_file_or_resolved_link(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            if meta.file_type().is_symlink() {
                // Follow the link; broken links do not count as present.
                fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
            } else {
                meta.is_file()
            }
        }
        Err(_) => false,
    }
}
