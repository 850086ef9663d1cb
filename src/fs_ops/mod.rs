//! Low-level filesystem operations.
//!
//! Thin, stateless wrappers over platform calls consumed by the entry, walker and
//! transfer layers. Every failure is mapped to [`FsError`] with the attempted
//! operation and the offending path; "does not exist" while probing is reported as
//! `None`, never as an error.

mod atomic;
mod copy;
mod io_copy;
mod metadata;
mod util;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tracing::{trace, warn};

use crate::entry::EntryKind;
use crate::errors::{FsError, Op, Result};

pub use copy::{copy_file, CopyOptions};

/// Result of a successful `lstat`-style probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
}

/// One row of a directory listing: the name and the cheap kind hint the OS gave us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub name: OsString,
    pub hint: EntryKind,
}

pub(crate) fn kind_of(ft: fs::FileType) -> EntryKind {
    if ft.is_symlink() {
        EntryKind::Symlink
    } else if ft.is_dir() {
        EntryKind::Folder
    } else if ft.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

fn is_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Probe `path` without following a final symlink. `Ok(None)` means it does not exist.
pub fn stat_path(path: &Path) -> Result<Option<Stat>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            let stat = Stat {
                kind: kind_of(meta.file_type()),
                size: meta.len(),
                modified: meta.modified().ok(),
                created: meta.created().ok(),
            };
            trace!(path = %path.display(), kind = ?stat.kind, size = stat.size, "stat");
            Ok(Some(stat))
        }
        Err(e) if is_absent(&e) => {
            trace!(path = %path.display(), "stat: missing");
            Ok(None)
        }
        Err(e) => Err(FsError::io(Op::Resolve, path, e)),
    }
}

/// Cheap existence check used by conflict probing.
pub fn exists(path: &Path) -> Result<bool> {
    Ok(stat_path(path)?.is_some())
}

/// List the immediate entries of a directory together with their kind hints.
pub fn list_dir(path: &Path) -> Result<Vec<Listing>> {
    let rd = fs::read_dir(path).map_err(FsError::with(Op::ListDir, path))?;
    let mut out = Vec::new();
    for ent in rd {
        let ent = ent.map_err(FsError::with(Op::ListDir, path))?;
        // Some filesystems do not report d_type; fall back to an lstat of the child.
        let hint = match ent.file_type() {
            Ok(ft) => kind_of(ft),
            Err(_) => stat_path(&ent.path())?
                .map(|s| s.kind)
                .unwrap_or(EntryKind::Missing),
        };
        out.push(Listing {
            name: ent.file_name(),
            hint,
        });
    }
    Ok(out)
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(FsError::with(Op::CreateDir, path))
}

pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(FsError::with(Op::Remove, path))
}

pub fn remove_dir(path: &Path, recursive: bool) -> Result<()> {
    if recursive {
        fs::remove_dir_all(path).map_err(FsError::with(Op::Remove, path))
    } else {
        fs::remove_dir(path).map_err(FsError::with(Op::Remove, path))
    }
}

/// Move a single file. Tries an atomic rename and falls back to copy + remove when the
/// rename crosses filesystems. Without `overwrite` an existing `dest` is an error.
pub fn move_file(src: &Path, dest: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && exists(dest)? {
        return Err(FsError::AlreadyExists {
            path: dest.to_path_buf(),
            op: Op::Move,
        });
    }

    match atomic::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if util::is_cross_device(&e) => {
            warn!(src = %src.display(), dest = %dest.display(), "cross-device rename; falling back to copy+remove");
            copy_file(
                src,
                dest,
                CopyOptions {
                    overwrite,
                    preserve_timestamps: true,
                },
            )?;
            remove_file(src)
        }
        Err(e) => Err(FsError::io(Op::Move, dest, e)),
    }
}

/// Rename a whole directory. Never falls back: callers decide how to copy a tree
/// that cannot be renamed in one step.
pub fn move_dir(src: &Path, dest: &Path) -> Result<()> {
    if exists(dest)? {
        return Err(FsError::AlreadyExists {
            path: dest.to_path_buf(),
            op: Op::Move,
        });
    }
    atomic::rename(src, dest).map_err(FsError::with(Op::Move, dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn stat_reports_missing_as_none() {
        let dir = assert_fs::TempDir::new().unwrap();
        assert_eq!(stat_path(&dir.path().join("nope")).unwrap(), None);
        // A path "through" a regular file is also just absent.
        let f = dir.child("file.txt");
        f.write_str("x").unwrap();
        assert_eq!(stat_path(&f.path().join("child")).unwrap(), None);
    }

    #[test]
    fn list_dir_hints_kinds() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("a.txt").write_str("a").unwrap();
        dir.child("sub").create_dir_all().unwrap();

        let mut rows = list_dir(dir.path()).unwrap();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hint, EntryKind::File);
        assert_eq!(rows[1].hint, EntryKind::Folder);
    }

    #[test]
    fn move_file_refuses_existing_without_overwrite() {
        let dir = assert_fs::TempDir::new().unwrap();
        let a = dir.child("a");
        let b = dir.child("b");
        a.write_str("a").unwrap();
        b.write_str("b").unwrap();

        let err = move_file(a.path(), b.path(), false).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists { op: Op::Move, .. }));
        move_file(a.path(), b.path(), true).unwrap();
        assert!(!a.path().exists());
        assert_eq!(fs::read_to_string(b.path()).unwrap(), "a");
    }

    #[test]
    fn remove_dir_recursive() {
        let dir = assert_fs::TempDir::new().unwrap();
        let d = dir.child("tree");
        d.child("x/y").create_dir_all().unwrap();
        d.child("x/y/z.txt").write_str("z").unwrap();
        assert!(remove_dir(d.path(), false).is_err());
        remove_dir(d.path(), true).unwrap();
        assert!(!d.path().exists());
    }
}
