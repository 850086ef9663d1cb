//! Safe copy/move of files and folder trees.
//!
//! [`transfer`] probes both endpoints, rejects symlinks, and then either moves a
//! single file or walks a folder and handles its files one at a time. Whenever a
//! destination file already exists the configured [`ConflictStrategy`] decides what
//! happens to it. Nothing here is transactional: a failure halfway through a folder
//! leaves the files already handled at the destination and the rest at the source.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::conflict::{self, ConflictStrategy, Resolution};
use crate::entry::{EntryKind, PathEntry};
use crate::errors::{FsError, Op, Result};
use crate::fs_ops::{self, CopyOptions};
use crate::walker::{self, TraversalOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Move instead of copy; a fully transferred source folder is removed afterwards.
    pub move_source: bool,
    pub conflict: ConflictStrategy,
    /// Make every probe and naming decision, but do not touch the filesystem.
    pub dry_run: bool,
    /// Carry access/modification times over to copied files.
    pub preserve_timestamps: bool,
    /// Record per-file failures in the report instead of aborting the folder.
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The conflict strategy chose to leave the existing destination alone.
    Conflict,
    /// Symlinks and special files inside a folder tree are never transferred.
    Unsupported,
}

#[derive(Debug)]
pub enum FileOutcome {
    Transferred {
        source: PathBuf,
        destination: PathBuf,
        /// Where the previously existing destination was moved aside to.
        backup: Option<PathBuf>,
    },
    Skipped {
        source: PathBuf,
        destination: PathBuf,
        reason: SkipReason,
    },
    Failed {
        source: PathBuf,
        error: FsError,
    },
}

#[derive(Debug, Default)]
pub struct TransferReport {
    pub outcomes: Vec<FileOutcome>,
    /// True when a move removed the source (file or whole folder).
    pub source_removed: bool,
    pub dry_run: bool,
}

impl TransferReport {
    pub fn transferred(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Transferred {
                source,
                destination,
                ..
            } => Some((source.as_path(), destination.as_path())),
            _ => None,
        })
    }

    pub fn backups(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Transferred {
                backup: Some(b), ..
            } => Some(b.as_path()),
            _ => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Skipped { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FsError> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Failed { error, .. } => Some(error),
            _ => None,
        })
    }

    /// Every file was transferred: nothing skipped, nothing failed.
    pub fn is_complete(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, FileOutcome::Transferred { .. }))
    }
}

/// Copy or move `src` to `dest`.
///
/// Both entries are re-probed first. `src` must be a file or a folder and `dest`
/// must not be a symlink; a rejected call performs no I/O beyond those probes.
///
/// - File source: if `dest` is a folder the file lands in `dest/<name>`, otherwise
///   at `dest` itself.
/// - Folder source: `dest` is the folder that receives the tree; it is created when
///   missing.
pub fn transfer(
    src: &mut PathEntry,
    dest: &mut PathEntry,
    opts: &TransferOptions,
) -> Result<TransferReport> {
    src.resolve(true)?;
    let reason = match src.kind() {
        EntryKind::File | EntryKind::Folder => None,
        EntryKind::Symlink => Some("source is a symbolic link"),
        EntryKind::Missing => Some("source does not exist"),
        EntryKind::Other | EntryKind::Unknown => Some("source is neither a file nor a folder"),
    };
    if let Some(reason) = reason {
        return Err(FsError::InvalidSource {
            path: src.path().to_path_buf(),
            op: Op::Transfer,
            reason,
        });
    }

    dest.resolve(true)?;
    if dest.is_symlink() {
        return Err(FsError::InvalidDestination {
            path: dest.path().to_path_buf(),
            op: Op::Transfer,
            reason: "destination is a symbolic link",
        });
    }

    debug!(
        src = %src.path().display(),
        dest = %dest.path().display(),
        src_kind = ?src.kind(),
        dest_kind = ?dest.kind(),
        strategy = %opts.conflict,
        move_source = opts.move_source,
        dry_run = opts.dry_run,
        "dispatch transfer"
    );

    if src.is_file() {
        transfer_single(src, dest, opts)
    } else {
        transfer_folder(src, dest, opts)
    }
}

fn transfer_single(
    src: &mut PathEntry,
    dest: &mut PathEntry,
    opts: &TransferOptions,
) -> Result<TransferReport> {
    let mut target = if dest.is_folder() {
        let mut t = PathEntry::child(dest.path(), src.name());
        t.resolve(false)?;
        t
    } else {
        dest.clone()
    };

    let outcome = transfer_file(src.path(), &mut target, opts)?;
    let moved = matches!(outcome, FileOutcome::Transferred { .. }) && opts.move_source;
    if !opts.dry_run {
        dest.invalidate();
        if moved {
            src.invalidate();
        }
    }
    Ok(TransferReport {
        outcomes: vec![outcome],
        source_removed: moved && !opts.dry_run,
        dry_run: opts.dry_run,
    })
}

/// Transfer one file onto the already-probed `target` path.
fn transfer_file(src: &Path, target: &mut PathEntry, opts: &TransferOptions) -> Result<FileOutcome> {
    let mut overwrite = false;
    let mut backup = None;

    match target.kind() {
        EntryKind::Missing => {}
        EntryKind::File => {
            if same_file(src, target.path())? {
                return Err(FsError::InvalidDestination {
                    path: target.path().to_path_buf(),
                    op: Op::Transfer,
                    reason: "source and destination are the same file",
                });
            }
            match conflict::compute_destination(&opts.conflict, target.path())? {
                Resolution::Skip => {
                    info!(src = %src.display(), dest = %target.path().display(), "destination exists; skipped");
                    return Ok(FileOutcome::Skipped {
                        source: src.to_path_buf(),
                        destination: target.path().to_path_buf(),
                        reason: SkipReason::Conflict,
                    });
                }
                Resolution::Overwrite => overwrite = true,
                Resolution::Alternate(alt) => {
                    if opts.conflict.error_if_exists() && fs_ops::exists(&alt)? {
                        return Err(FsError::AlreadyExists {
                            path: alt,
                            op: Op::Transfer,
                        });
                    }
                    if !opts.dry_run {
                        fs_ops::move_file(target.path(), &alt, true)?;
                    }
                    info!(existing = %target.path().display(), backup = %alt.display(), dry_run = opts.dry_run, "moved existing destination aside");
                    backup = Some(alt);
                }
            }
        }
        EntryKind::Folder => {
            return Err(FsError::InvalidDestination {
                path: target.path().to_path_buf(),
                op: Op::Transfer,
                reason: "destination path is an existing folder",
            });
        }
        EntryKind::Symlink => {
            return Err(FsError::InvalidDestination {
                path: target.path().to_path_buf(),
                op: Op::Transfer,
                reason: "destination is a symbolic link",
            });
        }
        EntryKind::Other | EntryKind::Unknown => {
            return Err(FsError::InvalidDestination {
                path: target.path().to_path_buf(),
                op: Op::Transfer,
                reason: "destination is not a regular file",
            });
        }
    }

    if opts.dry_run {
        info!(src = %src.display(), dest = %target.path().display(), move_source = opts.move_source, "dry-run: would transfer file");
    } else {
        if let Some(parent) = target.path().parent() {
            fs_ops::create_dir_all(parent)?;
        }
        if opts.move_source {
            fs_ops::move_file(src, target.path(), overwrite)?;
        } else {
            fs_ops::copy_file(
                src,
                target.path(),
                CopyOptions {
                    overwrite,
                    preserve_timestamps: opts.preserve_timestamps,
                },
            )?;
        }
        target.invalidate();
        info!(src = %src.display(), dest = %target.path().display(), move_source = opts.move_source, overwrite, "transferred file");
    }

    Ok(FileOutcome::Transferred {
        source: src.to_path_buf(),
        destination: target.path().to_path_buf(),
        backup,
    })
}

fn transfer_folder(
    src: &mut PathEntry,
    dest: &mut PathEntry,
    opts: &TransferOptions,
) -> Result<TransferReport> {
    if !matches!(dest.kind(), EntryKind::Missing | EntryKind::Folder) {
        return Err(FsError::InvalidDestination {
            path: dest.path().to_path_buf(),
            op: Op::Transfer,
            reason: "destination exists and is not a folder",
        });
    }
    let src_real = dunce::canonicalize(src.path()).map_err(FsError::with(Op::Resolve, src.path()))?;
    if is_within(dest.path(), &src_real) {
        return Err(FsError::InvalidDestination {
            path: dest.path().to_path_buf(),
            op: Op::Transfer,
            reason: "destination lies inside the source folder",
        });
    }

    let mut report = TransferReport {
        dry_run: opts.dry_run,
        ..TransferReport::default()
    };

    // Same filesystem and nothing in the way: one rename moves the whole tree.
    if opts.move_source && dest.is_missing() && !opts.dry_run {
        if let Some(parent) = dest.path().parent() {
            fs_ops::create_dir_all(parent)?;
        }
        match fs_ops::move_dir(src.path(), dest.path()) {
            Ok(()) => {
                info!(src = %src.path().display(), dest = %dest.path().display(), "renamed directory atomically");
                report.outcomes = renamed_tree_outcomes(src.path(), dest.path())?;
                report.source_removed = true;
                src.invalidate();
                dest.invalidate();
                return Ok(report);
            }
            Err(e) => debug!(error = %e, "directory rename not possible; copying tree"),
        }
    }

    if !opts.dry_run {
        fs_ops::create_dir_all(dest.path())?;
    }

    walker::get_children(src, &TraversalOptions::recursive())?;
    let mut children = src.take_children().unwrap_or_default();

    children.folders.sort_by(|a, b| a.path().cmp(b.path()));
    for folder in &children.folders {
        let target = dest.path().join(relative_to(folder.path(), src.path())?);
        if !opts.dry_run {
            fs_ops::create_dir_all(&target)?;
        }
    }

    for odd in children.symlinks.iter().chain(&children.other) {
        let target = dest.path().join(relative_to(odd.path(), src.path())?);
        warn!(path = %odd.path().display(), kind = ?odd.kind(), "not a regular file; skipped");
        report.outcomes.push(FileOutcome::Skipped {
            source: odd.path().to_path_buf(),
            destination: target,
            reason: SkipReason::Unsupported,
        });
    }

    let mut files = children.files;
    files.sort_by(|a, b| a.path().cmp(b.path()));
    for file in &files {
        let mut target = PathEntry::child(dest.path(), relative_to(file.path(), src.path())?);
        let result = target
            .resolve(false)
            .and_then(|_| transfer_file(file.path(), &mut target, opts));
        match result {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(e) if opts.continue_on_error => {
                warn!(src = %file.path().display(), code = e.code(), error = %e, "file transfer failed; continuing");
                report.outcomes.push(FileOutcome::Failed {
                    source: file.path().to_path_buf(),
                    error: e,
                });
            }
            Err(e) => {
                error!(src = %file.path().display(), code = e.code(), error = %e, "file transfer failed; aborting folder transfer");
                return Err(e);
            }
        }
    }

    if opts.move_source && !opts.dry_run {
        if report.is_complete() {
            fs_ops::remove_dir(src.path(), true)?;
            report.source_removed = true;
            src.invalidate();
            info!(src = %src.path().display(), dest = %dest.path().display(), "moved folder contents and removed source");
        } else {
            warn!(
                src = %src.path().display(),
                skipped = report.skipped_count(),
                failed = report.failures().count(),
                "not every file was transferred; keeping source folder"
            );
        }
    }
    if !opts.dry_run {
        dest.invalidate();
    }
    Ok(report)
}

/// Outcomes for a tree that was renamed in one step: every file now below `dest`.
fn renamed_tree_outcomes(src: &Path, dest: &Path) -> Result<Vec<FileOutcome>> {
    let mut root = PathEntry::new(dest, dest);
    root.resolve(false)?;
    walker::get_children(&mut root, &TraversalOptions::recursive())?;
    let mut files = root.take_children().unwrap_or_default().files;
    files.sort_by(|a, b| a.path().cmp(b.path()));
    files
        .iter()
        .map(|f| -> Result<FileOutcome> {
            Ok(FileOutcome::Transferred {
                source: src.join(relative_to(f.path(), dest)?),
                destination: f.path().to_path_buf(),
                backup: None,
            })
        })
        .collect()
}

fn relative_to<'a>(path: &'a Path, base: &Path) -> Result<&'a Path> {
    path.strip_prefix(base).map_err(|_| FsError::InvalidOperation {
        path: path.to_path_buf(),
        op: Op::Transfer,
        reason: "path escaped the folder being transferred",
    })
}

fn same_file(a: &Path, b: &Path) -> Result<bool> {
    let a = dunce::canonicalize(a).map_err(FsError::with(Op::Resolve, a))?;
    let b = dunce::canonicalize(b).map_err(FsError::with(Op::Resolve, b))?;
    Ok(a == b)
}

/// Whether `inner` is, or would be once created, located inside `outer_real`.
/// The deepest existing ancestor of `inner` is canonicalized so symlinked parents
/// cannot hide the nesting.
fn is_within(inner: &Path, outer_real: &Path) -> bool {
    let mut existing = inner;
    let mut rest: Vec<&OsStr> = Vec::new();
    loop {
        if let Ok(mut real) = dunce::canonicalize(existing) {
            for seg in rest.iter().rev() {
                real.push(seg);
            }
            return real.starts_with(outer_real);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return inner.starts_with(outer_real),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::fs;

    fn entry(p: &Path) -> PathEntry {
        PathEntry::new(p, Path::new("/"))
    }

    #[test]
    fn copy_into_existing_folder_uses_source_name() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("a.txt").write_str("hello").unwrap();
        td.child("out").create_dir_all().unwrap();

        let mut src = entry(&td.path().join("a.txt"));
        let mut dest = entry(&td.path().join("out"));
        let report = transfer(&mut src, &mut dest, &TransferOptions::default()).unwrap();

        assert!(report.is_complete());
        assert!(!report.source_removed);
        assert_eq!(fs::read_to_string(td.path().join("out/a.txt")).unwrap(), "hello");
        assert!(td.path().join("a.txt").exists());
    }

    #[test]
    fn missing_parents_are_created() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("a.txt").write_str("x").unwrap();
        let mut src = entry(&td.path().join("a.txt"));
        let mut dest = entry(&td.path().join("deep/er/b.txt"));
        transfer(&mut src, &mut dest, &TransferOptions::default()).unwrap();
        assert!(td.path().join("deep/er/b.txt").is_file());
    }

    #[test]
    fn same_file_is_rejected() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("a.txt").write_str("x").unwrap();
        let mut src = entry(&td.path().join("a.txt"));
        let mut dest = entry(&td.path().join("a.txt"));
        let opts = TransferOptions {
            conflict: ConflictStrategy::Overwrite,
            ..Default::default()
        };
        let err = transfer(&mut src, &mut dest, &opts).unwrap_err();
        assert!(matches!(err, FsError::InvalidDestination { .. }));
        assert_eq!(fs::read_to_string(td.path().join("a.txt")).unwrap(), "x");
    }

    #[test]
    fn folder_into_itself_is_rejected() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("tree/f.txt").write_str("x").unwrap();
        let mut src = entry(&td.path().join("tree"));
        let mut dest = entry(&td.path().join("tree/nested/copy"));
        let err = transfer(&mut src, &mut dest, &TransferOptions::default()).unwrap_err();
        assert!(matches!(err, FsError::InvalidDestination { .. }));
        assert!(!td.path().join("tree/nested").exists());
    }

    #[test]
    fn missing_source_is_invalid() {
        let td = assert_fs::TempDir::new().unwrap();
        let mut src = entry(&td.path().join("nope"));
        let mut dest = entry(&td.path().join("out"));
        let err = transfer(&mut src, &mut dest, &TransferOptions::default()).unwrap_err();
        assert!(matches!(err, FsError::InvalidSource { op: Op::Transfer, .. }));
    }

    #[test]
    fn is_within_handles_missing_tail() {
        let td = assert_fs::TempDir::new().unwrap();
        td.child("src").create_dir_all().unwrap();
        let real = dunce::canonicalize(td.path().join("src")).unwrap();
        assert!(is_within(&td.path().join("src/a/b"), &real));
        assert!(!is_within(&td.path().join("srcx/a"), &real));
    }
}
