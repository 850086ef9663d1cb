//! Typed error definitions for fs_entry.
//! Every variant carries the offending path and the operation that was attempted,
//! so a half-finished folder transfer can be reconciled from the error alone.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Operation attempted when an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Resolve,
    ListDir,
    Copy,
    Move,
    Remove,
    CreateDir,
    ResolveConflict,
    Transfer,
    Hash,
    Diff,
    Traverse,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Resolve => "resolve",
            Op::ListDir => "list directory",
            Op::Copy => "copy",
            Op::Move => "move",
            Op::Remove => "remove",
            Op::CreateDir => "create directory",
            Op::ResolveConflict => "resolve conflict",
            Op::Transfer => "transfer",
            Op::Hash => "hash",
            Op::Diff => "diff",
            Op::Traverse => "traverse",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{op} '{}': not found", path.display())]
    NotFound { path: PathBuf, op: Op },

    #[error("{op} '{}': invalid source ({reason})", path.display())]
    InvalidSource {
        path: PathBuf,
        op: Op,
        reason: &'static str,
    },

    #[error("{op} '{}': invalid destination ({reason})", path.display())]
    InvalidDestination {
        path: PathBuf,
        op: Op,
        reason: &'static str,
    },

    #[error("{op} '{}': access denied", path.display())]
    AccessDenied {
        path: PathBuf,
        op: Op,
        #[source]
        source: io::Error,
    },

    #[error("{op} '{}': already exists", path.display())]
    AlreadyExists { path: PathBuf, op: Op },

    #[error("{op} '{}': invalid operation ({reason})", path.display())]
    InvalidOperation {
        path: PathBuf,
        op: Op,
        reason: &'static str,
    },

    #[error("invalid name pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{op} '{}': {source}{hint}", path.display())]
    Io {
        path: PathBuf,
        op: Op,
        hint: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// Classify an I/O failure for `op` on `path`.
    pub fn io(op: Op, path: &Path, e: io::Error) -> Self {
        let path = path.to_path_buf();
        match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path, op },
            io::ErrorKind::PermissionDenied => FsError::AccessDenied { path, op, source: e },
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists { path, op },
            _ => FsError::Io {
                path,
                op,
                hint: io_hint(&e),
                source: e,
            },
        }
    }

    /// Adapter for `.map_err(...)` in `io::Result` call chains.
    pub fn with<'a>(op: Op, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |e| FsError::io(op, path, e)
    }

    /// The path this error occurred at, if applicable.
    pub fn path(&self) -> Option<&Path> {
        match self {
            FsError::NotFound { path, .. }
            | FsError::InvalidSource { path, .. }
            | FsError::InvalidDestination { path, .. }
            | FsError::AccessDenied { path, .. }
            | FsError::AlreadyExists { path, .. }
            | FsError::InvalidOperation { path, .. }
            | FsError::Io { path, .. } => Some(path),
            FsError::InvalidPattern { .. } => None,
        }
    }

    pub fn op(&self) -> Option<Op> {
        match self {
            FsError::NotFound { op, .. }
            | FsError::InvalidSource { op, .. }
            | FsError::InvalidDestination { op, .. }
            | FsError::AccessDenied { op, .. }
            | FsError::AlreadyExists { op, .. }
            | FsError::InvalidOperation { op, .. }
            | FsError::Io { op, .. } => Some(*op),
            FsError::InvalidPattern { .. } => None,
        }
    }

    /// Stable numeric code, usable as a structured log field.
    pub fn code(&self) -> u16 {
        match self {
            FsError::NotFound { .. } => 2,
            FsError::InvalidSource { .. } => 10,
            FsError::InvalidDestination { .. } => 11,
            FsError::AccessDenied { .. } => 13,
            FsError::AlreadyExists { .. } => 17,
            FsError::InvalidOperation { .. } => 22,
            FsError::InvalidPattern { .. } => 23,
            FsError::Io { .. } => 5,
        }
    }
}

/// Short, actionable hint for OS error codes that are not worth their own variant.
fn io_hint(e: &io::Error) -> &'static str {
    let Some(code) = e.raw_os_error() else {
        return match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                " (busy; retry after the current writer finishes)"
            }
            _ => "",
        };
    };
    #[cfg(unix)]
    {
        match code {
            libc::EXDEV => " (cross-filesystem; rename not possible)",
            libc::EBUSY => " (resource busy)",
            libc::ENOSPC => " (no space left on device)",
            libc::EROFS => " (read-only filesystem)",
            libc::ELOOP => " (too many symbolic link levels)",
            libc::ENAMETOOLONG => " (file name or path too long)",
            libc::EMFILE | libc::ENFILE => " (too many open files)",
            libc::ENOTEMPTY => " (directory not empty)",
            _ => "",
        }
    }
    #[cfg(windows)]
    {
        match code {
            17 => " (cross-filesystem; rename not possible)",
            32 => " (sharing violation; file is in use)",
            112 => " (no space left on device)",
            206 => " (file name or path too long)",
            _ => "",
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let p = Path::new("/tmp/x");
        let e = FsError::io(Op::Copy, p, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(e, FsError::AccessDenied { op: Op::Copy, .. }));
        assert_eq!(e.path(), Some(p));

        let e = FsError::io(Op::Move, p, io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(e, FsError::AlreadyExists { .. }));
        assert_eq!(e.code(), 17);
    }

    #[cfg(unix)]
    #[test]
    fn cross_device_carries_hint() {
        let e = FsError::io(
            Op::Move,
            Path::new("/a"),
            io::Error::from_raw_os_error(libc::EXDEV),
        );
        let msg = e.to_string();
        assert!(msg.starts_with("move '/a':"), "{msg}");
        assert!(msg.contains("cross-filesystem"), "{msg}");
    }
}
