//! File copy with explicit replace semantics.
//! - Without `overwrite`: stream straight into the destination using an exclusive
//!   create, so an existing file is never touched.
//! - With `overwrite`: stream into a scratch file next to the destination, then
//!   atomically rename it over the destination.

use std::fs;
use std::path::Path;
use tracing::trace;

use super::{atomic, io_copy, metadata, util};
use crate::errors::{FsError, Op, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace an existing destination file.
    pub overwrite: bool,
    /// Carry access/modification times over to the copy.
    pub preserve_timestamps: bool,
}

/// Copy `src` to `dest`. Returns the number of bytes copied.
pub fn copy_file(src: &Path, dest: &Path, opts: CopyOptions) -> Result<u64> {
    let bytes = if opts.overwrite {
        let dest_dir = dest.parent().ok_or_else(|| FsError::InvalidDestination {
            path: dest.to_path_buf(),
            op: Op::Copy,
            reason: "destination has no parent directory",
        })?;
        let tmp = util::unique_temp_path(dest_dir);
        let bytes = io_copy::copy_new(src, &tmp).map_err(FsError::with(Op::Copy, &tmp))?;
        if let Err(e) = atomic::rename(&tmp, dest) {
            let _ = fs::remove_file(&tmp);
            return Err(FsError::io(Op::Copy, dest, e));
        }
        bytes
    } else {
        io_copy::copy_new(src, dest).map_err(FsError::with(Op::Copy, dest))?
    };

    if opts.preserve_timestamps {
        let meta = fs::metadata(src).map_err(FsError::with(Op::Copy, src))?;
        metadata::preserve_times(dest, &meta);
    }
    trace!(src = %src.display(), dest = %dest.display(), bytes, "copied file");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn replacing_copy_leaves_no_scratch_files() {
        let td = tempdir().unwrap();
        let src = td.path().join("src.txt");
        let dest = td.path().join("dest.txt");
        fs::write(&src, "new content").unwrap();
        fs::write(&dest, "old").unwrap();

        copy_file(
            &src,
            &dest,
            CopyOptions {
                overwrite: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new content");

        for entry in fs::read_dir(td.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            assert!(!name.starts_with(util::TEMP_PREFIX), "scratch file left behind: {name}");
        }
    }

    #[test]
    fn exclusive_copy_reports_already_exists() {
        let td = tempdir().unwrap();
        let src = td.path().join("a");
        let dest = td.path().join("b");
        fs::write(&src, "a").unwrap();
        fs::write(&dest, "b").unwrap();

        let err = copy_file(&src, &dest, CopyOptions::default()).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists { op: Op::Copy, .. }));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "b");
    }

    #[test]
    fn preserves_modification_time() {
        let td = tempdir().unwrap();
        let src = td.path().join("old.txt");
        let dest = td.path().join("copy.txt");
        fs::write(&src, "x").unwrap();
        let past = SystemTime::now() - Duration::from_secs(3600 * 24);
        filetime::set_file_mtime(&src, filetime::FileTime::from_system_time(past)).unwrap();

        copy_file(
            &src,
            &dest,
            CopyOptions {
                overwrite: false,
                preserve_timestamps: true,
            },
        )
        .unwrap();

        let src_m = fs::metadata(&src).unwrap().modified().unwrap();
        let dst_m = fs::metadata(&dest).unwrap().modified().unwrap();
        let delta = match src_m.duration_since(dst_m) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };
        assert!(delta < Duration::from_secs(2), "mtime not preserved: {delta:?}");
    }
}
