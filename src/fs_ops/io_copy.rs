//! Buffered streaming copy into a freshly created file.
//!
//! The destination is opened with `create_new`, so this never clobbers an existing
//! path. The source is read once to EOF; bytes appended concurrently are not
//! guaranteed to be included.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024;

/// Copy `src` into a new file at `dst` and sync it to disk. Returns bytes written.
/// A partially written `dst` is removed when the copy fails.
pub(super) fn copy_new(src: &Path, dst: &Path) -> io::Result<u64> {
    let src_f = File::open(src)?;
    let dst_f = OpenOptions::new().write(true).create_new(true).open(dst)?;

    let result = (|| -> io::Result<u64> {
        let mut reader = BufReader::with_capacity(BUF_SIZE, src_f);
        let mut writer = BufWriter::with_capacity(BUF_SIZE, dst_f);
        let bytes = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(bytes)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(dst);
    }
    result
}
