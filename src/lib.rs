//! Core library for `fs_entry`.
//!
//! Lazily-resolved path entries plus the operations built on them: filtered
//! directory traversal, collision-safe destination naming, file/folder copy and
//! move, and shallow folder comparison.
//!
//! Paths are made absolute against an explicit working directory; nothing here
//! reads the process cwd.

pub mod config;
pub mod conflict;
pub mod diff;
pub mod entry;
pub mod errors;
pub mod fs_ops;
pub mod hash;
pub mod logging;
pub mod transfer;
pub mod walker;

pub use config::{Config, LogLevel, load_config, load_config_from_xml_path, path_has_symlink_ancestor};
pub use conflict::{ConflictStrategy, NumberedRename, Resolution, compute_destination};
pub use diff::{DiffOptions, FolderDiff, diff};
pub use entry::{EntryKind, EntryMetadata, PathEntry};
pub use errors::{FsError, Op, Result};
pub use hash::{HashAlgorithm, digest};
pub use logging::init_tracing;
pub use transfer::{FileOutcome, SkipReason, TransferOptions, TransferReport, transfer};
pub use walker::{
    Children, MatchHook, NameMatch, SortBy, SortDirection, SortSpec, TraversalOptions, get_children,
};
