//! `launchkit_io_fs` v1:
//! Filesystem helpers behind the engine launcher's setup and config layers.
//!
//! Module layout:
//! - `write`    : writability probe, crash-safe file replace, whole-file read
//! - `traverse` : directory walk with path context and visitor
//! - `path`     : relative/absolute path conversion, sanitization
//! - `spec`     : enums/options/errors
//! - `report`   : traversal report model
//! - `util`     : shared helper functions

pub mod path;
pub mod report;
pub mod spec;
pub mod traverse;
mod util;
pub mod write;

pub use path::{
    IdentityPathContext, PathContext, PathConvertor, fix_exe_path, normalize_lexically,
    sanitize_path,
};
pub use report::{ReportTraverse, ReportTraverseBuilder};
pub use spec::{
    DELAY_BEFORE_SWAP_DEFAULT, EntryTypes, EnumEntryType, EnumPathStyle, EnumPatternMode,
    EnumReplaceStrategy, EnumSymlinkStrategy, FsError, FsResult, NAME_PROBE_FILE,
    SUFFIX_TEMP_DEFAULT, SpecReplaceOptions, SpecTraverseOptions, SpecVisitedEntry,
};
pub use traverse::{list_files_recursive, traverse_directory};
pub use write::{
    derive_temp_path, is_directory_writable, read_whole_file, update_file_safely,
    update_file_safely_default,
};
