//! Option models, entry-type set and the top-level error type.

use std::io;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region Constants

/// File name used by [`crate::is_directory_writable`] to probe a directory.
pub const NAME_PROBE_FILE: &str = "write_test.txt";

/// Suffix appended to the target path to build the temporary sibling.
pub const SUFFIX_TEMP_DEFAULT: &str = ".new";

/// Pause between closing the temporary file and swapping it into place.
///
/// Works around lost files reported after power outages on some platforms.
/// It is a heuristic, not a durability guarantee.
pub const DELAY_BEFORE_SWAP_DEFAULT: Duration = Duration::from_millis(20);

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Classification of one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumEntryType {
    /// Anything that is not a directory.
    File,
    /// A directory (or a followed symlink to one).
    Directory,
}

/// How stored paths should be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumPathStyle {
    /// Relative to the convertor's base directory.
    #[default]
    Relative,
    /// Absolute and lexically normalized.
    Absolute,
}

/// How the replacement file is swapped into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumReplaceStrategy {
    /// Delete the old target, then rename the temporary file onto its path.
    ///
    /// A crash between the two steps leaves only the temporary file.
    #[default]
    DeleteThenRename,
    /// Rename the temporary file over the target in one call.
    ///
    /// Atomic on POSIX filesystems; on Windows this maps to a replacing move.
    RenameOver,
}

/// Pattern matching mode for include/exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

/// Symlink handling policy during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumSymlinkStrategy {
    /// Classify by link target and descend into linked directories.
    #[default]
    Follow,
    /// Ignore symlink entries entirely.
    Skip,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EntryTypes

/// Subset of {FILE, DIRECTORY} selecting which entries a traversal visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EntryTypes(u8);

impl EntryTypes {
    pub const NONE: Self = Self(0);
    pub const FILE: Self = Self(0b01);
    pub const DIRECTORY: Self = Self(0b10);
    pub const ALL: Self = Self(0b11);

    pub fn contains(self, entry_type: EnumEntryType) -> bool {
        let bit = match entry_type {
            EnumEntryType::File => Self::FILE.0,
            EnumEntryType::Directory => Self::DIRECTORY.0,
        };
        self.0 & bit != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EntryTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntryTypes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<EnumEntryType> for EntryTypes {
    fn from(entry_type: EnumEntryType) -> Self {
        match entry_type {
            EnumEntryType::File => Self::FILE,
            EnumEntryType::Directory => Self::DIRECTORY,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Input options for `update_file_safely`.
#[derive(Debug, Clone)]
pub struct SpecReplaceOptions {
    /// Suffix appended to the target path for the temporary file.
    pub suffix_temp: String,
    /// Pause before the old file is touched. `Duration::ZERO` disables it.
    pub delay_before_swap: Duration,
    /// Swap strategy.
    pub rule_replace: EnumReplaceStrategy,
    /// Flush temporary file data to the device before closing it.
    pub if_sync_data: bool,
    /// Copy permission bits of an existing target onto the replacement.
    pub if_keep_permissions: bool,
    /// Copy extended attributes of an existing target (Linux only).
    pub if_keep_xattrs: bool,
}

impl Default for SpecReplaceOptions {
    fn default() -> Self {
        Self {
            suffix_temp: SUFFIX_TEMP_DEFAULT.to_string(),
            delay_before_swap: DELAY_BEFORE_SWAP_DEFAULT,
            rule_replace: EnumReplaceStrategy::DeleteThenRename,
            if_sync_data: true,
            if_keep_permissions: true,
            if_keep_xattrs: true,
        }
    }
}

/// Input options for `traverse_directory`.
#[derive(Debug, Clone)]
pub struct SpecTraverseOptions {
    /// Descend into subdirectories.
    pub if_recursive: bool,
    /// Which entry kinds are handed to the visitor.
    pub entry_types: EntryTypes,
    /// Include patterns applied to file basename.
    pub patterns_include_files: Option<Vec<String>>,
    /// Exclude patterns applied to file basename.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Include patterns applied to directory basename.
    pub patterns_include_dirs: Option<Vec<String>>,
    /// Exclude patterns applied to directory basename.
    pub patterns_exclude_dirs: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumPatternMode,
    /// Symlink handling behavior.
    pub rule_symlink: EnumSymlinkStrategy,
}

impl Default for SpecTraverseOptions {
    fn default() -> Self {
        Self {
            if_recursive: false,
            entry_types: EntryTypes::ALL,
            patterns_include_files: None,
            patterns_exclude_files: None,
            patterns_include_dirs: None,
            patterns_exclude_dirs: None,
            rule_pattern: EnumPatternMode::Glob,
            rule_symlink: EnumSymlinkStrategy::Follow,
        }
    }
}

/// One entry handed to a traversal visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecVisitedEntry {
    /// Path after the caller's path context was applied.
    pub path: PathBuf,
    /// Path as found on disk (root joined with the entry names).
    pub path_physical: PathBuf,
    /// Entry basename.
    pub name: String,
    /// Entry classification.
    pub entry_type: EnumEntryType,
}

impl SpecVisitedEntry {
    pub fn is_dir(&self) -> bool {
        self.entry_type == EnumEntryType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EnumEntryType::File
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Result alias used across the crate.
pub type FsResult<T> = Result<T, FsError>;

/// Failures surfaced to callers. Each message names the step that failed.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Could not open file \"{}\" for reading: {source}", path.display())]
    OpenForReading { path: PathBuf, source: io::Error },

    #[error("Error occurred while reading a file \"{}\": {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Could not open file \"{}\" for writing: {source}", path.display())]
    OpenForWriting { path: PathBuf, source: io::Error },

    #[error("Could not write to file \"{}\": {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Could not delete the previous file \"{}\": {source}", path.display())]
    RemovePrevious { path: PathBuf, source: io::Error },

    #[error(
        "Could not rename the new file \"{}\" back to \"{}\": {source}",
        from.display(),
        to.display()
    )]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Invalid pattern in include/exclude: {0}")]
    InvalidPattern(String),
}

impl FsError {
    /// Path the failed step was operating on.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::OpenForReading { path, .. }
            | Self::Read { path, .. }
            | Self::OpenForWriting { path, .. }
            | Self::Write { path, .. }
            | Self::RemovePrevious { path, .. } => Some(path),
            Self::Rename { from, .. } => Some(from),
            Self::InvalidPattern(_) => None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
