//! Directory traversal with caller-supplied path context and visitor.

use std::fs;
use std::path::{Path, PathBuf};

use crate::path::PathContext;
use crate::report::{ReportTraverse, ReportTraverseBuilder};
use crate::spec::{
    EnumEntryType, EnumSymlinkStrategy, FsResult, SpecTraverseOptions, SpecVisitedEntry,
};
use crate::util::SpecNamePatterns;

#[derive(Debug, Clone)]
struct SpecDirEntry {
    path_physical: PathBuf,
    name: String,
    entry_type: EnumEntryType,
}

struct SpecTraverseContext<'a, C: ?Sized> {
    spec_opts: &'a SpecTraverseOptions,
    spec_pats: SpecNamePatterns,
    path_context: &'a C,
    builder_report: ReportTraverseBuilder,
    /// `(dev, ino)` of every directory on the current descent path.
    #[cfg(unix)]
    l_ancestor_dirs: Vec<(u64, u64)>,
}

/// Visit entries under `dir_root`, handing each one to `visit_entry`.
///
/// - An empty or missing root (or a root that is not a directory) visits nothing
///   and returns an empty report.
/// - Entries are classified by what is on disk; `path_context` is applied once
///   per entry, only to the path handed to the visitor. Descent always uses the
///   physical path, so a non-idempotent context is never applied twice.
/// - Directories are visited before their children. Siblings are delivered in
///   name order, which callers should not rely on.
/// - A directory reached again through a symlink is walked again under the
///   link's path. Only a link back to one of its own ancestors is cut, with a
///   report warning, like unreadable subdirectories.
///
/// Returns [`crate::FsError::InvalidPattern`] only when a name pattern fails to compile.
pub fn traverse_directory<P, C, F>(
    dir_root: P,
    spec_opts: &SpecTraverseOptions,
    path_context: &C,
    mut visit_entry: F,
) -> FsResult<ReportTraverse>
where
    P: AsRef<Path>,
    C: PathContext + ?Sized,
    F: FnMut(&SpecVisitedEntry),
{
    let spec_pats = SpecNamePatterns::from_options(spec_opts)?;
    let path_root = dir_root.as_ref();
    if path_root.as_os_str().is_empty() || !path_root.is_dir() {
        tracing::debug!(
            "Traversal root {} is missing, nothing to visit",
            path_root.display()
        );
        return Ok(ReportTraverse::default());
    }

    let mut spec_ctx = SpecTraverseContext {
        spec_opts,
        spec_pats,
        path_context,
        builder_report: ReportTraverseBuilder::default(),
        #[cfg(unix)]
        l_ancestor_dirs: Vec::new(),
    };
    walk_directory(path_root, &mut spec_ctx, &mut visit_entry);
    Ok(spec_ctx.builder_report.build())
}

/// Collect every file under `dir_root` recursively, paths passed through `path_context`.
pub fn list_files_recursive<P, C>(dir_root: P, path_context: &C) -> FsResult<Vec<PathBuf>>
where
    P: AsRef<Path>,
    C: PathContext + ?Sized,
{
    let spec_opts = SpecTraverseOptions {
        if_recursive: true,
        entry_types: crate::spec::EntryTypes::FILE,
        ..SpecTraverseOptions::default()
    };
    let mut l_paths = Vec::new();
    traverse_directory(dir_root, &spec_opts, path_context, |entry| {
        l_paths.push(entry.path.clone())
    })?;
    Ok(l_paths)
}

fn walk_directory<C, F>(
    path_dir: &Path,
    spec_ctx: &mut SpecTraverseContext<'_, C>,
    visit_entry: &mut F,
) where
    C: PathContext + ?Sized,
    F: FnMut(&SpecVisitedEntry),
{
    if !enter_directory(path_dir, spec_ctx) {
        return;
    }
    if let Some(l_entries) = read_entries(path_dir, spec_ctx) {
        walk_entries(l_entries, spec_ctx, visit_entry);
    }
    leave_directory(spec_ctx);
}

fn walk_entries<C, F>(
    l_entries: Vec<SpecDirEntry>,
    spec_ctx: &mut SpecTraverseContext<'_, C>,
    visit_entry: &mut F,
) where
    C: PathContext + ?Sized,
    F: FnMut(&SpecVisitedEntry),
{
    for spec_entry in l_entries {
        match spec_entry.entry_type {
            EnumEntryType::Directory => {
                if spec_ctx.spec_pats.is_dir_excluded(&spec_entry.name) {
                    spec_ctx.builder_report.add_filtered();
                    continue;
                }
                if spec_ctx.spec_opts.entry_types.contains(EnumEntryType::Directory) {
                    deliver(&spec_entry, spec_ctx, visit_entry);
                    spec_ctx.builder_report.add_visited_dir();
                }
                if spec_ctx.spec_opts.if_recursive {
                    walk_directory(&spec_entry.path_physical, spec_ctx, visit_entry);
                }
            }
            EnumEntryType::File => {
                if spec_ctx.spec_pats.is_file_excluded(&spec_entry.name) {
                    spec_ctx.builder_report.add_filtered();
                    continue;
                }
                if spec_ctx.spec_opts.entry_types.contains(EnumEntryType::File) {
                    deliver(&spec_entry, spec_ctx, visit_entry);
                    spec_ctx.builder_report.add_visited_file();
                }
            }
        }
    }
}

fn deliver<C, F>(
    spec_entry: &SpecDirEntry,
    spec_ctx: &SpecTraverseContext<'_, C>,
    visit_entry: &mut F,
) where
    C: PathContext + ?Sized,
    F: FnMut(&SpecVisitedEntry),
{
    let spec_visited = SpecVisitedEntry {
        path: spec_ctx.path_context.convert_path(&spec_entry.path_physical),
        path_physical: spec_entry.path_physical.clone(),
        name: spec_entry.name.clone(),
        entry_type: spec_entry.entry_type,
    };
    visit_entry(&spec_visited);
}

/// Push `path_dir` onto the descent path; `false` when it is already an ancestor.
///
/// Every `true` must be paired with one [`leave_directory`].
fn enter_directory<C: ?Sized>(
    path_dir: &Path,
    spec_ctx: &mut SpecTraverseContext<'_, C>,
) -> bool {
    if spec_ctx.spec_opts.rule_symlink != EnumSymlinkStrategy::Follow {
        return true;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        match fs::metadata(path_dir) {
            Ok(stat_dir) => {
                let key_dir = (stat_dir.dev(), stat_dir.ino());
                if spec_ctx.l_ancestor_dirs.contains(&key_dir) {
                    spec_ctx
                        .builder_report
                        .add_warning(format!("Symlink loop detected: {}", path_dir.display()));
                    return false;
                }
                spec_ctx.l_ancestor_dirs.push(key_dir);
            }
            Err(e) => {
                spec_ctx.builder_report.add_warning(format!(
                    "Failed to stat directory {} ({e})",
                    path_dir.display()
                ));
                return false;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path_dir;
    }
    true
}

fn leave_directory<C: ?Sized>(spec_ctx: &mut SpecTraverseContext<'_, C>) {
    #[cfg(unix)]
    {
        if spec_ctx.spec_opts.rule_symlink == EnumSymlinkStrategy::Follow {
            spec_ctx.l_ancestor_dirs.pop();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = spec_ctx;
    }
}

/// List and classify the immediate entries of `path_dir`, sorted by name.
fn read_entries<C: ?Sized>(
    path_dir: &Path,
    spec_ctx: &mut SpecTraverseContext<'_, C>,
) -> Option<Vec<SpecDirEntry>> {
    let iter_entries = match fs::read_dir(path_dir) {
        Ok(iter) => iter,
        Err(e) => {
            spec_ctx.builder_report.add_warning(format!(
                "Failed to read directory {} ({e})",
                path_dir.display()
            ));
            return None;
        }
    };

    let mut l_entries = Vec::new();
    for entry_res in iter_entries {
        let entry = match entry_res {
            Ok(v) => v,
            Err(e) => {
                spec_ctx.builder_report.add_warning(format!(
                    "Failed to read directory entry under {} ({e})",
                    path_dir.display()
                ));
                continue;
            }
        };
        spec_ctx.builder_report.add_scanned();

        let path_physical = entry.path();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                spec_ctx
                    .builder_report
                    .add_warning(format!("Failed to inspect {} ({e})", path_physical.display()));
                continue;
            }
        };

        let b_is_symlink = cfg_file_type.is_symlink();
        if b_is_symlink && spec_ctx.spec_opts.rule_symlink == EnumSymlinkStrategy::Skip {
            spec_ctx.builder_report.add_filtered();
            continue;
        }

        let b_is_dir = cfg_file_type.is_dir() || (b_is_symlink && path_physical.is_dir());
        l_entries.push(SpecDirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path_physical,
            entry_type: if b_is_dir {
                EnumEntryType::Directory
            } else {
                EnumEntryType::File
            },
        });
    }

    l_entries.sort_by(|a, b| a.name.cmp(&b.name));
    Some(l_entries)
}
