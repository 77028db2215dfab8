//! Path conversion and sanitization helpers.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::spec::EnumPathStyle;

////////////////////////////////////////////////////////////////////////////////
// #region PathContext

/// Rewrites a discovered path before it reaches a visitor or gets stored.
pub trait PathContext {
    fn convert_path(&self, path: &Path) -> PathBuf;
}

/// Hands paths through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPathContext;

impl PathContext for IdentityPathContext {
    fn convert_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

impl<F> PathContext for F
where
    F: Fn(&Path) -> PathBuf,
{
    fn convert_path(&self, path: &Path) -> PathBuf {
        self(path)
    }
}

/// Converts paths between relative and absolute form against a base directory.
///
/// Conversion is purely lexical: nothing is resolved against the filesystem,
/// so paths to entries that do not exist yet convert the same way.
#[derive(Debug, Clone)]
pub struct PathConvertor {
    dir_base: PathBuf,
    rule_path_style: EnumPathStyle,
}

impl PathConvertor {
    /// A relative `dir_base` is resolved against the current working directory.
    pub fn new<P: AsRef<Path>>(dir_base: P, rule_path_style: EnumPathStyle) -> Self {
        Self {
            dir_base: normalize_lexically(&_absolutize_path(dir_base.as_ref())),
            rule_path_style,
        }
    }

    pub fn dir_base(&self) -> &Path {
        &self.dir_base
    }

    pub fn path_style(&self) -> EnumPathStyle {
        self.rule_path_style
    }

    pub fn set_path_style(&mut self, rule_path_style: EnumPathStyle) {
        self.rule_path_style = rule_path_style;
    }

    pub fn to_absolute(&self, path: &Path) -> PathBuf {
        if path.as_os_str().is_empty() {
            return PathBuf::new();
        }
        if path.is_absolute() {
            return normalize_lexically(path);
        }
        normalize_lexically(&self.dir_base.join(path))
    }

    /// Absolute paths on a different root than the base stay absolute.
    pub fn to_relative(&self, path: &Path) -> PathBuf {
        if path.as_os_str().is_empty() {
            return PathBuf::new();
        }
        let path_normalized = normalize_lexically(path);
        if path_normalized.is_relative() {
            return path_normalized;
        }
        relative_to(&path_normalized, &self.dir_base).unwrap_or(path_normalized)
    }
}

impl PathContext for PathConvertor {
    fn convert_path(&self, path: &Path) -> PathBuf {
        match self.rule_path_style {
            EnumPathStyle::Absolute => self.to_absolute(path),
            EnumPathStyle::Relative => self.to_relative(path),
        }
    }
}

fn _absolutize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// Drop `.` components and fold `..` into the preceding normal component.
///
/// Leading `..` of a relative path are kept; `..` directly under a root is dropped.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut path_out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match path_out.components().next_back() {
                Some(Component::Normal(_)) => {
                    path_out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                Some(Component::ParentDir) | Some(Component::CurDir) | None => {
                    path_out.push("..");
                }
            },
            other => path_out.push(other.as_os_str()),
        }
    }
    if path_out.as_os_str().is_empty() && !path.as_os_str().is_empty() {
        path_out.push(".");
    }
    path_out
}

/// Lexical path from `dir_base` to `path`. Both must be absolute and normalized.
fn relative_to(path: &Path, dir_base: &Path) -> Option<PathBuf> {
    let l_path: Vec<Component> = path.components().collect();
    let l_base: Vec<Component> = dir_base.components().collect();

    let n_common = l_path
        .iter()
        .zip(l_base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let n_root = |l: &[Component]| {
        l.iter()
            .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
            .count()
    };
    if n_common < n_root(&l_path) || n_common < n_root(&l_base) {
        return None;
    }

    let mut path_rel = PathBuf::new();
    for _ in n_common..l_base.len() {
        path_rel.push("..");
    }
    for component in &l_path[n_common..] {
        path_rel.push(component.as_os_str());
    }
    if path_rel.as_os_str().is_empty() {
        path_rel.push(".");
    }
    Some(path_rel)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Sanitization

// Old engines choke on anything outside plain ASCII.
static RE_INVALID_PATH_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9_ !#$&'()+,\-.;=@\[\]\^~]").expect("static regex must compile")
});

/// Remove every character outside the engine-safe whitelist.
///
/// Kept: ASCII letters, digits, space and `_ !#$&'()+,-.;=@[]^~`.
/// Everything else, including path separators and non-ASCII, is dropped.
pub fn sanitize_path(path: &str) -> String {
    RE_INVALID_PATH_CHARS.replace_all(path, "").into_owned()
}

/// Prefix `./` to a bare executable name so it resolves in the working directory.
pub fn fix_exe_path(path_exe: &str) -> String {
    if !path_exe.contains('/') {
        return format!("./{path_exe}");
    }
    path_exe.to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
