use std::fs;
use std::path::Path;

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumPatternMode, FsError, FsResult, SpecTraverseOptions};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypePatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypePatternSeq {
    fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

/// Compiled include/exclude name filters for one traversal.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecNamePatterns {
    pub(crate) patterns_include_files: Option<TypePatternSeq>,
    pub(crate) patterns_exclude_files: Option<TypePatternSeq>,
    pub(crate) patterns_include_dirs: Option<TypePatternSeq>,
    pub(crate) patterns_exclude_dirs: Option<TypePatternSeq>,
}

impl SpecNamePatterns {
    pub(crate) fn from_options(spec_opts: &SpecTraverseOptions) -> FsResult<Self> {
        let rule_pattern = spec_opts.rule_pattern;
        Ok(Self {
            patterns_include_files: _compile(
                spec_opts.patterns_include_files.as_deref(),
                rule_pattern,
            )?,
            patterns_exclude_files: _compile(
                spec_opts.patterns_exclude_files.as_deref(),
                rule_pattern,
            )?,
            patterns_include_dirs: _compile(
                spec_opts.patterns_include_dirs.as_deref(),
                rule_pattern,
            )?,
            patterns_exclude_dirs: _compile(
                spec_opts.patterns_exclude_dirs.as_deref(),
                rule_pattern,
            )?,
        })
    }

    pub(crate) fn is_file_excluded(&self, name: &str) -> bool {
        is_excluded_by_patterns(
            name,
            self.patterns_include_files.as_ref(),
            self.patterns_exclude_files.as_ref(),
        )
    }

    pub(crate) fn is_dir_excluded(&self, name: &str) -> bool {
        is_excluded_by_patterns(
            name,
            self.patterns_include_dirs.as_ref(),
            self.patterns_exclude_dirs.as_ref(),
        )
    }
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumPatternMode,
) -> FsResult<Option<TypePatternSeq>> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumPatternMode::Literal => Ok(Some(TypePatternSeq::Literal(patterns.to_vec()))),
        EnumPatternMode::Glob => {
            let l_glob = patterns
                .iter()
                .map(|pattern| {
                    Glob::new(pattern)
                        .map(|g| g.compile_matcher())
                        .map_err(|e| FsError::InvalidPattern(e.to_string()))
                })
                .collect::<FsResult<Vec<_>>>()?;
            Ok(Some(TypePatternSeq::Glob(l_glob)))
        }
        EnumPatternMode::Regex => {
            let l_regex = patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|e| FsError::InvalidPattern(e.to_string()))
                })
                .collect::<FsResult<Vec<_>>>()?;
            Ok(Some(TypePatternSeq::Regex(l_regex)))
        }
    }
}

/// An absent include list admits everything; an absent exclude list rejects nothing.
fn is_excluded_by_patterns(
    value: &str,
    patterns_include: Option<&TypePatternSeq>,
    patterns_exclude: Option<&TypePatternSeq>,
) -> bool {
    let b_included = patterns_include.is_none_or(|p| p.is_match(value));
    let b_excluded = patterns_exclude.is_some_and(|p| p.is_match(value));
    !b_included || b_excluded
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MetadataCarryOver

/// Copy permission bits of `path_src` onto `path_dst`.
pub(crate) fn copy_permissions(path_src: &Path, path_dst: &Path) -> Result<(), std::io::Error> {
    let stat_src = fs::metadata(path_src)?;
    fs::set_permissions(path_dst, stat_src.permissions())
}

/// Best-effort xattr copy. Returns the names that could not be carried over.
#[cfg(target_os = "linux")]
pub(crate) fn copy_xattrs(path_src: &Path, path_dst: &Path) -> Vec<String> {
    let iter_xattr_names = match xattr::list(path_src) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let mut l_failed = Vec::new();
    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_src, &name).ok().flatten() else {
            continue;
        };
        if xattr::set(path_dst, &name, &raw_value).is_err() {
            l_failed.push(name.to_string_lossy().into_owned());
        }
    }
    l_failed
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn copy_xattrs(_path_src: &Path, _path_dst: &Path) -> Vec<String> {
    Vec::new()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SpecNamePatterns;
    use crate::spec::{EnumPatternMode, FsError, SpecTraverseOptions};

    fn strings(values: &[&str]) -> Option<Vec<String>> {
        Some(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn glob_include_and_exclude_combine() {
        let spec_opts = SpecTraverseOptions {
            patterns_include_files: strings(&["*.wad", "*.pk3"]),
            patterns_exclude_files: strings(&["doom2*"]),
            ..SpecTraverseOptions::default()
        };
        let pats = SpecNamePatterns::from_options(&spec_opts).expect("compile");

        assert!(!pats.is_file_excluded("doom.wad"));
        assert!(!pats.is_file_excluded("brutal.pk3"));
        assert!(pats.is_file_excluded("doom2.wad"));
        assert!(pats.is_file_excluded("readme.txt"));
        assert!(!pats.is_dir_excluded("anything"));
    }

    #[test]
    fn literal_mode_matches_substrings() {
        let spec_opts = SpecTraverseOptions {
            patterns_exclude_dirs: strings(&["backup"]),
            rule_pattern: EnumPatternMode::Literal,
            ..SpecTraverseOptions::default()
        };
        let pats = SpecNamePatterns::from_options(&spec_opts).expect("compile");

        assert!(pats.is_dir_excluded("old_backup_2"));
        assert!(!pats.is_dir_excluded("maps"));
    }

    #[test]
    fn empty_pattern_list_is_ignored() {
        let spec_opts = SpecTraverseOptions {
            patterns_include_files: Some(Vec::new()),
            ..SpecTraverseOptions::default()
        };
        let pats = SpecNamePatterns::from_options(&spec_opts).expect("compile");
        assert!(pats.patterns_include_files.is_none());
        assert!(!pats.is_file_excluded("x.txt"));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let spec_opts = SpecTraverseOptions {
            patterns_include_files: strings(&["[abc"]),
            ..SpecTraverseOptions::default()
        };
        let err = SpecNamePatterns::from_options(&spec_opts).expect_err("must fail");
        assert!(matches!(err, FsError::InvalidPattern(_)));
    }
}
