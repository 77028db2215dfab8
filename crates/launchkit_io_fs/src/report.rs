//! Traversal report model and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one `traverse_directory` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportTraverse {
    /// Total directory entries seen, filtered or not.
    pub cnt_scanned: u64,
    /// Files handed to the visitor.
    pub cnt_visited_files: u64,
    /// Directories handed to the visitor.
    pub cnt_visited_dirs: u64,
    /// Entries dropped by name patterns or symlink policy.
    pub cnt_filtered: u64,
    /// Non-fatal problems met during the walk (unreadable dirs, loops).
    pub warnings: Vec<String>,
}

impl ReportTraverse {
    pub fn visited_count(&self) -> u64 {
        self.cnt_visited_files + self.cnt_visited_dirs
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_visited_files".to_string(), self.cnt_visited_files);
        dict_counts.insert("cnt_visited_dirs".to_string(), self.cnt_visited_dirs);
        dict_counts.insert("cnt_filtered".to_string(), self.cnt_filtered);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} scanned={} files={} dirs={} filtered={} warnings={}",
            self.cnt_scanned,
            self.cnt_visited_files,
            self.cnt_visited_dirs,
            self.cnt_filtered,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportTraverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[TRAVERSE]"))
    }
}

/// Mutable accumulator filled while walking.
#[derive(Debug, Default, Clone)]
pub struct ReportTraverseBuilder {
    report: ReportTraverse,
}

impl ReportTraverseBuilder {
    pub fn add_scanned(&mut self) {
        self.report.cnt_scanned += 1;
    }

    pub fn add_visited_file(&mut self) {
        self.report.cnt_visited_files += 1;
    }

    pub fn add_visited_dir(&mut self) {
        self.report.cnt_visited_dirs += 1;
    }

    pub fn add_filtered(&mut self) {
        self.report.cnt_filtered += 1;
    }

    /// Record a warning and mirror it to the log.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!("{}", warning);
        self.report.warnings.push(warning);
    }

    pub fn build(self) -> ReportTraverse {
        self.report
    }
}
