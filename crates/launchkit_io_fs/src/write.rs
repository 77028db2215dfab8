//! Writability probing, crash-safe file replacement and whole-file reads.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::spec::{
    EnumReplaceStrategy, FsError, FsResult, NAME_PROBE_FILE, SpecReplaceOptions,
};
use crate::util::{copy_permissions, copy_xattrs};

////////////////////////////////////////////////////////////////////////////////
// #region Probe

/// Return `true` iff a file can be created and deleted inside `dir`.
///
/// There is no portable permission query that answers this reliably, so the
/// check writes `write_test.txt` into the directory and removes it again.
/// A pre-existing file of that name is truncated and removed.
/// Missing directories and permission errors both yield `false`.
pub fn is_directory_writable<P: AsRef<Path>>(dir: P) -> bool {
    let path_probe = dir.as_ref().join(NAME_PROBE_FILE);
    let file_probe = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path_probe);
    match file_probe {
        Ok(file) => {
            drop(file);
            if let Err(e) = fs::remove_file(&path_probe) {
                tracing::warn!(
                    "Failed to remove probe file {} ({e})",
                    path_probe.display()
                );
            }
            true
        }
        Err(e) => {
            tracing::debug!("Directory {} is not writable ({e})", dir.as_ref().display());
            false
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Replace

/// Sibling path used to stage new content: `path_target` + `suffix_temp`.
pub fn derive_temp_path(path_target: &Path, suffix_temp: &str) -> PathBuf {
    let mut os_path: OsString = path_target.as_os_str().to_os_string();
    os_path.push(suffix_temp);
    PathBuf::from(os_path)
}

/// Replace the content of `path_target` without ever truncating it in place.
///
/// Steps:
/// 1. Write `content` into `<path_target><suffix_temp>` and close it.
/// 2. Optionally carry the old file's permissions/xattrs over to the new one.
/// 3. Pause for `delay_before_swap`.
/// 4. Swap according to [`EnumReplaceStrategy`].
///
/// With [`EnumReplaceStrategy::DeleteThenRename`] a crash between removing the
/// old file and renaming the new one leaves only the temporary file behind.
/// Use [`EnumReplaceStrategy::RenameOver`] where the filesystem supports an
/// atomic replacing rename.
///
/// If the swap fails, the temporary file is kept so the new content survives.
pub fn update_file_safely<P: AsRef<Path>>(
    path_target: P,
    content: &[u8],
    spec_opts: &SpecReplaceOptions,
) -> FsResult<()> {
    let path_target = path_target.as_ref();
    let path_temp = derive_temp_path(path_target, &spec_opts.suffix_temp);

    write_and_close(&path_temp, content, spec_opts.if_sync_data)?;
    tracing::debug!("Wrote {} bytes to {}", content.len(), path_temp.display());

    let b_target_exists = path_target.exists();
    if b_target_exists {
        carry_over_metadata(path_target, &path_temp, spec_opts);
    }

    if !spec_opts.delay_before_swap.is_zero() {
        std::thread::sleep(spec_opts.delay_before_swap);
    }

    match spec_opts.rule_replace {
        EnumReplaceStrategy::DeleteThenRename => {
            if b_target_exists {
                fs::remove_file(path_target).map_err(|source| FsError::RemovePrevious {
                    path: path_target.to_path_buf(),
                    source,
                })?;
            }
            rename_into_place(&path_temp, path_target)?;
        }
        EnumReplaceStrategy::RenameOver => rename_into_place(&path_temp, path_target)?,
    }
    tracing::debug!("Replaced {}", path_target.display());
    Ok(())
}

/// [`update_file_safely`] with [`SpecReplaceOptions::default`].
pub fn update_file_safely_default<P: AsRef<Path>>(
    path_target: P,
    content: &[u8],
) -> FsResult<()> {
    update_file_safely(path_target, content, &SpecReplaceOptions::default())
}

fn write_and_close(path_temp: &Path, content: &[u8], if_sync_data: bool) -> FsResult<()> {
    let mut file_temp = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path_temp)
        .map_err(|source| FsError::OpenForWriting {
            path: path_temp.to_path_buf(),
            source,
        })?;

    let err_write = |source| FsError::Write {
        path: path_temp.to_path_buf(),
        source,
    };
    file_temp.write_all(content).map_err(err_write)?;
    file_temp.flush().map_err(err_write)?;
    if if_sync_data {
        file_temp.sync_all().map_err(err_write)?;
    }
    Ok(())
}

fn carry_over_metadata(path_old: &Path, path_new: &Path, spec_opts: &SpecReplaceOptions) {
    if spec_opts.if_keep_permissions {
        if let Err(e) = copy_permissions(path_old, path_new) {
            tracing::warn!(
                "Failed to carry permissions from {} to {} ({e})",
                path_old.display(),
                path_new.display()
            );
        }
    }
    if spec_opts.if_keep_xattrs {
        for name in copy_xattrs(path_old, path_new) {
            tracing::warn!(
                "Failed to carry xattr {name} from {} to {}",
                path_old.display(),
                path_new.display()
            );
        }
    }
}

fn rename_into_place(path_temp: &Path, path_target: &Path) -> FsResult<()> {
    fs::rename(path_temp, path_target).map_err(|source| FsError::Rename {
        from: path_temp.to_path_buf(),
        to: path_target.to_path_buf(),
        source,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Read

/// Read the whole file into memory.
pub fn read_whole_file<P: AsRef<Path>>(path_file: P) -> FsResult<Vec<u8>> {
    let path_file = path_file.as_ref();
    let mut file = File::open(path_file).map_err(|source| FsError::OpenForReading {
        path: path_file.to_path_buf(),
        source,
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|source| FsError::Read {
        path: path_file.to_path_buf(),
        source,
    })?;
    Ok(buf)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{
        derive_temp_path, is_directory_writable, read_whole_file, update_file_safely,
        update_file_safely_default,
    };
    use crate::spec::{EnumReplaceStrategy, FsError, NAME_PROBE_FILE, SpecReplaceOptions};

    fn list_names(dir: &Path) -> Vec<String> {
        let mut l_names = fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        l_names.sort();
        l_names
    }

    fn fast_options() -> SpecReplaceOptions {
        SpecReplaceOptions {
            delay_before_swap: Duration::ZERO,
            ..SpecReplaceOptions::default()
        }
    }

    #[test]
    fn writable_dir_leaves_no_probe_behind() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join("settings.json"), b"{}").expect("seed");
        let l_before = list_names(tmp.path());

        assert!(is_directory_writable(tmp.path()));

        assert_eq!(list_names(tmp.path()), l_before);
        assert!(!tmp.path().join(NAME_PROBE_FILE).exists());
    }

    #[test]
    fn missing_dir_is_not_writable() {
        let tmp = TempDir::new().expect("tempdir");
        assert!(!is_directory_writable(tmp.path().join("does/not/exist")));
    }

    #[cfg(unix)]
    #[test]
    fn read_only_dir_is_not_writable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tempdir");
        let dir_ro = tmp.path().join("ro");
        fs::create_dir(&dir_ro).expect("mkdir");
        fs::set_permissions(&dir_ro, fs::Permissions::from_mode(0o555)).expect("chmod");

        // Root ignores permission bits; nothing to check there.
        if fs::File::create(dir_ro.join("x")).is_ok() {
            eprintln!("skipped: permission bits are not enforced for this user");
            return;
        }

        assert!(!is_directory_writable(&dir_ro));
        fs::set_permissions(&dir_ro, fs::Permissions::from_mode(0o755)).expect("chmod back");
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            derive_temp_path(Path::new("cfg/options.json"), ".new"),
            Path::new("cfg/options.json.new")
        );
    }

    #[test]
    fn replace_existing_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("options.json");
        fs::write(&path_target, b"old content that is longer").expect("seed");

        update_file_safely(&path_target, b"new", &fast_options()).expect("replace");

        assert_eq!(fs::read(&path_target).expect("read"), b"new");
        assert!(!tmp.path().join("options.json.new").exists());
    }

    #[test]
    fn replace_creates_missing_target() {
        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("fresh.json");

        update_file_safely_default(&path_target, b"{\"a\":1}").expect("replace");

        assert_eq!(fs::read(&path_target).expect("read"), b"{\"a\":1}");
        assert_eq!(list_names(tmp.path()), vec!["fresh.json".to_string()]);
    }

    #[test]
    fn replace_with_empty_and_binary_content() {
        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("blob.bin");

        let l_contents: [&[u8]; 3] = [b"", &[0u8, 255, 10, 13, 0], b"plain"];
        for content in l_contents {
            update_file_safely(&path_target, content, &fast_options()).expect("replace");
            assert_eq!(fs::read(&path_target).expect("read"), content);
        }
        assert!(!tmp.path().join("blob.bin.new").exists());
    }

    #[test]
    fn replace_rename_over_strategy() {
        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("options.json");
        fs::write(&path_target, b"old").expect("seed");

        let spec_opts = SpecReplaceOptions {
            rule_replace: EnumReplaceStrategy::RenameOver,
            suffix_temp: ".tmp".to_string(),
            ..fast_options()
        };
        update_file_safely(&path_target, b"new", &spec_opts).expect("replace");

        assert_eq!(fs::read(&path_target).expect("read"), b"new");
        assert!(!tmp.path().join("options.json.tmp").exists());
    }

    #[test]
    fn replace_reports_open_failure_with_temp_path() {
        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("missing_dir/options.json");

        let err = update_file_safely(&path_target, b"x", &fast_options()).expect_err("must fail");

        assert!(matches!(err, FsError::OpenForWriting { .. }));
        assert_eq!(
            err.path(),
            Some(tmp.path().join("missing_dir/options.json.new").as_path())
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Could not open file \""), "{msg}");
        assert!(msg.contains("options.json.new"), "{msg}");
        assert!(msg.contains("for writing"), "{msg}");
    }

    #[test]
    fn replace_onto_directory_keeps_temp_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("occupied");
        fs::create_dir(&path_target).expect("mkdir");
        fs::write(path_target.join("child"), b"x").expect("seed child");

        let err =
            update_file_safely(&path_target, b"data", &fast_options()).expect_err("must fail");

        assert!(matches!(err, FsError::RemovePrevious { .. }));
        assert!(err.to_string().contains("Could not delete the previous file"));
        assert_eq!(
            fs::read(tmp.path().join("occupied.new")).expect("temp kept"),
            b"data"
        );
    }

    #[test]
    fn replace_reports_rename_failure_and_keeps_temp_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("occupied");
        fs::create_dir(&path_target).expect("mkdir");
        fs::write(path_target.join("child"), b"x").expect("seed child");

        let spec_opts = SpecReplaceOptions {
            rule_replace: EnumReplaceStrategy::RenameOver,
            ..fast_options()
        };
        let err = update_file_safely(&path_target, b"data", &spec_opts).expect_err("must fail");

        let path_temp = tmp.path().join("occupied.new");
        assert!(matches!(err, FsError::Rename { .. }));
        assert_eq!(err.path(), Some(path_temp.as_path()));
        let msg = err.to_string();
        assert!(msg.starts_with("Could not rename the new file \""), "{msg}");
        assert!(msg.contains(&path_temp.display().to_string()), "{msg}");
        assert!(
            msg.contains(&format!("back to \"{}\"", path_target.display())),
            "{msg}"
        );
        assert_eq!(fs::read(&path_temp).expect("temp kept"), b"data");
        assert!(path_target.join("child").exists());
    }

    #[cfg(unix)]
    #[test]
    fn replace_keeps_permissions_of_previous_file() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tempdir");
        let path_target = tmp.path().join("run.sh");
        fs::write(&path_target, b"#!/bin/sh\n").expect("seed");
        fs::set_permissions(&path_target, fs::Permissions::from_mode(0o750)).expect("chmod");

        update_file_safely(&path_target, b"#!/bin/sh\necho hi\n", &fast_options())
            .expect("replace");

        let mode = fs::metadata(&path_target).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn read_whole_file_returns_bytes() {
        let tmp = TempDir::new().expect("tempdir");
        let path_file = tmp.path().join("doom.ini");
        fs::write(&path_file, b"[General]\nfoo=1\n").expect("seed");

        assert_eq!(
            read_whole_file(&path_file).expect("read"),
            b"[General]\nfoo=1\n"
        );
    }

    #[test]
    fn read_whole_file_reports_missing_file() {
        let tmp = TempDir::new().expect("tempdir");
        let err = read_whole_file(tmp.path().join("nope.ini")).expect_err("must fail");

        assert!(matches!(err, FsError::OpenForReading { .. }));
        assert!(err.to_string().contains("for reading"));
    }
}
