use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::DeliveryError;

fn fs_err(context: &str, path: &Utf8Path, err: io::Error) -> DeliveryError {
    DeliveryError::Filesystem(format!("{context} {path}: {err}"))
}

/// Existing paths, including dangling symlinks.
pub fn path_exists(path: &Utf8Path) -> bool {
    fs::symlink_metadata(path.as_std_path()).is_ok()
}

pub fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, DeliveryError> {
    let absolute =
        std::path::absolute(path.as_std_path()).map_err(|err| fs_err("resolve", path, err))?;
    Utf8PathBuf::from_path_buf(absolute)
        .map_err(|_| DeliveryError::Filesystem(format!("non UTF-8 path {path}")))
}

pub fn glob_sorted(pattern: &str) -> Result<Vec<Utf8PathBuf>, DeliveryError> {
    let entries = glob::glob(pattern)
        .map_err(|err| DeliveryError::Filesystem(format!("invalid glob {pattern}: {err}")))?;
    let mut paths = entries
        .filter_map(Result::ok)
        .filter_map(|path| Utf8PathBuf::from_path_buf(path).ok())
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), DeliveryError> {
    let parent = path
        .parent()
        .ok_or_else(|| DeliveryError::Filesystem(format!("invalid destination path {path}")))?;
    fs::create_dir_all(parent.as_std_path()).map_err(|err| fs_err("create", parent, err))?;
    let mut temp = Builder::new()
        .prefix(".fc-deliver-record")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| fs_err("create temp file in", parent, err))?;
    temp.write_all(content).map_err(|err| fs_err("write", path, err))?;
    temp.persist(path.as_std_path())
        .map_err(|err| fs_err("persist", path, err.error))?;
    Ok(())
}

pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeliveryError> {
    let parent = dest
        .parent()
        .ok_or_else(|| DeliveryError::Filesystem(format!("invalid destination path {dest}")))?;
    let temp = Builder::new()
        .prefix(".fc-deliver-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| fs_err("create temp file in", parent, err))?;
    fs::copy(source.as_std_path(), temp.path()).map_err(|err| fs_err("copy", source, err))?;
    temp.persist_noclobber(dest.as_std_path())
        .map_err(|err| fs_err("persist", dest, err.error))?;
    Ok(())
}

/// Copies a directory tree. Symlinks are recreated, never followed.
pub fn copy_dir_recursive(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeliveryError> {
    fs::create_dir_all(dest.as_std_path()).map_err(|err| fs_err("create", dest, err))?;
    let entries = source.read_dir_utf8().map_err(|err| fs_err("read", source, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| fs_err("read", source, err))?;
        let target = dest.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|err| fs_err("inspect", entry.path(), err))?;
        if file_type.is_symlink() {
            let link = entry
                .path()
                .read_link_utf8()
                .map_err(|err| fs_err("read link", entry.path(), err))?;
            symlink(&link, &target)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(entry.path(), &target)?;
        } else {
            fs::copy(entry.path().as_std_path(), target.as_std_path())
                .map_err(|err| fs_err("copy", entry.path(), err))?;
        }
    }
    Ok(())
}

/// Copies `source` into a temporary sibling of `dest` and renames it into place.
pub fn copy_dir_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeliveryError> {
    let parent = dest
        .parent()
        .ok_or_else(|| DeliveryError::Filesystem(format!("invalid destination path {dest}")))?;
    let temp_dir = Builder::new()
        .prefix(".fc-deliver-tree")
        .tempdir_in(parent.as_std_path())
        .map_err(|err| fs_err("create temp dir in", parent, err))?;
    let temp_path = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf())
        .map_err(|_| DeliveryError::Filesystem("invalid temp dir".to_string()))?;
    copy_dir_recursive(source, &temp_path)?;
    fs::rename(temp_path.as_std_path(), dest.as_std_path())
        .map_err(|err| fs_err("rename", dest, err))?;
    Ok(())
}

pub fn move_path(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeliveryError> {
    match fs::rename(source.as_std_path(), dest.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            if source.is_dir() {
                copy_dir_atomic(source, dest)?;
                fs::remove_dir_all(source.as_std_path())
                    .map_err(|err| fs_err("remove", source, err))
            } else {
                copy_file_atomic(source, dest)?;
                fs::remove_file(source.as_std_path()).map_err(|err| fs_err("remove", source, err))
            }
        }
        Err(err) => Err(fs_err("move", source, err)),
    }
}

#[cfg(unix)]
pub fn symlink(source: &Utf8Path, link: &Utf8Path) -> Result<(), DeliveryError> {
    std::os::unix::fs::symlink(source.as_std_path(), link.as_std_path())
        .map_err(|err| fs_err("symlink", link, err))
}

#[cfg(windows)]
pub fn symlink(source: &Utf8Path, link: &Utf8Path) -> Result<(), DeliveryError> {
    let result = if source.is_dir() {
        std::os::windows::fs::symlink_dir(source.as_std_path(), link.as_std_path())
    } else {
        std::os::windows::fs::symlink_file(source.as_std_path(), link.as_std_path())
    };
    result.map_err(|err| fs_err("symlink", link, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_tree_keeps_layout() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let source = root.join("fastqc").join("1_110106_FC1_1_fastqc");
        fs::create_dir_all(source.join("Images")).unwrap();
        fs::write(source.join("fastqc_data.txt"), b"##FastQC").unwrap();
        fs::write(source.join("Images").join("per_base_quality.png"), b"png").unwrap();

        let dest = root.join("delivered").join("1_110106_FC1_1_fastqc");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        copy_dir_atomic(&source, &dest).unwrap();

        assert!(dest.join("fastqc_data.txt").is_file());
        assert!(dest.join("Images").join("per_base_quality.png").is_file());
        assert!(source.join("fastqc_data.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_recreates_links_without_following_them() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let source = root.join("fastqc").join("2_110106_FC1_nobc_fastqc");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("summary.txt"), b"PASS").unwrap();
        std::os::unix::fs::symlink("..", source.join("loop")).unwrap();

        let dest = root.join("delivered");
        copy_dir_recursive(&source, &dest).unwrap();

        assert!(dest.join("summary.txt").is_file());
        let link = fs::symlink_metadata(dest.join("loop")).unwrap();
        assert!(link.file_type().is_symlink());
        assert_eq!(fs::read_link(dest.join("loop")).unwrap(), std::path::Path::new(".."));
    }

    #[test]
    fn record_write_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("data").join("project_run_info.yaml");
        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(root.join("data")).unwrap().count(), 1);
    }

    #[test]
    fn glob_on_missing_directory_is_empty() {
        let found = glob_sorted("/definitely/not/here/*_fastq.txt").unwrap();
        assert!(found.is_empty());
    }
}
