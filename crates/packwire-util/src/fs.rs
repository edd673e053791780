use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// Missing parent directories are created first. The file will either have the
/// old contents or the new contents, never a partial write.
///
/// # Errors
/// Returns an error if the directory creation, write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    // Same directory as the target so the rename stays on one filesystem
    let mut temp_path = parent.to_path_buf();
    temp_path.push(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // On Windows, rename can fail if target exists. Try copy + remove as fallback.
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

/// Resolve `rel` below `root`, the way `path.join` does in Node.
///
/// Leading `/` (and Windows prefixes) are dropped so an absolute-looking name
/// still lands under `root`; `.` components are skipped.
///
/// # Errors
/// Returns `InvalidInput` if `rel` contains a `..` component.
pub fn join_within(root: &Path, rel: &Path) -> io::Result<PathBuf> {
    let mut out = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes {}: {}", root.display(), rel.display()),
                ));
            }
        }
    }
    Ok(out)
}

/// Recursively copy `from` into `to`, skipping every entry whose path
/// relative to `from` satisfies `skip`. A skipped directory is not descended.
///
/// Returns the destination paths of the copied files, sorted. A missing
/// source directory copies nothing.
///
/// # Errors
/// Returns an error if a file cannot be read or written.
pub fn copy_dir_filtered(
    from: &Path,
    to: &Path,
    skip: impl Fn(&Path) -> bool,
) -> io::Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    if !from.is_dir() {
        return Ok(copied);
    }

    let walker = WalkDir::new(from).follow_links(true).into_iter();
    for entry in walker.filter_entry(|e| match e.path().strip_prefix(from) {
        Ok(rel) if rel.as_os_str().is_empty() => true,
        Ok(rel) => !skip(rel),
        Err(_) => true,
    }) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let dest = to.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest)?;
        copied.push(dest);
    }

    copied.sort();
    Ok(copied)
}
