use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// `<name>.tmp` next to `path`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces `path` with `bytes` through a temporary sibling. The destination
/// is only touched once the temporary file is completely written; on failure
/// the temporary file is removed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = temp_sibling(path);
    if let Err(e) = fs::write(&temp, bytes) {
        discard(&temp);
        return Err(e);
    }
    replace(&temp, path).inspect_err(|_| discard(&temp))
}

fn replace(temp: &Path, path: &Path) -> io::Result<()> {
    match fs::rename(temp, path) {
        Ok(()) => Ok(()),
        // some platforms refuse to rename over an existing file
        Err(_) if path.exists() => {
            fs::remove_file(path)?;
            fs::rename(temp, path)
        }
        Err(e) => Err(e),
    }
}

fn discard(temp: &Path) {
    if temp.is_file() {
        if let Err(e) = fs::remove_file(temp) {
            warn!("Failed to remove {:?}: {}", temp, e);
        }
    }
}

/// True when both paths name the same file, falling back to a plain
/// comparison when either does not exist yet.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
