//! Small-file persistence with atomic tmp→rename

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Sibling temp path used while writing `path` (`state.json` → `state.json.tmp`)
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to a temp sibling, fsync, then rename over `path`.
///
/// Readers observe either the old or the new file, never a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path_for(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Remove a temp sibling left behind by an interrupted [`write_atomic`].
///
/// Returns `true` if a stale file was removed.
pub fn remove_stale_tmp(path: &Path) -> io::Result<bool> {
    let tmp = tmp_path_for(path);
    if !tmp.exists() {
        return Ok(false);
    }
    log::warn!("Removing stale tmp file: {}", tmp.display());
    fs::remove_file(&tmp)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tmp_path_appends_suffix() {
        let p = Path::new("/var/lib/hubline/state.json");
        assert_eq!(
            tmp_path_for(p),
            PathBuf::from("/var/lib/hubline/state.json.tmp")
        );
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        write_atomic(&path, b"{}").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn remove_stale_tmp_only_touches_own_sibling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(tmp_path_for(&path), b"partial").unwrap();
        fs::write(dir.path().join("other.tmp"), b"keep").unwrap();

        assert!(remove_stale_tmp(&path).unwrap());
        assert!(!tmp_path_for(&path).exists());
        assert!(dir.path().join("other.tmp").exists());
        assert!(!remove_stale_tmp(&path).unwrap());
    }
}
