//! Filesystem helpers shared by the layout and the mapper.

use std::path::{Component, Path, PathBuf};

use freighter_core::error::{FreighterError, Result};
use tokio::io::AsyncWriteExt;

/// Suffix of in-flight files. Anything carrying it is garbage once its
/// writer is gone.
pub const TMP_SUFFIX: &str = ".tmp";

/// Write `data` to `path` so that readers only ever observe the old content
/// or the complete new content.
///
/// The data goes to a uniquely named sibling, is flushed to disk, then
/// renamed over `path`.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        FreighterError::InvalidPath(format!("{} has no parent directory", path.display()))
    })?;
    tokio::fs::create_dir_all(parent).await.map_err(|e| {
        io_context(e, format!("failed to create directory {}", parent.display()))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{}.{}{}", file_name, uuid::Uuid::new_v4(), TMP_SUFFIX));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_context(
            e,
            format!("failed to write {}", path.display()),
        ));
    }
    Ok(())
}

/// Join a relative, descriptor-supplied name onto `root`, refusing anything
/// that would land outside it.
pub fn safe_join(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    if name.is_empty() {
        return Err(FreighterError::InvalidPath("empty file name".to_string()));
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(FreighterError::InvalidPath(format!(
                    "'{}' must be a relative path inside the destination",
                    name
                )))
            }
        }
    }
    Ok(root.join(relative))
}

/// Calculate total size of a directory recursively.
pub fn dir_size(path: &Path) -> u64 {
    let mut total = 0;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                total += dir_size(&path);
            } else if let Ok(meta) = path.metadata() {
                total += meta.len();
            }
        }
    }
    total
}

pub(crate) fn io_context(e: std::io::Error, context: String) -> FreighterError {
    FreighterError::IoError(std::io::Error::new(e.kind(), format!("{}: {}", context, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("a/b/c.txt");
        write_atomic(&target, b"payload").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_and_leaves_no_tmp() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("index.json");
        write_atomic(&target, b"old").await.unwrap();
        write_atomic(&target, b"new").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(TMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_safe_join_accepts_nested_relative() {
        let root = Path::new("/dest");
        assert_eq!(
            safe_join(root, "dir/file.txt").unwrap(),
            PathBuf::from("/dest/dir/file.txt")
        );
        assert!(safe_join(root, "./file.txt").is_ok());
    }

    #[test]
    fn test_safe_join_rejects_escape() {
        let root = Path::new("/dest");
        assert!(safe_join(root, "../etc/passwd").is_err());
        assert!(safe_join(root, "a/../../b").is_err());
        assert!(safe_join(root, "/etc/passwd").is_err());
        assert!(safe_join(root, "").is_err());
    }

    #[test]
    fn test_dir_size() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a"), vec![0u8; 10]).unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/b"), vec![0u8; 5]).unwrap();
        assert_eq!(dir_size(tmp.path()), 15);
    }
}
