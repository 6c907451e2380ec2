//! Deterministic per-download directory layout under a configured root.
//!
//! Grounded on the teacher's `src/utils.rs::walk_recursive`, adapted to async
//! `tokio::fs` since every other I/O path in this crate is non-blocking.

use std::path::{Path, PathBuf};

/// `{root}/{id}` — the directory handed to the peer client as `targetDir`.
pub fn dir_for(root: &Path, id: &str) -> PathBuf {
    root.join(id)
}

/// Recursive depth-first enumeration of `dir`, returning absolute paths of
/// every regular file found. An absent directory yields an empty list.
pub async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    walk(dir, &mut out).await?;
    Ok(out)
}

fn walk<'a>(
    dir: &'a Path,
    out: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                walk(&path, out).await?;
            } else if file_type.is_file() {
                out.push(path);
            }
        }
        Ok(())
    })
}

/// Recursively removes `dir`. Errors are logged, never propagated: a failed
/// cleanup must not block the caller's own state transition.
pub async fn remove_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), "Failed to remove download directory: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_for_joins_root_and_id() {
        assert_eq!(dir_for(Path::new("/data/downloads"), "abc123"), PathBuf::from("/data/downloads/abc123"));
    }

    #[tokio::test]
    async fn list_files_returns_empty_for_missing_directory() {
        let files = list_files(Path::new("/no/such/directory/ever")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn list_files_walks_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(tmp.path().join("sub")).await.unwrap();
        tokio::fs::write(tmp.path().join("top.mp4"), b"a").await.unwrap();
        tokio::fs::write(tmp.path().join("sub/nested.mkv"), b"b").await.unwrap();

        let mut files = list_files(tmp.path()).await.unwrap();
        files.sort();

        let mut expected = vec![tmp.path().join("sub/nested.mkv"), tmp.path().join("top.mp4")];
        expected.sort();
        assert_eq!(files, expected);
    }

    #[tokio::test]
    async fn remove_dir_is_a_noop_when_missing() {
        remove_dir(Path::new("/no/such/directory/ever")).await;
    }

    #[tokio::test]
    async fn remove_dir_deletes_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("victim");
        tokio::fs::create_dir_all(&target).await.unwrap();
        tokio::fs::write(target.join("file.bin"), b"x").await.unwrap();

        remove_dir(&target).await;

        assert!(!target.exists());
    }
}
