//! Scoped working directory for one render.

use std::path::{Path, PathBuf};

use chronocam_common::error::ChronocamResult;
use tempfile::TempDir;

/// Temporary directory holding filter scripts, batch outputs and the
/// concat list. Removed when dropped, on every exit path, unless retention
/// was requested.
#[derive(Debug)]
pub struct RenderWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl RenderWorkspace {
    /// Create the workspace next to the final output so batch files land on
    /// the same filesystem.
    pub fn create(output: &Path, keep: bool) -> ChronocamResult<Self> {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;
        let dir = tempfile::Builder::new()
            .prefix(".chronocam-")
            .tempdir_in(&parent)?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), keep, "Created render workspace");
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keeps_files(&self) -> bool {
        self.keep
    }

    pub fn filter_script_path(&self, batch: Option<usize>) -> PathBuf {
        match batch {
            Some(index) => self.path().join(format!("batch_{index:04}.filter")),
            None => self.path().join("timeline.filter"),
        }
    }

    pub fn batch_output_path(&self, index: usize, extension: &str) -> PathBuf {
        self.path().join(format!("batch_{index:04}.{extension}"))
    }

    pub fn concat_list_path(&self) -> PathBuf {
        self.path().join("concat.txt")
    }

    /// End of the render: returns the retained directory when files are
    /// kept, otherwise deletes everything.
    pub fn finish(mut self) -> Option<PathBuf> {
        self.release()
    }

    fn release(&mut self) -> Option<PathBuf> {
        let dir = self.dir.take()?;
        if self.keep {
            let path = dir.keep();
            tracing::info!(path = %path.display(), "Keeping render workspace");
            Some(path)
        } else {
            if let Err(e) = dir.close() {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove render workspace");
            }
            None
        }
    }
}

impl Drop for RenderWorkspace {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("out.mp4");
        let path = {
            let ws = RenderWorkspace::create(&output, false).unwrap();
            std::fs::write(ws.filter_script_path(None), "null").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_kept_on_request() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("nested").join("out.mp4");
        let ws = RenderWorkspace::create(&output, true).unwrap();
        std::fs::write(ws.batch_output_path(1, "mp4"), b"x").unwrap();
        let kept = ws.finish().unwrap();
        assert!(kept.join("batch_0001.mp4").exists());
        assert!(kept.starts_with(root.path().join("nested")));
    }

    #[test]
    fn test_workspace_kept_on_drop_when_requested() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = RenderWorkspace::create(&root.path().join("o.mp4"), true).unwrap();
            ws.path().to_path_buf()
        };
        assert!(path.exists());
    }

    #[test]
    fn test_finish_without_keep_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let ws = RenderWorkspace::create(&root.path().join("o.mp4"), false).unwrap();
        let path = ws.path().to_path_buf();
        assert_eq!(ws.finish(), None);
        assert!(!path.exists());
    }
}
