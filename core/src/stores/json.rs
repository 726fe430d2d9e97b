use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use vsh_sdk::{FsError, FsResult, Node, Store};

/// Persists the tree as one JSON document on the host file system.
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so a crash mid-save leaves the previous snapshot intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self) -> FsResult<Option<Node>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FsError::persistence(format!(
                    "{}: {e}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| FsError::persistence(format!("{}: {e}", self.path.display())))
    }

    async fn save(&self, root: &Node) -> FsResult<()> {
        let json = serde_json::to_vec(root).map_err(|e| FsError::persistence(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| FsError::persistence(format!("{}: {e}", dir.display())))?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| FsError::persistence(format!("{}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| FsError::persistence(format!("{}: {e}", self.path.display())))
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
