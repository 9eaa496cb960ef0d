//! Object-store client over a local directory tree.
//!
//! The "bucket" is the root directory and keys are `/`-separated paths
//! relative to it. Continuation tokens are the last key of the previous page.

use super::{BackendError, BackendResult, ObjectPage, ObjectStoreClient, ObjectSummary};
use crate::models::TagSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct LocalDirectoryClient {
    follow_hidden: bool,
}

impl LocalDirectoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also list dot-files and dot-directories
    pub fn include_hidden(mut self) -> Self {
        self.follow_hidden = true;
        self
    }

    async fn walk(&self, root: &Path) -> BackendResult<Vec<ObjectSummary>> {
        let bucket = root.display().to_string();
        let mut objects = Vec::new();
        let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let location = dir.display().to_string();
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| BackendError::from_io(&bucket, &location, &e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| BackendError::from_io(&bucket, &location, &e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') && !self.follow_hidden {
                    continue;
                }

                let path = entry.path();
                let metadata = match tokio::fs::metadata(&path).await {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        // Dangling symlinks and races with deletion
                        tracing::debug!(path = %path.display(), error = %err, "Skipping unreadable entry");
                        continue;
                    }
                };

                if metadata.is_dir() {
                    pending.push(path);
                } else if metadata.is_file() {
                    let Some(key) = relative_key(root, &path) else {
                        continue;
                    };
                    objects.push(ObjectSummary {
                        key,
                        size: metadata.len(),
                        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                        storage_class: Some("STANDARD".to_string()),
                    });
                }
            }
        }

        Ok(objects)
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[async_trait]
impl ObjectStoreClient for LocalDirectoryClient {
    fn scheme(&self) -> &str {
        "file"
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> BackendResult<ObjectPage> {
        let mut objects = self.walk(Path::new(bucket)).await?;
        objects.retain(|o| o.key.starts_with(prefix));
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        let start = match continuation.as_deref() {
            Some(after) => objects.partition_point(|o| o.key.as_str() <= after),
            None => 0,
        };
        let end = (start + max_keys.max(1)).min(objects.len());
        let next_token = (end < objects.len()).then(|| objects[end - 1].key.clone());

        Ok(ObjectPage {
            objects: objects.drain(start..end).collect(),
            next_token,
        })
    }

    /// Plain files carry no tags
    async fn get_object_tags(
        &self,
        _bucket: &str,
        _keys: &[String],
    ) -> BackendResult<HashMap<String, TagSet>> {
        Ok(HashMap::new())
    }
}
