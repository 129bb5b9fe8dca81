use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use responder_core::{Asset, CoreError};
use tracing::debug;

/// Resolves a variant's image reference to bytes ready for upload.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn load(&self, image_ref: &str) -> Result<Asset, CoreError>;
}

/// Images stored as files under one directory. References are relative
/// file names; anything escaping the directory is rejected.
#[derive(Debug, Clone)]
pub struct LocalAssetDir {
    root: PathBuf,
}

impl LocalAssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, image_ref: &str) -> Result<PathBuf, CoreError> {
        let relative = Path::new(image_ref);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if image_ref.is_empty() || escapes {
            return Err(CoreError::InvalidInput {
                message: format!("image reference {image_ref:?} is not a plain relative path"),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetSource for LocalAssetDir {
    async fn load(&self, image_ref: &str) -> Result<Asset, CoreError> {
        let path = self.resolve(image_ref)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::NotFound {
                    resource: path.display().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        debug!("Loaded asset {} ({} bytes, {})", path.display(), bytes.len(), mime_type);

        Ok(Asset { bytes, mime_type })
    }
}

/// Fixed set of assets held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    assets: HashMap<String, Asset>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, image_ref: impl Into<String>, asset: Asset) -> Self {
        self.assets.insert(image_ref.into(), asset);
        self
    }
}

#[async_trait]
impl AssetSource for InMemoryAssets {
    async fn load(&self, image_ref: &str) -> Result<Asset, CoreError> {
        self.assets
            .get(image_ref)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                resource: image_ref.to_string(),
            })
    }
}
