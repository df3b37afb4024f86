use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::StoreError;
use crate::storage::BlobStore;

/// One file per blob under `root`, named by id.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.html", id))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, reader: &mut (dyn AsyncRead + Unpin + Send)) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let path = self.path(id);
        let mut file = fs::File::create(&path).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.sync_all().await?;
        log::debug!("Stored blob {} ({} bytes) at {}", id, written, path.display());
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        match fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<Uuid, Vec<u8>>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, reader: &mut (dyn AsyncRead + Unpin + Send)) -> Result<Uuid, StoreError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let id = Uuid::new_v4();
        self.blobs.write().await.insert(id, bytes);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.blobs.write().await.remove(&id).is_some())
    }
}
