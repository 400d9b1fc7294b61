use crate::{Object, Result};
use async_trait::async_trait;

/// Interface for blob storage.
///
/// Objects live under a folder namespace and a file name. Folders are created on demand by
/// writes; the empty folder name addresses the storage root.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open an object for reading. Fails with [`StoreError::NotFound`](crate::StoreError) when
    /// nothing is stored under the name.
    async fn get(&self, folder: &str, name: &str) -> Result<Object>;
    /// Create or overwrite an object with the whole body of `object`.
    async fn set(&self, folder: &str, name: &str, object: Object) -> Result<()>;
    /// Append the whole body of `object`, creating the object if it does not exist.
    async fn put(&self, folder: &str, name: &str, object: Object) -> Result<()>;
    async fn delete(&self, folder: &str, name: &str) -> Result<()>;
    async fn close(&self) -> Result<()>;
}
