use crate::{Object, Result, Storage, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Default directory where all objects are stored, can be overwritten via [`FsStorage::new`].
pub const DEFAULT_PATH: &str = ".database";

/// [`Storage`] on the local file system.
///
/// A folder maps to one directory under the base path and an object to one file in it. Object
/// metadata is not persisted, objects read back carry an empty metadata map.
#[derive(Debug)]
pub struct FsStorage {
    base_path: PathBuf,
    closed: AtomicBool,
}

impl FsStorage {
    /// Open the storage rooted at `path`, creating the directory if it does not exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            closed: AtomicBool::new(false),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn folder_path(&self, folder: &str) -> Result<PathBuf> {
        if !folder.is_empty() {
            validate_name(folder)?;
        }
        Ok(self.base_path.join(folder))
    }

    fn object_path(&self, folder: &str, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.folder_path(folder)?.join(name))
    }

    async fn init_folder(&self, folder: &str) -> Result<PathBuf> {
        let path = self.folder_path(folder)?;
        fs::create_dir_all(&path).await?;
        Ok(path)
    }

    async fn write(&self, folder: &str, name: &str, mut object: Object, append: bool) -> Result<()> {
        self.check_open()?;
        self.init_folder(folder).await?;
        let path = self.object_path(folder, name)?;

        let mut file = if append {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?
        } else {
            File::create(&path).await?
        };

        let written = tokio::io::copy(object.body_mut(), &mut file).await?;
        file.flush().await?;

        log::debug!("Wrote {} bytes to {}", written, path.display());
        Ok(())
    }
}

/// A name is a single path component: no separators, no `.` or `..`.
fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        _ => Err(StoreError::InvalidName(name.to_string())),
    }
}

fn not_found(folder: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        folder: folder.to_string(),
        name: name.to_string(),
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn get(&self, folder: &str, name: &str) -> Result<Object> {
        self.check_open()?;
        let path = self.object_path(folder, name)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found(folder, name)),
            Err(err) => return Err(err.into()),
        };

        if file.metadata().await?.is_dir() {
            let msg = format!("{} is a folder", path.display());
            return Err(std::io::Error::new(ErrorKind::Other, msg).into());
        }

        Ok(Object::new(file))
    }

    async fn set(&self, folder: &str, name: &str, object: Object) -> Result<()> {
        self.write(folder, name, object, false).await
    }

    async fn put(&self, folder: &str, name: &str, object: Object) -> Result<()> {
        self.write(folder, name, object, true).await
    }

    async fn delete(&self, folder: &str, name: &str) -> Result<()> {
        self.check_open()?;
        let path = self.object_path(folder, name)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(not_found(folder, name)),
            Err(err) => Err(err.into()),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
