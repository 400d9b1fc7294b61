use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Boxed byte body of an [`Object`].
pub type Body = Box<dyn AsyncRead + Send + Unpin>;

/// Object is the unit exchanged with a [`Storage`](crate::Storage): a readable byte body plus
/// string metadata.
///
/// The body is a stream, so a backend never has to hold a whole blob in memory.
pub struct Object {
    body: Body,
    meta: HashMap<String, String>,
}

impl Object {
    pub fn new(body: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            body: Box::new(body),
            meta: HashMap::new(),
        }
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::new(Cursor::new(data.into()))
    }

    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.meta
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Drain the body into memory.
    pub async fn into_bytes(mut self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.body.read_to_end(&mut data).await?;
        Ok(data)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}
