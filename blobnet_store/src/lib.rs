pub mod error;
pub mod fs;
pub mod object;
pub mod storage;

pub use error::{Result, StoreError};
pub use fs::FsStorage;
pub use object::Object;
pub use storage::Storage;
