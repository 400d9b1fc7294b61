pub mod config;
pub mod error;
pub mod liveness;
pub mod packet;
pub mod peer;
pub mod server;
pub mod transport;

pub use blobnet_store as store;
pub use error::Error;
pub use packet::{Packet, PacketEvent, PacketReader};
pub use peer::{Direction, Peer};
pub use server::{FileServer, FileServerOptions};
pub use transport::{TcpOptions, TcpTransport, Transport};

/// Payload size of a single packet read.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

pub type Result<T> = std::result::Result<T, error::Error>;
