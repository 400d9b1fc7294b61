use blobnet_store::StoreError;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was closed deliberately.
    #[error("transport closed")]
    Closed,

    #[error("invalid handshake with {0}")]
    InvalidHandshake(SocketAddr),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("peer {0} is already registered")]
    DuplicatePeer(SocketAddr),

    #[error("peer {0} is not registered")]
    UnknownPeer(SocketAddr),

    #[error("transport is already accepting connections")]
    AlreadyListening,

    #[error("dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: Box<Error>,
    },

    #[error("storage: {0}")]
    Storage(#[from] StoreError),

    #[error("{}", Joined(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Fold a list of errors into one result.
    ///
    /// No errors is `Ok`, a single error is returned as is and anything more becomes
    /// [`Error::Multiple`].
    pub fn join(mut errors: Vec<Error>) -> crate::Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }

    /// Every leaf error, with nested [`Error::Multiple`] flattened.
    pub fn errors(&self) -> Vec<&Error> {
        match self {
            Error::Multiple(errors) => errors.iter().flat_map(Error::errors).collect(),
            err => vec![err],
        }
    }
}

struct Joined<'a>(&'a [Error]);

impl fmt::Display for Joined<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
