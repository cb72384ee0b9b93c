use crate::extensions::result_ext::BoxedError;
use crate::wire::simple_http::{HttpError, ProtocolError};
use derive_more::From;
use std::io;

pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Why a connection stopped being served.
#[derive(From, Debug)]
pub enum ServerError {
    /// Client mistake, answered with a `400`.
    Protocol(ProtocolError),

    /// Peer went away or sent a truncated message.
    CloseConnection,

    Io(io::Error),

    #[from(ignore)]
    Internal(BoxedError),
}

impl From<HttpError> for ServerError {
    fn from(err: HttpError) -> Self {
        Self::Protocol(ProtocolError::BadHead(err))
    }
}

impl ServerError {
    /// Errors that only mean the peer is gone and need no reporting.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::CloseConnection => true,
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

impl std::error::Error for ServerError {}

impl core::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
