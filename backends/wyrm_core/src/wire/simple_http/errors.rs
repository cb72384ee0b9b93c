use derive_more::From;

pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Raised when a request or response head cannot be parsed.
#[derive(From, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[from(ignore)]
    InvalidRequestLine(String),

    #[from(ignore)]
    InvalidResponseLine(String),

    #[from(ignore)]
    InvalidStatus(String),

    #[from(ignore)]
    InvalidHeaderLine(String),

    EmptyHead,
}

impl std::error::Error for HttpError {}

impl core::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Client mistakes answered with a `400` carrying [`ProtocolError::message`].
#[derive(From, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    HeaderTooLong,
    NoHeader,
    BadContentLength,
    NegativeContentLength,
    ContentLengthTooBig,
    BadPath,
    BadHead(HttpError),
}

impl ProtocolError {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::HeaderTooLong => "Header too long",
            Self::NoHeader => "No header.",
            Self::BadContentLength => "Bad content length",
            Self::NegativeContentLength => "Negative content length",
            Self::ContentLengthTooBig => "Content length too big",
            Self::BadPath => "Bad path",
            Self::BadHead(_) => "Bad request",
        }
    }
}

impl std::error::Error for ProtocolError {}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
