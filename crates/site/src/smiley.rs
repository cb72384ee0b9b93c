//! Hand written responses behind `/smiley/<name>.gif`. Each one goes out as
//! raw bytes through the fault wrapper and breaks HTTP in its own way.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::sync::OnceLock;
use wyrm_core::extensions::result_ext::IntoBoxedError;
use wyrm_core::server::{Exchange, ServerError, ServerResult};

/// Decompressed size of the gzip bomb.
pub const BOMB_BYTES: usize = 64 * 1024 * 1024;
const BOMB_BLOCK: usize = 1024 * 1024;
const BOMB_CHUNK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smiley {
    MessyChunked,
    OverrunBody,
    ChunkSizeOverflow,
    ChunkedWithLength,
    Utf8HeaderShortClose,
    MessyHeaders,
    BadContentLength,
    NoContent,
    MailtoRedirect,
    BadRedirect,
    Bounce1,
    Bounce2,
    BadUrlRedirect,
    GiantHeaderName,
    GzipBomb,
    EmptyHeader,
    ManyHeaders,
}

impl Smiley {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let smiley = match name {
            "happy3" => Self::MessyChunked,
            "frown1" => Self::OverrunBody,
            "dancing4" => Self::ChunkSizeOverflow,
            "silly3" => Self::ChunkedWithLength,
            "oops" => Self::Utf8HeaderShortClose,
            "stupid4" => Self::MessyHeaders,
            "happy2" => Self::BadContentLength,
            "haha2" => Self::NoContent,
            "smiles1" => Self::MailtoRedirect,
            "happy1" => Self::BadRedirect,
            "bounce1" => Self::Bounce1,
            "bounce2" => Self::Bounce2,
            "cool4" => Self::BadUrlRedirect,
            "jokes2" => Self::GiantHeaderName,
            "surprise" => Self::GzipBomb,
            "confused3" => Self::EmptyHeader,
            "welcome4" => Self::ManyHeaders,
            _ => return None,
        };
        Some(smiley)
    }

    pub async fn play(self, exchange: &mut Exchange<'_>) -> ServerResult<()> {
        tracing::debug!("Playing smiley {:?}", self);

        match self {
            Self::MessyChunked => {
                exchange.write(b"HTTP/1.1 200\r\n").await?;
                exchange.write(b"Transfer-ENCODING: chunked\r\n\r\n").await?;
                exchange.write(b"5 ; horse\nhello\n0007\n world!\n0\n").await?;
                exchange
                    .write(b"Animal: dolphin\r\nCake: delicious\r\n\r\n")
                    .await
            }
            Self::OverrunBody => {
                exchange.write(b"HTTP/1.1\t200\r\n").await?;
                exchange.write(b"Content-Length:\t100\r\n\r\n").await?;
                exchange.write(&[b'A'; 200]).await
            }
            Self::ChunkSizeOverflow => {
                exchange.write(b"HTTP/1.1 200\r\n").await?;
                exchange.write(b"Transfer-Encoding: chunked\r\n\r\n").await?;

                let zeros = vec![b'0'; 10_000];
                for _ in 0..100 {
                    exchange.write(&zeros).await?;
                }
                exchange.write(b"1\r\n").await?;
                exchange.write(b"a\r\n").await?;
                exchange.write(b"0\r\n\r\n").await
            }
            Self::ChunkedWithLength => {
                exchange.write(b"HTTP/1.1 200\r\n").await?;
                exchange.write(b"Transfer-Encoding: chunked\r\n").await?;
                exchange.write(b"Content-Length: 42\r\n\r\n").await?;
                exchange
                    .write(b"5\r\nhello\r\n7\r\n world!\r\n0\r\n\r\n")
                    .await
            }
            Self::Utf8HeaderShortClose => {
                exchange.write(b"HTTP/1.0 200\r\n").await?;
                exchange.write("Emoji: 🐲\r\n".as_bytes()).await?;
                exchange.write(b"Content-Length: 100\r\n\r\n").await?;
                exchange.close().await
            }
            Self::MessyHeaders => {
                let (cyrillic, _, _) = encoding_rs::KOI8_R.encode("K: Кракозябры\r\n");
                let (japanese, _, _) = encoding_rs::SHIFT_JIS.encode("M: 文字化け\r\n");
                let cookie: &[u8] =
                    b"Set-Cookie: \x00?#?+:%ff=hope you have cookies enabled!; expires=Dog\r\n";

                exchange.write(b"HTTP/1.1 200\r\n").await?;
                exchange.write(&cyrillic).await?;
                exchange.write(&japanese).await?;
                exchange.write(b"Oops!\r\n").await?;
                exchange.write(&cookie.repeat(1000)).await?;
                exchange.write(b"Content-Length: -12\r\n").await?;
                exchange.write(b"Set-Cookie: SMAUGYO").await
            }
            Self::BadContentLength => {
                exchange.write(b"HTTP/1.0 200\r\n").await?;
                exchange.write(b"Content-Length: 3.14159\r\n").await
            }
            Self::NoContent => exchange.write(b"HTTP/1.0 204\r\n\r\n").await,
            Self::MailtoRedirect => {
                redirect(exchange, b"302", b"mailto:user@example.com").await
            }
            Self::BadRedirect => redirect(exchange, b"302", b"I'm going to Dragon City!").await,
            Self::Bounce1 => redirect(exchange, b"302", b"bounce2.gif").await,
            Self::Bounce2 => redirect(exchange, b"301", b"bounce1.gif").await,
            Self::BadUrlRedirect => redirect(exchange, b"301", b"http://]/\x00http://").await,
            Self::GiantHeaderName => {
                exchange.write(b"HTTP/1.0 200\r\n").await?;
                let name = vec![b'A'; 10_000];
                for _ in 0..100 {
                    exchange.write(&name).await?;
                }
                exchange.write(b": A\r\n").await?;
                exchange.write(b"Content-Length: 0\r\n\r\n").await
            }
            Self::GzipBomb => {
                let bomb = gzip_bomb().await?;

                exchange
                    .write(b"HTTP/1.1 200 Ha ha ha BWAAH HA HA HA!\r\n")
                    .await?;
                exchange.write(b"Content-Encoding: gzip\r\n").await?;
                exchange.write(b"Transfer-Encoding: chunked\r\n\r\n").await?;

                for chunk in bomb.chunks(BOMB_CHUNK) {
                    exchange
                        .write(format!("{:x}\r\n", chunk.len()).as_bytes())
                        .await?;
                    exchange.write(chunk).await?;
                    exchange.write(b"\r\n").await?;
                }
                exchange.write(b"0\r\n\r\n").await
            }
            Self::EmptyHeader => exchange.write(b"\r\n\r\n").await,
            Self::ManyHeaders => {
                exchange.write(b"HTTP/1.0 200 Headers\r\n").await?;
                for num in 0..10_000 {
                    let lines = format!(
                        "H{num}: A header for me\r\n\
                         H{num} : A header for you\r\n\
                         H{num}  : I have a header\r\n\
                         H{num}   : You have one too\r\n"
                    );
                    exchange.write(lines.as_bytes()).await?;
                }
                exchange.write(b"\r\n").await?;
                exchange.close().await
            }
        }
    }
}

async fn redirect(exchange: &mut Exchange<'_>, status: &[u8], location: &[u8]) -> ServerResult<()> {
    let mut status_line = b"HTTP/1.0 ".to_vec();
    status_line.extend_from_slice(status);
    status_line.extend_from_slice(b"\r\n");

    let mut location_line = b"Location: ".to_vec();
    location_line.extend_from_slice(location);
    location_line.extend_from_slice(b"\r\n");

    exchange.write(&status_line).await?;
    exchange.write(&location_line).await?;
    exchange.write(b"Content-Length: 0\r\n\r\n").await
}

/// Gzip stream of `len` zero bytes.
pub fn gzip_zeros(len: usize) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    let block = vec![0u8; BOMB_BLOCK.min(len)];

    let mut remaining = len;
    while remaining > 0 {
        let take = remaining.min(block.len());
        encoder.write_all(&block[..take])?;
        remaining -= take;
    }
    encoder.finish()
}

static BOMB: OnceLock<Vec<u8>> = OnceLock::new();

/// The bomb is compressed once, off the runtime thread, on first use.
async fn gzip_bomb() -> ServerResult<&'static [u8]> {
    if let Some(bomb) = BOMB.get() {
        return Ok(bomb.as_slice());
    }

    let bomb = tokio::task::spawn_blocking(|| gzip_zeros(BOMB_BYTES))
        .await
        .map_err(|err| ServerError::Internal(err.into_boxed_error()))??;
    tracing::info!("Gzip bomb ready: {} compressed bytes", bomb.len());

    Ok(BOMB.get_or_init(|| bomb).as_slice())
}
