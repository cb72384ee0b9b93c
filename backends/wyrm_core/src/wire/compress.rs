//! Streaming body compressors, including the deliberately broken ones.

use crate::fuzz::CompressType;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::{self, Write};

const GZIP_LEVEL: u32 = 6;
const ZLIB_HEADER_LEN: usize = 2;
const TRAILER_LEN: usize = 4;
const BROKEN_TRAILER: [u8; TRAILER_LEN] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Incremental encoder: [`Compressor::write`] returns whatever bytes are
/// ready to go out, [`Compressor::close`] flushes the rest.
pub enum Compressor {
    Gzip(GzEncoder<Vec<u8>>),
    GzipBroken(GzEncoder<Vec<u8>>),
    Deflate(ZlibEncoder<Vec<u8>>),
    RawDeflate {
        encoder: ZlibEncoder<Vec<u8>>,
        header_left: usize,
    },
}

impl core::fmt::Debug for Compressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gzip(_) => "Gzip",
            Self::GzipBroken(_) => "GzipBroken",
            Self::Deflate(_) => "Deflate",
            Self::RawDeflate { .. } => "RawDeflate",
        };
        f.debug_tuple("Compressor").field(&name).finish()
    }
}

fn gzip() -> GzEncoder<Vec<u8>> {
    GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL))
}

fn zlib() -> ZlibEncoder<Vec<u8>> {
    ZlibEncoder::new(Vec::new(), Compression::default())
}

impl Compressor {
    /// `None` for [`CompressType::NotGzip`], which only lies in the header.
    #[must_use]
    pub fn for_type(compress_type: CompressType) -> Option<Self> {
        match compress_type {
            CompressType::Gzip => Some(Self::Gzip(gzip())),
            CompressType::GzipBroken => Some(Self::GzipBroken(gzip())),
            CompressType::Deflate => Some(Self::Deflate(zlib())),
            CompressType::RawDeflate => Some(Self::RawDeflate {
                encoder: zlib(),
                header_left: ZLIB_HEADER_LEN,
            }),
            CompressType::NotGzip => None,
        }
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(encoder) | Self::GzipBroken(encoder) => {
                encoder.write_all(data)?;
                Ok(std::mem::take(encoder.get_mut()))
            }
            Self::Deflate(encoder) => {
                encoder.write_all(data)?;
                Ok(std::mem::take(encoder.get_mut()))
            }
            Self::RawDeflate {
                encoder,
                header_left,
            } => {
                encoder.write_all(data)?;
                let mut out = std::mem::take(encoder.get_mut());
                strip_front(&mut out, header_left);
                Ok(out)
            }
        }
    }

    pub fn close(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(encoder) => encoder.finish(),
            Self::GzipBroken(encoder) => {
                let mut out = encoder.finish()?;
                let start = out.len().saturating_sub(TRAILER_LEN);
                let end = out.len();
                out.splice(start..end, BROKEN_TRAILER);
                Ok(out)
            }
            Self::Deflate(encoder) => encoder.finish(),
            Self::RawDeflate {
                encoder,
                mut header_left,
            } => {
                let mut out = encoder.finish()?;
                strip_front(&mut out, &mut header_left);
                out.truncate(out.len().saturating_sub(TRAILER_LEN));
                Ok(out)
            }
        }
    }
}

fn strip_front(out: &mut Vec<u8>, left: &mut usize) {
    let count = (*left).min(out.len());
    out.drain(..count);
    *left -= count;
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
    use std::io::Read;

    fn body() -> Vec<u8> {
        b"<html><body>Smaug was here</body></html>\n".repeat(200)
    }

    fn compress(compress_type: CompressType, chunks: &[&[u8]]) -> Vec<u8> {
        let mut compressor = Compressor::for_type(compress_type).expect("real compressor");
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(compressor.write(chunk).expect("write"));
        }
        out.extend(compressor.close().expect("close"));
        out
    }

    #[test]
    fn gzip_decodes() {
        let data = body();
        let (head, tail) = data.split_at(1000);
        let encoded = compress(CompressType::Gzip, &[head, tail]);

        let mut decoded = Vec::new();
        GzDecoder::new(encoded.as_slice())
            .read_to_end(&mut decoded)
            .expect("valid gzip");
        assert_eq!(decoded, data);
    }

    #[test]
    fn broken_gzip_has_poisoned_trailer() {
        let data = body();
        let encoded = compress(CompressType::GzipBroken, &[&data]);
        assert_eq!(&encoded[encoded.len() - 4..], &BROKEN_TRAILER);

        let mut decoded = Vec::new();
        assert!(GzDecoder::new(encoded.as_slice())
            .read_to_end(&mut decoded)
            .is_err());
    }

    #[test]
    fn deflate_is_zlib_wrapped() {
        let data = body();
        let encoded = compress(CompressType::Deflate, &[&data]);

        let mut decoded = Vec::new();
        ZlibDecoder::new(encoded.as_slice())
            .read_to_end(&mut decoded)
            .expect("valid zlib");
        assert_eq!(decoded, data);
    }

    #[test]
    fn raw_deflate_decodes_with_raw_inflater() {
        let data = body();
        let (head, tail) = data.split_at(17);
        let encoded = compress(CompressType::RawDeflate, &[head, tail]);
        let zlib = compress(CompressType::Deflate, &[head, tail]);
        assert_eq!(encoded.len(), zlib.len() - ZLIB_HEADER_LEN - TRAILER_LEN);

        let mut decoded = Vec::new();
        DeflateDecoder::new(encoded.as_slice())
            .read_to_end(&mut decoded)
            .expect("valid raw deflate");
        assert_eq!(decoded, data);
    }

    #[test]
    fn not_gzip_has_no_compressor() {
        assert!(Compressor::for_type(CompressType::NotGzip).is_none());
        assert_eq!(CompressType::NotGzip.content_encoding(), b"gzip");
        assert_eq!(CompressType::RawDeflate.content_encoding(), b"deflate");
    }
}
