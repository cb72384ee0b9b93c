use crate::fuzz::auto_mangle::AutoMangle;
use crate::fuzz::catalog::{
    codec_alias, declared_name, CHARSET_DECLARATIONS, CODEC_NAMES, DEFAULT_DOCTYPE, DOCTYPES,
};
use crate::fuzz::gaussian::PeriodicGaussian;
use crate::fuzz::mangle::{Mangle, MangleConfig, MangleResult};
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_PERIOD: u64 = 1000;

/// Only every n-th session has its outbound bytes mangled.
pub const MANGLE_EVERY: u64 = 5;

pub const HANG_MIN_SECS: f64 = 0.1;
pub const HANG_MAX_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    Close,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressType {
    Gzip,
    /// Claims gzip, sends identity bytes.
    NotGzip,
    /// Gzip with a corrupted crc/length trailer.
    GzipBroken,
    Deflate,
    /// Zlib stream with its header and checksum chopped off.
    RawDeflate,
}

impl CompressType {
    pub const ALL: [CompressType; 5] = [
        Self::Gzip,
        Self::NotGzip,
        Self::GzipBroken,
        Self::Deflate,
        Self::RawDeflate,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::NotGzip => "not_gzip",
            Self::GzipBroken => "gzip_broken",
            Self::Deflate => "deflate",
            Self::RawDeflate => "raw_deflate",
        }
    }

    /// Value advertised in the `Content-Encoding` header.
    #[must_use]
    pub fn content_encoding(&self) -> &'static [u8] {
        match self {
            Self::Gzip | Self::NotGzip | Self::GzipBroken => b"gzip",
            Self::Deflate | Self::RawDeflate => b"deflate",
        }
    }
}

/// Encoding actually used for a body, and the name it is declared under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    pub codec: &'static str,
    pub declared: String,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            codec: "utf-8",
            declared: "UTF-8".into(),
        }
    }
}

/// Samples a triangular distribution over `[low, high]` with `mode` clamped
/// into that range.
pub fn triangular<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64, mode: f64) -> f64 {
    if high <= low {
        return low;
    }

    let mut u: f64 = rng.random();
    let mut c = (mode.clamp(low, high) - low) / (high - low);
    let (mut low, mut high) = (low, high);

    if u > c {
        u = 1.0 - u;
        c = 1.0 - c;
        std::mem::swap(&mut low, &mut high);
    }

    low + (high - low) * (u * c).sqrt()
}

#[derive(Debug)]
struct FuzzState {
    rng: ChaCha8Rng,
    mangle_config: MangleConfig,
    auto_mangle: AutoMangle,
}

type SharedFuzzState = Arc<Mutex<FuzzState>>;

fn lock_state(state: &SharedFuzzState) -> MutexGuard<'_, FuzzState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process wide source of [`FuzzSession`]s.
///
/// Holds the seeded random stream and the mutation policy every session
/// shares, plus the session counter that drives the periodic intensity.
/// Outlives listener restarts so a campaign keeps walking the same
/// sequence.
#[derive(Debug)]
pub struct Fuzzer {
    state: SharedFuzzState,
    threshold_func: PeriodicGaussian,
    counter: AtomicU64,
}

impl Default for Fuzzer {
    fn default() -> Self {
        Self::new(DEFAULT_SEED, DEFAULT_PERIOD)
    }
}

impl Fuzzer {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(seed: u64, period: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(FuzzState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                mangle_config: MangleConfig::default(),
                auto_mangle: AutoMangle::default(),
            })),
            threshold_func: PeriodicGaussian::new(period.max(1) as f64),
            counter: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn set_counter(&self, value: u64) {
        self.counter.store(value, Ordering::SeqCst);
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn threshold_at(&self, counter: u64) -> f64 {
        self.threshold_func.value(counter as f64)
    }

    pub fn session(&self) -> FuzzSession {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst);
        FuzzSession {
            state: self.state.clone(),
            threshold: self.threshold_at(counter),
            counter,
        }
    }
}

/// Decision context bound to one connection for its whole life.
#[derive(Debug, Clone)]
pub struct FuzzSession {
    state: SharedFuzzState,
    threshold: f64,
    counter: u64,
}

impl FuzzSession {
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        let mut state = lock_state(&self.state);
        f(&mut state.rng)
    }

    pub fn connection_action(&self) -> Option<ConnectionAction> {
        let threshold = self.threshold;
        self.with_rng(|rng| {
            if rng.random::<f64>() >= threshold * 0.05 {
                return None;
            }

            if rng.random_bool(0.5) {
                Some(ConnectionAction::Close)
            } else {
                Some(ConnectionAction::Reset)
            }
        })
    }

    pub fn hang_time(&self) -> Option<Duration> {
        let threshold = self.threshold;
        self.with_rng(|rng| {
            if rng.random::<f64>() >= threshold {
                return None;
            }

            let secs = triangular(rng, HANG_MIN_SECS, HANG_MAX_SECS, 0.0);
            Some(Duration::from_secs_f64(secs))
        })
    }

    /// `requested` is the raw `Accept-Encoding` value, empty when absent.
    pub fn compress_type(&self, requested: &str) -> Option<CompressType> {
        let threshold = self.threshold;
        self.with_rng(|rng| {
            let rand_val: f64 = rng.random();

            if requested.is_empty() && rand_val >= threshold {
                return None;
            }

            if threshold > 0.5 {
                CompressType::ALL.choose(rng).copied()
            } else if requested.is_empty() || requested.contains("gzip") {
                Some(CompressType::Gzip)
            } else {
                Some(CompressType::Deflate)
            }
        })
    }

    /// Mangles `data` on every [`MANGLE_EVERY`]-th session, otherwise hands
    /// it back untouched.
    pub fn mangle(&self, data: Vec<u8>) -> MangleResult<Vec<u8>> {
        if self.counter % MANGLE_EVERY != 0 {
            return Ok(data);
        }

        let mut guard = lock_state(&self.state);
        let FuzzState {
            rng,
            mangle_config,
            auto_mangle,
        } = &mut *guard;

        auto_mangle.aggressivity = self.threshold * 0.75;
        auto_mangle.setup_conf(mangle_config, data.len());

        let mut mangler = Mangle::new(mangle_config, rng, data);
        let count = mangler.run()?;
        if count > 0 {
            tracing::debug!("Mangled outbound data with {} operations", count);
        }
        Ok(mangler.into_inner())
    }

    pub fn codec(&self) -> Codec {
        let threshold = self.threshold;
        self.with_rng(|rng| {
            if rng.random::<f64>() >= 0.25 {
                return Codec::default();
            }

            let codec = CODEC_NAMES.choose(rng).copied().unwrap_or("utf-8");

            let declared_codec = if rng.random::<f64>() < threshold {
                CODEC_NAMES.choose(rng).copied().unwrap_or(codec)
            } else {
                codec
            };

            let mut declared = declared_name(declared_codec);
            if let Some(alias) = codec_alias(declared_codec) {
                if rng.random::<f64>() < threshold {
                    declared = declared_name(alias);
                }
            }

            Codec { codec, declared }
        })
    }

    pub fn charset(&self) -> &'static str {
        self.with_rng(|rng| CHARSET_DECLARATIONS.choose(rng).copied().unwrap_or(""))
    }

    pub fn doctype(&self) -> &'static str {
        self.with_rng(|rng| {
            if rng.random::<f64>() < 0.5 {
                DOCTYPES.choose(rng).copied().unwrap_or(DEFAULT_DOCTYPE)
            } else {
                DEFAULT_DOCTYPE
            }
        })
    }
}
