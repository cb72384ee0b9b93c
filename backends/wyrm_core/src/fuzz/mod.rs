//! Randomised decision making: byte mangling, the periodic intensity curve
//! and the per connection fuzz session built on top of them.

pub mod auto_mangle;
pub mod catalog;
pub mod gaussian;
pub mod mangle;
pub mod session;

pub use auto_mangle::AutoMangle;
pub use gaussian::PeriodicGaussian;
pub use mangle::{Mangle, MangleConfig, MangleError, MangleOp, MangleResult};
pub use session::{Codec, CompressType, ConnectionAction, FuzzSession, Fuzzer};
