//! Minimal http/1.x message model: ordered header fields plus request and
//! response heads. Deliberately lenient; only the framing rules the
//! pipeline enforces are checked.

mod errors;
mod fields;
mod message;

pub use errors::*;
pub use fields::Fields;
pub use message::*;
