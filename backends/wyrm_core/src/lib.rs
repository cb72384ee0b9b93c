//! Core of the wyrm adversarial http server: the fuzzing engine, the byte
//! mangler, the hand-rolled http/1.x message model and the connection
//! pipeline that ties them together.

pub mod extensions;
pub mod fuzz;
pub mod server;
pub mod wire;
