//! Connection handling: request pipeline, routing, the response lifecycle
//! and the restartable accept loop.

mod errors;
pub mod exchange;
pub mod listener;
pub mod pipeline;
pub mod restart;
pub mod router;

pub use errors::*;
pub use exchange::{Exchange, Flow, NO_HEADERS};
pub use listener::Server;
pub use restart::RestartPolicy;
pub use router::{Handler, RouteMatch, Router};
