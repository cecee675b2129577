//! HTTP surface.
//!
//! `/templates`, `/templates/sheet-id`, and `/extract` are protected by the
//! bearer auth middleware; `/health` is public. Handlers are thin: they
//! parse the request and hand it to `SurveyService` on the blocking pool.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use types::ApiContext;
