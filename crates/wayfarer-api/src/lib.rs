//! Wayfarer API crate - axum HTTP surface for conversational offer search.
//!
//! Exposes `POST /chat/suggest` and `GET /health`, with CORS, request
//! tracing, compression and a body size limit.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
