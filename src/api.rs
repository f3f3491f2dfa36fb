//! HTTP health surface for the hosting platform.
//!
//! Serves a plain liveness page at `/` and a JSON readiness report at
//! `/status`. The status never blocks and never touches the gateway.

mod server;

pub use server::{StatusResponse, router, start_http_server};
