//! HTTP transport: router, handlers and response rendering

mod http;
mod response;

pub use http::{BLANK_HEADER, FULL_RESPONSE_HEADER, build_router, run_http};
pub(crate) use response::reject;
