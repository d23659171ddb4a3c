//! Session state shared by the HTTP surface and the operator console
//!
//! Each plane (`sql`, `log`) has its own token space. On the sql plane a
//! session also owns the downstream connection opened at connect time; the
//! token and the connection enter and leave the registry together.

mod plane;
mod registry;
mod token;

pub use plane::{AccessKind, Plane, classify_path};
pub use registry::{PendingSession, Session, SessionManager};
pub use token::{TOKEN_BYTES, generate_token};
