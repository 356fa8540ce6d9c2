//! HTTP handlers and request plumbing for evcal-sources

pub mod flash;
pub mod format;
pub mod guard;
pub mod health;
pub mod input;
pub mod pages;
pub mod session;
pub mod sources;

pub use flash::{Flash, FlashKind, FlashMessage, FlashStore};
pub use format::Format;
pub use guard::import_guard;
pub use health::health_routes;
pub use session::session_middleware;
