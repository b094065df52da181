//! Session persistence
//!
//! # Modules
//!
//! - [`store`] - the session store: write/read/clear over both carriers
//! - [`cookie`] - browser-style cookie jar shared with the HTTP client
//! - [`storage`] - client-side key/value storage backends

pub mod cookie;
pub mod storage;
pub mod store;

pub use cookie::{BrowserCookieJar, USER_INFO_COOKIE};
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
pub use store::{decode_user_info, SessionGate, SessionStore};
