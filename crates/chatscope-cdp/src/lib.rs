//! Chrome DevTools Protocol driver.
//!
//! [`CdpPage`] attaches to an already running page target over its
//! DevTools WebSocket URL and implements [`chatscope_core::Locatable`] by
//! evaluating locator paths in the page. Browser startup and target
//! discovery are left to the caller.

pub mod client;
pub mod error;
pub mod page;

pub use client::CdpClient;
pub use error::CdpError;
pub use page::CdpPage;
