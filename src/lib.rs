//! Easy Slide: turn an uploaded markdown document into a reveal.js deck.
//!
//! Two delivery modes share the same upload surface:
//!
//! - **static**: the document is segmented ([`deck`]) and rendered ([`render`])
//!   into a self-contained `index.html` that is served from disk.
//! - **proxy**: the document is written for an external rendering server
//!   (`reveal-md` by default) owned by the [`supervisor`]; every other request
//!   is forwarded to it through the [`proxy`].

pub mod api;
pub mod config;
pub mod deck;
pub mod proxy;
pub mod render;
pub mod store;
pub mod supervisor;
