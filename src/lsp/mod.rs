//! LSP server exposing decider and experiment completion and hover.
//!
//! Completion items are cheap; ramp data and documentation are filled in on
//! `completionItem/resolve`. The `deciderLens.refresh` command reloads the cache.

mod server;

pub use server::{serve_stdio, REFRESH_COMMAND};
