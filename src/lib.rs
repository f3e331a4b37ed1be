//! Workspace root; see the `shared`, `server` and `client` crates.
