//! Workspace root for the snake duel server.
//!
//! The runnable pieces live in the `server` crate and the wire format in
//! `shared`; this package only hosts the cross-crate tests under `tests/`.
