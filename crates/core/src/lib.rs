//! Overlay projection and scene workflow logic for guided video capture.
//!
//! Pure domain code: no I/O and no async. The `client` crate talks to the
//! backend and the `session` crate drives recording sessions on top of
//! these types.

pub mod color;
pub mod error;
pub mod geometry;
pub mod label;
pub mod overlay;
pub mod recording;
pub mod submission;
pub mod template;
pub mod types;
