//! Output generation for the one-shot CLI mode.
//!
//! - [`json`]: writes a [`NewsDigest`](crate::models::NewsDigest) to a dated JSON file

pub mod json;
