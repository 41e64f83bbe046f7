//! This crate defines the raw [kernel and core-file layouts](format/index.html) for AArch64/Linux
//! register state, as well as the [architectural register numbering](registers/index.html) used by
//! the related crates.
//!
//! You probably don't want to use this crate directly, the [regctx][regctx] crate provides the
//! actual functionality of reconstructing register state using the definitions in this crate.

pub mod format;
pub mod registers;
