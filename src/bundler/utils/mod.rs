//! Internal helpers.

pub mod fs;
