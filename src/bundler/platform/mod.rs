//! Target platform packaging.
//!
//! | Platform | Package | Module |
//! |----------|---------|--------|
//! | Aurora OS | .rpm | [`aurora`] |

pub mod aurora;
