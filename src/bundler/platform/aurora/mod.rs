//! Aurora OS packaging.
//!
//! Produces one RPM per build target by staging the export template, the data
//! pack, icons and extension libraries under `<export path>_buildroot` and
//! running `rpmbuild` inside the target's scratchbox.

pub mod assembler;
pub mod freedesktop;
pub mod layout;
pub mod sign;
pub mod spec;
pub mod template;

pub use assembler::{Assembler, BASE_STEPS, PackageDescriptor, step_count};
pub use layout::StagingLayout;
