//! CLI command implementations.

mod device;

pub mod analyze;
pub mod build_dataset;
pub mod train;

pub use device::init_device;
