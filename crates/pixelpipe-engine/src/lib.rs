//! pixelpipe engine crate.
//!
//! This crate owns the platform + GPU runtime pieces and the triangle renderer
//! driven by the demo binary.

pub mod device;
pub mod window;
pub mod input;
pub mod core;

pub mod logging;
pub mod render;

mod error;

pub use error::{Error, ShaderStage};
