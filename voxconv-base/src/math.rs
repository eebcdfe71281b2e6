//! Mathematical utilities and decisions.

mod color;
pub use color::*;
mod coord;
pub use coord::*;
mod region;
pub use region::*;

// We make an assumption in several places that `usize` is at least 32 bits.
// It's likely that compilation would not succeed anyway, but let's make it explicit.
#[cfg(target_pointer_width = "16")]
compile_error!("voxconv does not support platforms with less than 32-bit `usize`");
