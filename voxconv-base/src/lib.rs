//! This library is an internal component of [`voxconv`],
//! which defines some core mathematical types and functions.
//! Do not depend on this library; use only [`voxconv`] instead.
//!
//! [`voxconv`]: ../voxconv/index.html

#![no_std]
// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    warn(clippy::std_instead_of_core, clippy::std_instead_of_alloc)
)]

#[cfg(test)]
#[macro_use]
extern crate std;

/// Do not use this module directly; its contents are re-exported from `voxconv`.
pub mod math;

// reexport for convenience of our tests
#[doc(hidden)]
pub use euclid;
