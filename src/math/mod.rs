//! Mathematical utilities: stable normal-distribution functions and least squares.

pub mod normal;
pub mod ols;

pub use normal::*;
pub use ols::*;
