//! Model fitting.
//!
//! Responsibilities:
//!
//! - build design matrices under either contrast coding
//! - choose between the linear and censored paths from the rule outcomes
//! - fit the double-censored Tobit model by maximum likelihood
//! - fit the ordinary least squares ANCOVA when censoring is negligible

pub mod design;
pub mod linear;
pub mod selection;
pub mod tobit;

pub use design::*;
pub use linear::*;
pub use selection::*;
pub use tobit::*;
