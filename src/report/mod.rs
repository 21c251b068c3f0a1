//! Reporting: residual diagnostics, inference tables and formatted output.

pub mod format;
pub mod inference;
pub mod residuals;

pub use format::*;
pub use inference::*;
pub use residuals::*;
