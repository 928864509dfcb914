//! Domain models for the serolab system.

mod evaluation;
mod guide;
mod report;

pub use evaluation::*;
pub use guide::*;
pub use report::*;
