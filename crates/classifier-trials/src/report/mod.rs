pub mod plots;
pub mod report;

pub use report::{LogReporter, NullReporter, Reporter, StdoutReporter};
