pub mod experiments;
pub mod graph;
pub mod results;
pub mod throughput;
pub mod util;

pub use experiments::{
    ExperimentError, Execution, Harness, Invocation, NumaHarness, ResultRow, RunConfig, System,
};
pub use graph::{GraphConfig, PivotCollision};

#[ctor::ctor]
fn init_color_backtrace() {
    color_backtrace::install();
}
