//! JSON configuration of a regression run.

mod adapter;
mod model;
mod report;

pub use adapter::{Adapter, ConfiguredModel};
pub use model::{DataConfig, KernelConfig, RunConfig, TasksConfig};
pub use report::Report;
