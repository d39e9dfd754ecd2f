pub mod cli;
pub mod config;
pub mod services;
pub mod session;
pub mod vsphere;

pub mod prelude {
    pub use crate::config::{Config, FailurePolicy, WorkflowEnv};
    pub use crate::services::refresh::{Outcome, RunReport};
    pub use crate::vsphere::Vsphere;
    pub use vmtools_common::prelude::{Error, Result};
}
