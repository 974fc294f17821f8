//! Public data model for instrumented task runs.
//!
//! These types are shared by the runner, the engine backends and the binaries.
//! They carry no behaviour beyond validation and small state helpers.

mod error;
pub use error::ModelError;

mod kv;
pub use kv::KeyValue;

mod task_env;
pub use task_env::TaskEnv;

mod task_spec;
pub use task_spec::TaskSpec;

mod task_status;
pub use task_status::TaskStatus;

mod run_config;
pub use run_config::RunConfig;

/// Reference to the base environment a task runs in (e.g. `"alpine:latest"`).
pub type BaseRef = String;
