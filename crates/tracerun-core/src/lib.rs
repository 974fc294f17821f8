pub mod engine;
pub use engine::{Connection, ConnectionGuard, Engine, TaskBuilder, TaskOutput};

pub mod error;
pub use error::{EngineError, TaskRunError};

pub mod runner;
pub use runner::{ExitOutcome, TaskRunner};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod util;

pub mod prelude {
    pub use crate::{
        ConnectionGuard, Engine, EngineError, ExitOutcome, TaskRunError, TaskRunner,
    };
    pub use tokio_util::sync::CancellationToken;
}
