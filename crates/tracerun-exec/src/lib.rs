mod error;
pub use error::{ExecError, ExecResult};

mod capture;
mod util;

#[cfg(feature = "container")]
pub mod container;
#[cfg(feature = "container")]
pub use container::{ContainerEngineConfig, ContainerEngine, PullPolicy};

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    #[cfg(feature = "container")]
    pub use crate::{ContainerEngineConfig, ContainerEngine, PullPolicy};
}
