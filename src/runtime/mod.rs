//! Managed runtime resolution and local service supervision.

mod handle;
mod locator;
mod supervisor;

pub use handle::ServiceHandle;
pub use locator::{cached_path, NvmLocator, RuntimeLocator, RuntimeResolver};
pub use supervisor::{port_answers, RuntimeSupervisor, ServiceSpec, ServiceStatus};
