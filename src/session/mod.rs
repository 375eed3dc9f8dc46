//! Tenant sessions, the registry that owns them, and the change poller.

pub mod poller;
pub mod registry;
mod session;

pub use poller::{ChangePoller, diff_listing};
pub use registry::{Lifecycle, Registry};
pub use session::Session;
