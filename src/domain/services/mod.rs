mod monitor_store;
pub mod mutations;
mod sentinel;
mod session_manager;
mod signal;

pub use monitor_store::*;
pub use mutations::MonitorDraft;
pub use mutations::Mutations;
pub use sentinel::*;
pub use session_manager::*;
pub use signal::*;
