mod credentials;
mod envelope;
mod error;
mod monitor;
mod session;
mod transport;

pub use credentials::*;
pub use envelope::*;
pub use error::*;
pub use monitor::*;
pub use session::*;
pub use transport::*;
