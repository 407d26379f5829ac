//! Session registry and event dispatcher.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{Dispatcher, commands};
pub use registry::{SessionGuard, SessionRegistry};
