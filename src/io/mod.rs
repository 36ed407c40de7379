pub mod config_io;
pub mod local_coordinator;
pub mod lock;
pub mod store_io;
pub mod watcher;

pub use local_coordinator::LocalCoordinator;
pub use store_io::{Store, StoreError};
