pub mod cli;
pub mod config;
pub mod error;
pub mod normalize;
pub mod source;
pub mod store;
pub mod sync;

pub use config::Config;
pub use source::{AbsSessionSource, SessionSource};
pub use store::SessionStore;
pub use sync::{StopReason, SyncController, SyncOptions, SyncReport};
