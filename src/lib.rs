pub mod config;
pub mod controllers;
pub mod error;
pub mod logging;
pub mod models;
pub mod perf;
pub mod server;
pub mod storage;
pub mod testing;
pub mod updates;

pub use config::Config;
pub use error::MazurkaError;
pub use models::{Fortune, World};
pub use storage::WorldStore;
pub use testing::{TestApp, TestClient, TestResponse};
