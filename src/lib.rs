pub mod chain;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod reader;
pub mod session;
pub mod view;

pub use chain::{ChainClient, ChainError, ProviderEvent};
pub use config::MigratorConfig;
pub use controller::MigrationController;
pub use error::MigrationError;
pub use model::{ActionOutcome, ControllerState, MigrationSession};
pub use view::{NextAction, ViewState};
