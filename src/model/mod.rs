pub mod session;
pub mod state;

pub use session::{Balances, MigrationSession};
pub use state::{ActionOutcome, ControllerState};
