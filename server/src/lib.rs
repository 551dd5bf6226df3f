pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use error::{AppError, AppResult, StartupError};
pub use routes::build_router;
pub use state::AppState;
