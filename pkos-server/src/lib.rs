pub mod http;
pub mod state;
pub mod subsystems;

pub use state::AppState;
