pub mod portfolio;
pub mod settings;
pub mod state;
pub mod trade;

pub use portfolio::*;
pub use settings::*;
pub use state::*;
pub use trade::*;
