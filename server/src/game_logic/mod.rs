pub mod error;
pub mod grid;
pub mod normalize;
pub mod state;

pub use error::GameError;
pub use grid::{GridFrame, GridView};
pub use normalize::normalize;
pub use state::{DisplayDelta, GridDisplay, GuessOutcome, SessionState};
