pub mod features;
pub mod snapshot;
pub mod state;

pub use features::FrameFeatures;
pub use snapshot::{round3, GameSnapshot, HandSnapshot};
pub use state::{GameState, HandPosition, SquatDetector, SquatEvent};
