pub mod landmark;
#[cfg(feature = "desktop")]
pub mod landmarker;
#[cfg(feature = "desktop")]
pub mod preprocess;
pub mod slot;

pub use landmark::{Landmark, LandmarkIndex, PoseLandmarks};
#[cfg(feature = "desktop")]
pub use landmarker::{AsyncLandmarker, BlazePoseEstimator, PoseEstimator};
#[cfg(feature = "desktop")]
pub use preprocess::{preprocess_for_blazepose, LetterboxInfo};
pub use slot::LandmarkSlot;
