pub mod canvas;
pub mod overlay;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use canvas::Canvas;
pub use overlay::banner_text;
pub use skeleton::SKELETON_CONNECTIONS;
#[cfg(feature = "desktop")]
pub use window::{draw_banner, MinifbRenderer};
