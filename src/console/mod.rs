pub use self::console::*;
mod console;

pub mod crtc;
