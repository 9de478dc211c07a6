// Castway Models
// Data structures for the session controller

mod platform;
mod playback;
mod session;

pub use platform::*;
pub use playback::*;
pub use session::*;
