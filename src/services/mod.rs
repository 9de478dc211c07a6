// Castway Services
// Session orchestration layer

mod api_client;
mod connector;
mod events;
mod reconciler;
mod session;

pub use api_client::*;
pub use connector::*;
pub use events::*;
pub use reconciler::*;
pub use session::*;
