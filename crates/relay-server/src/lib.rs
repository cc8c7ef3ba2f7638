pub mod relay;
pub mod server;
pub mod session;
pub mod transport;

pub use relay::{RelayHandler, TurnError, TurnOutcome};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
pub use session::{Session, SessionStatus};
pub use transport::{FrameTransport, TransportError};
