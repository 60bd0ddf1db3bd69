pub mod command;
pub mod identity;
pub mod replies;
pub mod router;
pub mod runtime;
pub mod transport;

pub use identity::IdentityResolver;
pub use router::CommandRouter;
pub use runtime::{RunSummary, Runtime};
pub use transport::{TelegramConfig, TelegramTransport, Transport, TransportError};
