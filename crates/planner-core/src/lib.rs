pub mod errors;
pub mod ids;
pub mod messages;
pub mod models;

pub use errors::{PlannerError, Result};
pub use ids::{EventId, PlatformId, UserId};
pub use messages::{Inbound, Outbound};
pub use models::{Event, EventDraft, NewEvent, NewUser, User};
