//! Sessio Events
//!
//! Synchronous publish/subscribe for lifecycle points. A publication wraps an
//! action: `Before` listeners run first and may adjust the event params the
//! action reads, then the action runs, then `After` listeners run if the
//! action succeeded. Listeners can never skip the action itself.

mod event;
mod publisher;

pub use event::Event;
pub use publisher::{Listener, Phase, Publisher};
