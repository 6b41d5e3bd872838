//! In-process publish/subscribe bus shared by the host and every mounted
//! remote application.
//!
//! Listeners are registered per topic name and invoked synchronously, in
//! registration order, on the emitting thread:
//!
//! ```rust,ignore
//! use microfront_bus::{event_bus, BusEvent, Listener, OpenChat, OPEN_CHAT};
//!
//! let listener = Listener::new(|event| {
//!     if let BusEvent::OpenChat(detail) = event {
//!         println!("chat opened: {}", detail.message_or_default());
//!     }
//!     Ok(())
//! });
//! event_bus().on(OPEN_CHAT, &listener);
//! event_bus().emit(&BusEvent::OpenChat(OpenChat::message("hi")))?;
//! event_bus().off(OPEN_CHAT, &listener);
//! ```

mod bus;
mod error;
mod events;

pub use bus::*;
pub use error::{BusError, BusResult};
pub use events::*;
