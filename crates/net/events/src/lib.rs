//! Typed network event notifications.
//!
//! Two event classes exist: [`EventClass::Phy`] for transceiver lifecycle and
//! link changes, [`EventClass::Ip`] for address assignment. Consumers register
//! one handler per class through [`EventSubstrate`]; [`EventBus`] is the
//! in-process implementation and [`Dispatcher`] runs its delivery thread.

mod bus;
mod dispatcher;
mod event;

pub use bus::{EventBus, EventHandler, EventSubstrate, SubscribeError, SubscribeOutcome};
pub use dispatcher::{DispatchError, Dispatcher, EventSender};
pub use event::{EventClass, NetEvent, raw};
