//! Order lifecycle module for the order management system.
//!
//! This module contains the pure logic of the order lifecycle: the status
//! state machine defining legal transitions, and the preparation timer that
//! derives courier alerts from stored timestamps. Neither touches storage;
//! both are evaluated on demand by their callers.

pub mod machine;
pub mod timer;

pub use machine::{transition, LifecycleError, OrderAction, TransitionPolicy};
pub use timer::{
	imminent_alert, preventive_alert, ready_at, time_remaining, ImminentAlert, PreventiveAlert,
};
