extern crate self as esgen;

#[path = "../common.rs"]
mod support;

pub use support::{EventSet, __private, event};

use esgen_macros::EventSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opened {
    pub title: String,
}

#[derive(Debug, EventSet)]
pub enum TicketEvent {
    Opened(Opened),
    #[event(name = "Closed")]
    Resolved,
}

fn main() {
    let event = TicketEvent::from(Opened {
        title: "printer on fire".into(),
    });
    assert_eq!(event.name(), "Opened");
    assert_eq!(TicketEvent::NAMES, ["Opened", "Closed"]);

    let payload = event.to_payload().unwrap();
    let back = TicketEvent::from_payload("Opened", payload).unwrap();
    assert!(matches!(back, TicketEvent::Opened(ref o) if o.title == "printer on fire"));

    let closed = TicketEvent::from_payload("Closed", serde_json::Value::Null).unwrap();
    assert_eq!(closed.name(), "Closed");
    assert!(matches!(
        TicketEvent::from_payload("Reopened", serde_json::Value::Null),
        Err(event::DecodeError::UnknownEvent { .. })
    ));
}
