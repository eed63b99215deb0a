extern crate self as esgen;

#[path = "../common.rs"]
mod support;

pub use support::{EventSet, __private, event};

use esgen_macros::EventSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Created {
    pub id: u64,
}

// Without `From<Label>`, the two label variants don't conflict.
#[derive(Debug, EventSet)]
pub enum ItemEvent {
    Created(Created),
    Renamed(Label),
    Relabeled(Label),
}

impl From<Label> for ItemEvent {
    fn from(label: Label) -> Self {
        Self::Renamed(label)
    }
}

fn main() {
    let event: ItemEvent = Created { id: 7 }.into();
    assert_eq!(event.name(), "Created");
    let event: ItemEvent = Label("new".into()).into();
    assert_eq!(event.name(), "Renamed");
}
