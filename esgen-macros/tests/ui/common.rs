pub trait EventSet: Sized {
    const NAMES: &'static [&'static str];

    fn name(&self) -> &'static str;
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;
    fn from_payload(name: &str, payload: serde_json::Value) -> Result<Self, event::DecodeError>;
}

pub mod event {
    #[derive(Debug)]
    pub enum DecodeError {
        UnknownEvent {
            name: String,
            expected: &'static [&'static str],
        },
        Payload(serde_json::Error),
    }
}

pub mod __private {
    pub use serde_json;
}
