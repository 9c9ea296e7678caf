use axum::response::sse::Event;
use serde::Serialize;
use serde_json::json;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Payload of an `error` event. SSE cannot change the HTTP status once headers
/// are sent, so the status travels inside the event instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorData {
    pub message: String,
    pub status: u16,
}

/// The single terminal event written to a one-shot stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Already serialized JSON, so struct field order survives onto the wire.
    Result(String),
    Error(ErrorData),
}

impl Envelope {
    pub fn result<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(json) => Envelope::Result(json),
            Err(e) => Envelope::error(format!("Failed to serialize result: {e}"), 500),
        }
    }

    pub fn error(message: impl Into<String>, status: u16) -> Self {
        Envelope::Error(ErrorData {
            message: message.into(),
            status,
        })
    }

    /// JSON text written after `data:`.
    pub fn data(&self) -> String {
        match self {
            Envelope::Result(json) => json.clone(),
            Envelope::Error(ErrorData { message, status }) => {
                json!({ "message": message, "status": status }).to_string()
            }
        }
    }

    pub fn into_event(self) -> Event {
        Event::default().event(self.event_type()).data(self.data())
    }
}

impl EventType for Envelope {
    fn event_type(&self) -> &'static str {
        match self {
            Envelope::Result(_) => "result",
            Envelope::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[derive(Serialize)]
    struct Counts {
        nodes: u64,
        edges: u64,
    }

    #[test]
    fn result_envelope_keeps_payload_field_order() {
        let envelope = Envelope::result(&Counts { nodes: 3, edges: 2 });

        assert_eq!(envelope.event_type(), "result");
        assert_eq!(envelope.data(), r#"{"nodes":3,"edges":2}"#);
    }

    #[test]
    fn error_envelope_carries_message_and_status() {
        let envelope = Envelope::error("Graph not found", 400);

        assert_eq!(envelope.event_type(), "error");
        let data: Value = serde_json::from_str(&envelope.data()).unwrap();
        assert_eq!(data, json!({ "message": "Graph not found", "status": 400 }));
    }
}
