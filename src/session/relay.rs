//! Payload forwarding between paired endpoints.
//!
//! Payloads are forwarded verbatim. The counterpart is looked up fresh for
//! every message so a replaced endpoint is never written to after eviction.
//! Delivery is best-effort: no queueing for absent counterparts, no retry,
//! and no feedback to the sender.

// ============================================================================
// Imports
// ============================================================================

use serde::de::IgnoredAny;
use serde_json::from_str;
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{VideoFrame, VideoPacket};

use super::endpoint::Endpoint;
use super::hub::Hub;

// ============================================================================
// Hub - Relay
// ============================================================================

impl Hub {
    /// Forwards a payload from `sender` to its counterpart.
    ///
    /// Only text and binary messages are payloads; control frames are
    /// handled by the connection task and never reach this point.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedPayload`] if validation is on and a text payload
    ///   is not JSON
    /// - [`Error::CounterpartUnavailable`] if the counterpart is absent or
    ///   closed
    ///
    /// Both are meant to be logged and dropped by the caller.
    pub fn relay(&self, sender: &Endpoint, message: Message) -> Result<()> {
        if self.validates_payloads()
            && let Message::Text(ref text) = message
        {
            from_str::<IgnoredAny>(text).map_err(|e| Error::malformed_payload(e.to_string()))?;
        }

        let counterpart_key = self.pairing().counterpart(sender.key().as_str());
        let counterpart = self
            .registry()
            .lookup_open(counterpart_key.as_str())
            .ok_or_else(|| Error::counterpart_unavailable(counterpart_key.clone()))?;

        counterpart.deliver(message)?;

        trace!(from = %sender.key(), to = %counterpart_key, "Payload relayed");
        Ok(())
    }

    /// Forwards one video datagram to the WebSocket counterpart of the key
    /// named in its header.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedFrame`] if the header is unusable
    /// - [`Error::CounterpartUnavailable`] if the counterpart is absent or
    ///   closed
    pub fn forward_video(&self, datagram: &[u8]) -> Result<()> {
        let frame = VideoFrame::parse(datagram)?;

        let counterpart_key = self.pairing().counterpart(frame.key);
        let counterpart = self
            .registry()
            .lookup_open(counterpart_key.as_str())
            .ok_or_else(|| Error::counterpart_unavailable(counterpart_key.clone()))?;

        counterpart.deliver(VideoPacket::encode(frame.payload).to_message()?)?;

        trace!(
            from = %frame.key,
            to = %counterpart_key,
            bytes = frame.payload.len(),
            "Video frame forwarded"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    use crate::identifiers::EndpointKey;
    use crate::session::endpoint::EndpointCommand;
    use crate::session::pairing::PairingRule;

    fn next_message(rx: &mut mpsc::UnboundedReceiver<EndpointCommand>) -> Option<Message> {
        while let Ok(command) = rx.try_recv() {
            if let EndpointCommand::Deliver(message) = command {
                let is_lifecycle = matches!(&message, Message::Text(text)
                    if serde_json::from_str::<Value>(text)
                        .ok()
                        .is_some_and(|v| v.get("action").is_some()));
                if !is_lifecycle {
                    return Some(message);
                }
            }
        }
        None
    }

    #[test]
    fn test_relay_to_agent_verbatim() {
        let hub = Hub::default();
        let (_agent, mut agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (controller, _controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        let payload = r#"{"cmd":"click", "x": 10}"#;
        assert_ok!(hub.relay(&controller, Message::Text(payload.into())));

        match next_message(&mut agent_rx) {
            Some(Message::Text(text)) => assert_eq!(text.as_str(), payload),
            other => panic!("unexpected delivery: {other:?}"),
        }
    }

    #[test]
    fn test_relay_to_controller() {
        let hub = Hub::default();
        let (agent, _agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (_controller, mut controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        hub.relay(&agent, Message::Text(r#"{"screen":"ready"}"#.into())).unwrap();

        let Some(Message::Text(text)) = next_message(&mut controller_rx) else {
            panic!("expected a text delivery");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"screen": "ready"}));
    }

    #[test]
    fn test_relay_without_counterpart() {
        let hub = Hub::default();
        let (agent, mut agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();

        let err = assert_err!(hub.relay(&agent, Message::Text("{}".into())));
        assert!(matches!(err, Error::CounterpartUnavailable { .. }));
        assert!(err.is_droppable());
        assert!(next_message(&mut agent_rx).is_none());
    }

    #[test]
    fn test_relay_to_closed_counterpart() {
        let hub = Hub::default();
        let (agent, _agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (_controller, controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();
        drop(controller_rx);

        let err = hub.relay(&agent, Message::Text("{}".into())).unwrap_err();
        assert!(matches!(err, Error::CounterpartUnavailable { .. }));
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let hub = Hub::default();
        let (_agent, mut agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (controller, _controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        let err = hub.relay(&controller, Message::Text("{not json".into())).unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { .. }));
        assert!(next_message(&mut agent_rx).is_none());
        assert!(controller.is_open());
    }

    #[test]
    fn test_unvalidated_payload_forwarded() {
        let hub = Hub::new(PairingRule::default(), false);
        let (_agent, mut agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (controller, _controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        hub.relay(&controller, Message::Text("plain text".into())).unwrap();
        assert!(matches!(
            next_message(&mut agent_rx),
            Some(Message::Text(text)) if text.as_str() == "plain text"
        ));
    }

    #[test]
    fn test_binary_payload_forwarded_verbatim() {
        let hub = Hub::default();
        let (_agent, mut agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (controller, _controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        hub.relay(&controller, Message::Binary(vec![0xde, 0xad].into())).unwrap();
        assert!(matches!(
            next_message(&mut agent_rx),
            Some(Message::Binary(data)) if data.as_ref() == &[0xde_u8, 0xad][..]
        ));
    }

    #[test]
    fn test_relay_preserves_order() {
        let hub = Hub::default();
        let (_agent, mut agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (controller, _controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        for i in 0..10 {
            hub.relay(&controller, Message::Text(format!("{{\"seq\":{i}}}").into()))
                .unwrap();
        }

        for i in 0..10 {
            let Some(Message::Text(text)) = next_message(&mut agent_rx) else {
                panic!("missing message {i}");
            };
            assert_eq!(text.as_str(), format!("{{\"seq\":{i}}}"));
        }
    }

    #[test]
    fn test_forward_video_to_controller() {
        let hub = Hub::default();
        let (_agent, _agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (_controller, mut controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        hub.forward_video(b"KEY:abc;\x01\x02\x03").unwrap();

        let Some(Message::Text(text)) = next_message(&mut controller_rx) else {
            panic!("expected a video packet");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"videoPacket": "AQID"}));
    }

    #[test]
    fn test_forward_video_without_controller() {
        let hub = Hub::default();
        let (_agent, _agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();

        let err = hub.forward_video(b"KEY:abc;\x01").unwrap_err();
        assert!(matches!(err, Error::CounterpartUnavailable { .. }));
    }

    #[test]
    fn test_forward_video_malformed_header() {
        let hub = Hub::default();
        let (_agent, _agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();
        let (_controller, mut controller_rx) = hub.admit(EndpointKey::from("abcbrowser")).unwrap();

        let err = hub.forward_video(b"KEY:abc\x01\x02").unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
        assert!(next_message(&mut controller_rx).is_none());
    }
}
