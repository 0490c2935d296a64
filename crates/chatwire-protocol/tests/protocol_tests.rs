//! Protocol layer tests: envelope decoding, payload decoding, errors, limits.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatwire_protocol::events::is_inbound_event;
    use chatwire_protocol::*;
    use serde_json::json;

    // ─────────────────────────────────────────────────────────────────────
    // Envelope
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn decode_send_message_envelope() {
        let frame = br#"{"type":"send_message","payload":{"message":"hi","from":"alice"}}"#;
        let event = Event::decode(frame).unwrap();
        assert_eq!(event.event_type, "send_message");
        assert_eq!(event.payload, json!({"message": "hi", "from": "alice"}));
    }

    #[test]
    fn encode_uses_type_field() {
        let event = Event::new("new_message", json!({"a": 1}));
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "new_message", "payload": {"a": 1}}));
    }

    #[test]
    fn missing_payload_is_null() {
        let event = Event::decode(br#"{"type":"ping_me"}"#).unwrap();
        assert_eq!(event.payload, serde_json::Value::Null);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let event = Event::decode(br#"{"type":"x","payload":1,"extra":true}"#).unwrap();
        assert_eq!(event, Event::new("x", json!(1)));
    }

    #[test]
    fn missing_type_is_decode_error() {
        let err = Event::decode(br#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, EventError::Decode(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let err = Event::decode(b"not json").unwrap_err();
        assert!(matches!(err, EventError::Decode(_)));
        assert!(err.to_string().starts_with("malformed event"));
    }

    #[test]
    fn unregistered_type_still_decodes() {
        // Routing, not decoding, rejects unknown tags.
        let event = Event::decode(br#"{"type":"unknown_event","payload":{}}"#).unwrap();
        assert_eq!(event.event_type, "unknown_event");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Payloads
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn decode_payload_into_handler_shape() {
        let event = Event::new("send_message", json!({"message": "hi", "from": "alice"}));
        let payload: SendMessageEvent = event.decode_payload().unwrap();
        assert_eq!(
            payload,
            SendMessageEvent {
                message: "hi".into(),
                from: "alice".into()
            }
        );
    }

    #[test]
    fn decode_payload_reports_event_type() {
        let event = Event::new("change_room", json!({"room": "typo"}));
        let err = event.decode_payload::<ChangeRoomEvent>().unwrap_err();
        match err {
            EventError::InvalidPayload { event_type, .. } => assert_eq!(event_type, "change_room"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn new_message_carries_timestamp() {
        let stamped = NewMessageEvent::stamped(SendMessageEvent {
            message: "hi".into(),
            from: "bob".into(),
        });
        let event = Event::from_payload(EventTypes::NEW_MESSAGE, &stamped).unwrap();
        assert_eq!(event.payload["from"], "bob");
        let sent = event.payload["sent"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(sent).is_ok());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Errors
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn unsupported_is_not_fatal() {
        let err = EventError::Unsupported("unknown_event".into());
        assert!(err.is_unsupported());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "this event type is not supported: unknown_event");
    }

    #[test]
    fn handler_error_displays_message() {
        let err = EventError::handler("room is full");
        assert_eq!(err.to_string(), "room is full");
        assert!(!err.is_unsupported());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Names and limits
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn inbound_events_exclude_server_events() {
        assert!(is_inbound_event(EventTypes::SEND_MESSAGE));
        assert!(is_inbound_event(EventTypes::CHANGE_ROOM));
        assert!(!is_inbound_event(EventTypes::NEW_MESSAGE));
    }

    #[test]
    fn heartbeat_interval_is_ninety_percent() {
        assert_eq!(MAX_FRAME_BYTES, 1024);
        assert_eq!(HEARTBEAT_TIMEOUT, Duration::from_secs(10));
        assert_eq!(heartbeat_interval(HEARTBEAT_TIMEOUT), Duration::from_secs(9));
        assert_eq!(heartbeat_interval(Duration::from_millis(100)), Duration::from_millis(90));
    }
}
