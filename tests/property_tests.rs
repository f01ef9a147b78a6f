//! Property tests for bus ordering and envelope text bounds.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32
//! targets. On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use homenode::bus::envelope::{TEXT_LONG, TEXT_SHORT};
use homenode::bus::{BoundedText, Envelope, MessageBus, MsgKind, TaskId};

const SEND_TIMEOUT: Duration = Duration::from_millis(200);

fn ready_bus(capacity: usize) -> Arc<MessageBus> {
    let bus = Arc::new(MessageBus::new());
    bus.initialize();
    bus.register(TaskId::Main, capacity).unwrap();
    bus.register(TaskId::Wifi, capacity).unwrap();
    bus
}

proptest! {
    /// Messages drain in exactly the order they were enqueued.
    #[test]
    fn mailbox_preserves_fifo_order(values in proptest::collection::vec(any::<i32>(), 1..32)) {
        let bus = ready_bus(values.len());
        for &v in &values {
            let mut env = Envelope::new(TaskId::Wifi, TaskId::Main, MsgKind::Heartbeat);
            env.value_a = v;
            bus.send(env, SEND_TIMEOUT).unwrap();
        }
        for &v in &values {
            let msg = bus.receive(TaskId::Main, SEND_TIMEOUT).unwrap();
            prop_assert_eq!(msg.value_a, v);
        }
    }

    /// A message addressed to one mailbox never surfaces at another.
    #[test]
    fn no_cross_mailbox_delivery(count in 1usize..16) {
        let bus = ready_bus(16);
        for i in 0..count {
            let mut env = Envelope::new(TaskId::Main, TaskId::Wifi, MsgKind::Heartbeat);
            env.value_a = i as i32;
            bus.send(env, SEND_TIMEOUT).unwrap();
        }
        prop_assert!(bus.receive(TaskId::Main, Duration::ZERO).is_err());
        for _ in 0..count {
            let msg = bus.receive(TaskId::Wifi, SEND_TIMEOUT).unwrap();
            prop_assert_eq!(msg.destination, TaskId::Wifi);
        }
    }

    /// Stored text is always a char-boundary prefix of the input and
    /// never reaches the field capacity.
    #[test]
    fn bounded_text_truncates_to_prefix(input in ".{0,200}") {
        let short = BoundedText::<TEXT_SHORT>::from_truncated(&input);
        let long = BoundedText::<TEXT_LONG>::from_truncated(&input);

        prop_assert!(short.len() < TEXT_SHORT);
        prop_assert!(long.len() < TEXT_LONG);
        prop_assert!(input.starts_with(short.as_str()));
        prop_assert!(input.starts_with(long.as_str()));

        // Inputs that already fit are stored verbatim.
        if input.len() < TEXT_SHORT {
            prop_assert_eq!(short.as_str(), input.as_str());
        }
    }

    /// Envelope text fields survive a bus hop unchanged.
    #[test]
    fn envelope_text_survives_transit(ssid in "[a-zA-Z0-9 ]{0,60}", reason in "[a-z ]{0,80}") {
        let bus = ready_bus(4);
        let mut env = Envelope::new(TaskId::Main, TaskId::Wifi, MsgKind::WifiInitRequest);
        env.text.set(&ssid);
        env.text2.set(&reason);
        let sent_text = env.text.clone();
        let sent_text2 = env.text2.clone();

        bus.send(env, SEND_TIMEOUT).unwrap();
        let got = bus.receive(TaskId::Wifi, SEND_TIMEOUT).unwrap();
        prop_assert_eq!(got.text.as_str(), sent_text.as_str());
        prop_assert_eq!(got.text2.as_str(), sent_text2.as_str());
    }
}
