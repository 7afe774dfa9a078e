//! Bridge integration tests against a real emulator.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vdisplay_engine::{
    Bridge, BridgeConfig, ChannelSource, Emulator, EmulatorConfig, EndpointConfig, InboundMessage,
};

fn config() -> BridgeConfig {
    BridgeConfig {
        poll_interval_ms: 5,
        queue_capacity: 4,
        unknown_port_retries: 50,
        retry_backoff_ms: 10,
    }
}

#[test]
fn test_bridge_feeds_emulator_in_order() {
    let emu = Arc::new(Emulator::new(EmulatorConfig::instant(1)).unwrap());
    emu.create_endpoint(EndpointConfig::new("COM1", 1, 20)).unwrap();

    let (tx, source) = ChannelSource::new("inbox");
    let bridge = Bridge::spawn(source, Arc::clone(&emu), config()).unwrap();

    for i in 0..30 {
        tx.send(InboundMessage::new("COM1", format!("line {i}"))).unwrap();
    }
    drop(tx);
    let stats = bridge.shutdown();

    assert_eq!(stats.delivered, 30);
    assert_eq!(emu.snapshot("COM1").unwrap().content[0].trim_end(), "line 29");
    assert_eq!(emu.endpoint_statistics("COM1").unwrap().succeeded, 30);
}

#[test]
fn test_message_for_port_created_later() {
    let emu = Arc::new(Emulator::new(EmulatorConfig::instant(1)).unwrap());
    let (tx, source) = ChannelSource::new("inbox");
    let bridge = Bridge::spawn(source, Arc::clone(&emu), config()).unwrap();

    tx.send(InboundMessage::new("USB0", "early bird")).unwrap();
    thread::sleep(Duration::from_millis(40));
    emu.create_endpoint(EndpointConfig::new("USB0", 1, 20)).unwrap();

    drop(tx);
    let stats = bridge.shutdown();

    assert_eq!(stats.delivered, 1);
    assert!(stats.retries >= 1);
    assert_eq!(emu.snapshot("USB0").unwrap().content[0].trim_end(), "early bird");
}

#[test]
fn test_protocol_failures_are_final() {
    let emu = Arc::new(Emulator::new(EmulatorConfig::instant(1)).unwrap());
    emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();

    let (tx, source) = ChannelSource::new("inbox");
    let bridge = Bridge::spawn(source, Arc::clone(&emu), config()).unwrap();
    tx.send(InboundMessage::new("COM1", "\x1B[7Hbad row")).unwrap();
    tx.send(InboundMessage::new("COM1", "good")).unwrap();
    drop(tx);
    let stats = bridge.shutdown();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.retries, 0);
    assert_eq!(emu.endpoint_statistics("COM1").unwrap().failed, 1);
}
