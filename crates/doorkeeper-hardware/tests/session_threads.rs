//! Sessions running on their poll threads against scripted serial ports.

use doorkeeper_core::LockState;
use doorkeeper_hardware::{
    CardReaderSession, CardSource, DoorLock, LockConfig, LockSession, ReaderConfig, Shutdown,
    mock::MockSerial,
};
use doorkeeper_protocol::Pattern;
use std::time::{Duration, Instant};

fn wait_for<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn reader_thread_delivers_swipes_and_patterns() {
    let (port, handle) = MockSerial::new();
    let shutdown = Shutdown::new();
    let config = ReaderConfig::default().poll_interval(Duration::from_millis(5));
    let (reader, thread) = CardReaderSession::spawn(port, config, shutdown.clone()).unwrap();

    handle.push_line("ID13005D1DA5");
    let mut swiped = None;
    assert!(wait_for(|| {
        swiped = reader.take_card_id();
        swiped.is_some()
    }));
    assert_eq!(swiped.unwrap().as_u64(), 0x13005D1DA5);

    reader.set_pattern(Pattern::NoEntry);
    assert!(wait_for(|| handle
        .written_lines()
        .iter()
        .any(|l| l == "P100R30SRN")));

    shutdown.trigger();
    thread.join().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn lock_thread_polls_while_commands_run() {
    let (port, handle) = MockSerial::new();
    handle.respond_with(|cmd| {
        let reply = match cmd {
            "status" => "OK: status unlocked open lowered 700",
            "calibrate" => "OK: locked 10-40 unlocked 700-760",
            _ => "OK",
        };
        vec![cmd.to_string(), reply.to_string()]
    });

    let shutdown = Shutdown::new();
    let config = LockConfig::default().poll_interval(Duration::from_millis(5));
    let (lock, thread) = LockSession::spawn(port, config, shutdown.clone()).unwrap();

    assert!(wait_for(|| lock.status().door_open));
    assert_eq!(lock.status().state, LockState::Open);

    lock.set_state(LockState::Locked).await.unwrap();
    assert!(handle.written_lines().iter().any(|l| l == "lock"));

    shutdown.trigger();
    thread.join().unwrap();
}
