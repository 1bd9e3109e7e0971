// Serial byte stream to state updates, through the public API.

use ekey_gateway::dispatch::{DeviceRegistry, Dispatcher, StateUpdate};
use ekey_gateway::serial::{FrameAssembler, FrameState, SerialFrame};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Frame of `total` wire bytes with a payload that never needs stuffing.
fn plain_frame(total: usize, fill: u8) -> Vec<u8> {
    let mut f = vec![0x02, ((total - 2) * 4 + 1) as u8, 0x00];
    while f.len() < total - 1 {
        f.push(fill);
    }
    f.push(0x03);
    f
}

/// 47-byte finger identification message carrying `hash`.
fn finger_frame(hash: u8) -> Vec<u8> {
    let mut f = plain_frame(47, 0x10);
    f[17] = hash;
    f
}

fn drain(rx: &mut mpsc::UnboundedReceiver<StateUpdate>) -> Vec<StateUpdate> {
    let mut out = Vec::new();
    while let Ok(u) = rx.try_recv() {
        out.push(u);
    }
    out
}

#[test]
fn finger_message_publishes_finger_field() {
    let dispatcher = Dispatcher::new(DeviceRegistry::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut asm = FrameAssembler::default();

    for frame in asm.push(&finger_frame(0x2C), Instant::now()) {
        dispatcher.handle_serial_frame(&frame, &tx);
    }

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].state_id(), "devices.serial.finger");
    assert_eq!(updates[0].value, "44");
}

#[test]
fn other_frames_publish_raw_hex() {
    let dispatcher = Dispatcher::new(DeviceRegistry::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut asm = FrameAssembler::default();

    let frame = plain_frame(6, 0xAB);
    for f in asm.push(&frame, Instant::now()) {
        dispatcher.handle_serial_frame(&f, &tx);
    }

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].state_id(), "devices.serial.rawData");
    assert_eq!(updates[0].value, "021100abab03");
}

#[test]
fn frame_split_across_reads() {
    let mut asm = FrameAssembler::new(Duration::from_millis(500));
    let frame = finger_frame(7);
    let t0 = Instant::now();
    let mut frames = Vec::new();
    for (i, chunk) in frame.chunks(5).enumerate() {
        frames.extend(asm.push(chunk, t0 + Duration::from_millis(10 * i as u64)));
    }
    assert_eq!(frames, vec![SerialFrame::Finger(7)]);
}

#[test]
fn stuffed_start_and_end_bytes_are_restored() {
    // 02 and 03 inside the payload travel as 3F 41 and 3F 81.
    let mut wire = vec![0x02, ((51 - 2) * 4 + 1) as u8, 0x00];
    while wire.len() < 20 {
        wire.push(0x10);
    }
    wire.extend_from_slice(&[0x3F, 0x41, 0x3F, 0x81, 0x3F, 0xC1]);
    while wire.len() < 50 {
        wire.push(0x10);
    }
    wire.push(0x03);
    assert_eq!(wire.len(), 51);

    let mut asm = FrameAssembler::default();
    let frames = asm.push(&wire, Instant::now());
    let bytes = match &frames[..] {
        [SerialFrame::Raw(bytes)] => bytes.clone(),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(bytes.len(), 48);
    assert_eq!(&bytes[20..23], &[0x02, 0x03, 0x3F]);
    assert_eq!(bytes.last(), Some(&0x03));
}

#[test]
fn stall_mid_frame_resynchronises_on_next_start() {
    let mut asm = FrameAssembler::new(Duration::from_millis(200));
    let t0 = Instant::now();
    let first = finger_frame(1);
    let second = finger_frame(2);

    assert!(asm.push(&first[..30], t0).is_empty());
    assert_eq!(asm.state(), FrameState::AwaitingPayload);

    // Line went quiet; the transport tick fires the timer.
    assert!(asm.poll_timeout(t0 + Duration::from_millis(250)));
    assert_eq!(asm.state(), FrameState::AwaitingStart);

    let frames = asm.push(&second, t0 + Duration::from_millis(300));
    assert_eq!(frames, vec![SerialFrame::Finger(2)]);
}

#[test]
fn noise_between_frames_is_ignored() {
    let mut stream = finger_frame(3);
    stream.extend_from_slice(&[0x00, 0xFF, 0x7E, 0x03]);
    stream.extend_from_slice(&finger_frame(4));

    let mut asm = FrameAssembler::default();
    assert_eq!(
        asm.push(&stream, Instant::now()),
        vec![SerialFrame::Finger(3), SerialFrame::Finger(4)]
    );
}
