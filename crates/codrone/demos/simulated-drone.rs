//! Talks to a simulated drone over a local TCP bridge.
//!
//! The simulated side acknowledges every Command and answers State and
//! Attitude requests, so the full send/confirm/request path can be tried
//! without hardware.
//!
//! Run with:
//!   cargo run --example simulated-drone
//!
//! Set `DROP_ACKS=1` to watch a confirmed send retry and fail.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use codrone::frame::{DeviceType, Frame, FrameError, FrameReader, FrameWriter, Received};
use codrone::link::{
    Ack, Attitude, Command, ControlQuad8, FlightEvent, Link, LinkConfig, LinkError, Message,
    MessageKind, Request, State,
};
use codrone::transport::tcp;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?.to_string();
    let drop_acks = std::env::var_os("DROP_ACKS").is_some();

    thread::spawn(move || {
        if let Ok((socket, _)) = listener.accept() {
            if let Err(err) = simulate(socket, drop_acks) {
                eprintln!("simulated drone stopped: {err}");
            }
        }
    });

    let stream = tcp::connect(&addr, Duration::from_secs(1))?;
    let mut link = Link::open(stream, LinkConfig::default())?;
    eprintln!("Connected to simulated drone at {addr}");

    match link.send_and_confirm(Command::flight_event(FlightEvent::TakeOff)) {
        Ok(()) => eprintln!("Takeoff acknowledged"),
        Err(LinkError::DeliveryFailed { kind, attempts }) => {
            eprintln!("{kind} not acknowledged after {attempts} attempts");
        }
        Err(err) => return Err(err.into()),
    }

    // Stream stick input for a moment; samples inside the rate limit are
    // dropped rather than queued.
    let stick = ControlQuad8 {
        pitch: 20,
        ..ControlQuad8::default()
    };
    let (mut sent, mut skipped) = (0u32, 0u32);
    for _ in 0..50 {
        if link.try_send(stick)? {
            sent += 1;
        } else {
            skipped += 1;
        }
        thread::sleep(Duration::from_millis(10));
    }
    eprintln!("control samples sent: {sent}, skipped: {skipped}");

    for kind in [MessageKind::State, MessageKind::Attitude] {
        let message = link.request_and_wait(kind, Duration::from_millis(500))?;
        eprintln!("{kind}: {message:?}");
    }

    if let Some(state) = link.status().state() {
        eprintln!("flight mode: {:?}, battery {}%", state.flight_mode(), state.battery);
    }

    let stats = link.close();
    eprintln!("frames received: {}, discarded: {}", stats.frames, stats.discarded());
    Ok(())
}

fn simulate(socket: TcpStream, drop_acks: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = FrameWriter::new(socket.try_clone()?);
    let mut reader = FrameReader::new(socket);

    loop {
        let frame = match reader.read_frame() {
            Ok(Received::Frame(frame)) => frame,
            Ok(Received::Unrecognized { .. }) => continue,
            Err(FrameError::ConnectionClosed) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let reply: Message = match Message::from_frame(&frame) {
            Message::Command(_) if drop_acks => continue,
            Message::Command(_) => Ack::new(MessageKind::Command).into(),
            Message::Request(Request {
                kind: MessageKind::State,
            }) => State {
                mode_flight: 0x11,
                battery: 87,
                ..State::default()
            }
            .into(),
            Message::Request(Request {
                kind: MessageKind::Attitude,
            }) => Attitude {
                roll: 2,
                pitch: -1,
                yaw: 90,
            }
            .into(),
            _ => continue,
        };

        writer.write_frame(&Frame::new(
            reply.kind(),
            DeviceType::Drone,
            DeviceType::Base,
            reply.to_payload(),
        )?)?;
        writer.get_mut().flush()?;
    }
}
