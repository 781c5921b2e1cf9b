//! Typed payloads.
//!
//! Every layout is fixed-size and little-endian. Decoders accept trailing
//! bytes so newer firmware that appends fields still parses.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use codrone_frame::{Frame, MessageKind};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::PayloadError;

codrone_frame::wire_enum! {
    /// Command selector carried in a [`Command`] payload.
    pub enum CommandType {
        Stop = 0x01,
        ModeControlFlight = 0x02,
        Headless = 0x03,
        ControlSpeed = 0x04,
        /// Resets gyro bias; trim is cleared too.
        ClearBias = 0x05,
        ClearTrim = 0x06,
        FlightEvent = 0x07,
        SetDefault = 0x08,
        Backlight = 0x09,
        ModeController = 0x0A,
        Link = 0x0B,
        ClearCounter = 0xA0,
        NavigationTargetClear = 0xE0,
        NavigationStart = 0xE1,
        NavigationPause = 0xE2,
        NavigationRestart = 0xE3,
        NavigationStop = 0xE4,
        NavigationNext = 0xE5,
        NavigationReturnToHome = 0xE6,
        GpsRtkBase = 0xEA,
        GpsRtkRover = 0xEB,
    }
}

codrone_frame::wire_enum! {
    /// Option byte for [`CommandType::FlightEvent`].
    pub enum FlightEvent {
        Unassigned = 0x00,
        Stop = 0x10,
        TakeOff = 0x11,
        Landing = 0x12,
        Reverse = 0x13,
        FlipFront = 0x14,
        FlipRear = 0x15,
        FlipLeft = 0x16,
        FlipRight = 0x17,
        Return = 0x18,
        Shot = 0x90,
        UnderAttack = 0x91,
        ResetHeading = 0xA0,
    }
}

codrone_frame::wire_enum! {
    /// Flight mode reported in [`State`].
    pub enum ModeFlight {
        Unassigned = 0x00,
        Ready = 0x10,
        Start = 0x11,
        TakeOff = 0x12,
        Flight = 0x13,
        Landing = 0x14,
        Flip = 0x15,
        Reverse = 0x16,
        Stop = 0x20,
        Accident = 0x30,
        Error = 0x31,
        Test = 0x40,
    }
}

impl ModeFlight {
    /// Motors are spinning and the drone is (or is about to be) airborne.
    pub fn is_airborne(self) -> bool {
        matches!(
            self,
            Self::TakeOff | Self::Flight | Self::Landing | Self::Flip | Self::Reverse
        )
    }
}

/// A fixed-layout payload bound to one message kind.
pub trait Payload: Sized {
    /// Kind tag used when this payload is framed.
    const KIND: MessageKind;
    /// Encoded length in bytes.
    const SIZE: usize;

    /// Append the encoded payload to `dst`.
    fn encode(&self, dst: &mut BytesMut);

    /// Parse from a payload slice. Extra trailing bytes are ignored.
    fn decode(src: &[u8]) -> Result<Self, PayloadError>;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn ensure_len<P: Payload>(src: &[u8]) -> Result<(), PayloadError> {
    if src.len() < P::SIZE {
        return Err(PayloadError::TooShort {
            kind: P::KIND,
            expected: P::SIZE,
            actual: src.len(),
        });
    }
    Ok(())
}

fn kind_from_byte(value: u8) -> Result<MessageKind, PayloadError> {
    MessageKind::from_u8(value).ok_or(PayloadError::UnknownKind(value))
}

/// Keep-alive, echoed by the drone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ping {
    pub system_time: u32,
}

impl Payload for Ping {
    const KIND: MessageKind = MessageKind::Ping;
    const SIZE: usize = 4;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.system_time);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            system_time: buf.get_u32_le(),
        })
    }
}

/// Acknowledgment naming the kind that was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub system_time: u32,
    pub acked: MessageKind,
}

impl Ack {
    pub fn new(acked: MessageKind) -> Self {
        Self {
            system_time: 0,
            acked,
        }
    }
}

impl Payload for Ack {
    const KIND: MessageKind = MessageKind::Ack;
    const SIZE: usize = 5;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.system_time);
        dst.put_u8(self.acked.as_u8());
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            system_time: buf.get_u32_le(),
            acked: kind_from_byte(buf.get_u8())?,
        })
    }
}

/// Error flags raised by the drone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub system_time: u64,
    pub sensor_flags: u32,
    pub state_flags: u32,
}

impl ErrorReport {
    /// No sensor or state error is set.
    pub fn is_clear(&self) -> bool {
        self.sensor_flags == 0 && self.state_flags == 0
    }
}

impl Payload for ErrorReport {
    const KIND: MessageKind = MessageKind::Error;
    const SIZE: usize = 16;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.system_time);
        dst.put_u32_le(self.sensor_flags);
        dst.put_u32_le(self.state_flags);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            system_time: buf.get_u64_le(),
            sensor_flags: buf.get_u32_le(),
            state_flags: buf.get_u32_le(),
        })
    }
}

/// Ask the drone to send one frame of `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Request {
    pub kind: MessageKind,
}

impl Payload for Request {
    const KIND: MessageKind = MessageKind::Request;
    const SIZE: usize = 1;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.kind.as_u8());
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        Ok(Self {
            kind: kind_from_byte(src[0])?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Command {
    pub command: CommandType,
    pub option: u8,
}

impl Command {
    pub fn new(command: CommandType, option: u8) -> Self {
        Self { command, option }
    }

    /// Take off, land, flip and the like.
    pub fn flight_event(event: FlightEvent) -> Self {
        Self::new(CommandType::FlightEvent, event.as_u8())
    }

    /// Immediate motor stop.
    pub fn stop() -> Self {
        Self::new(CommandType::Stop, 0)
    }
}

impl Payload for Command {
    const KIND: MessageKind = MessageKind::Command;
    const SIZE: usize = 2;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.command.as_u8());
        dst.put_u8(self.option);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let command = CommandType::from_u8(src[0]).ok_or(PayloadError::UnknownValue {
            field: "command type",
            value: src[0],
        })?;
        Ok(Self {
            command,
            option: src[1],
        })
    }
}

/// Stick input, each axis -100..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControlQuad8 {
    pub roll: i8,
    pub pitch: i8,
    pub yaw: i8,
    pub throttle: i8,
}

impl Payload for ControlQuad8 {
    const KIND: MessageKind = MessageKind::Control;
    const SIZE: usize = 4;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i8(self.roll);
        dst.put_i8(self.pitch);
        dst.put_i8(self.yaw);
        dst.put_i8(self.throttle);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            roll: buf.get_i8(),
            pitch: buf.get_i8(),
            yaw: buf.get_i8(),
            throttle: buf.get_i8(),
        })
    }
}

/// Overall drone state. Mode fields are raw bytes; see [`State::flight_mode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct State {
    pub mode_system: u8,
    pub mode_flight: u8,
    pub mode_control_flight: u8,
    pub mode_movement: u8,
    pub headless: u8,
    pub control_speed: u8,
    pub sensor_orientation: u8,
    /// Battery level in percent.
    pub battery: u8,
}

impl State {
    pub fn flight_mode(&self) -> Option<ModeFlight> {
        ModeFlight::from_u8(self.mode_flight)
    }
}

impl Payload for State {
    const KIND: MessageKind = MessageKind::State;
    const SIZE: usize = 8;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&[
            self.mode_system,
            self.mode_flight,
            self.mode_control_flight,
            self.mode_movement,
            self.headless,
            self.control_speed,
            self.sensor_orientation,
            self.battery,
        ]);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        Ok(Self {
            mode_system: src[0],
            mode_flight: src[1],
            mode_control_flight: src[2],
            mode_movement: src[3],
            headless: src[4],
            control_speed: src[5],
            sensor_orientation: src[6],
            battery: src[7],
        })
    }
}

/// Orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Attitude {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

impl Payload for Attitude {
    const KIND: MessageKind = MessageKind::Attitude;
    const SIZE: usize = 6;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.roll);
        dst.put_i16_le(self.pitch);
        dst.put_i16_le(self.yaw);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            roll: buf.get_i16_le(),
            pitch: buf.get_i16_le(),
            yaw: buf.get_i16_le(),
        })
    }
}

/// Position estimate in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Payload for Position {
    const KIND: MessageKind = MessageKind::Position;
    const SIZE: usize = 12;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.x);
        dst.put_f32_le(self.y);
        dst.put_f32_le(self.z);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            x: buf.get_f32_le(),
            y: buf.get_f32_le(),
            z: buf.get_f32_le(),
        })
    }
}

/// Optical-flow displacement in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Flow {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Payload for Flow {
    const KIND: MessageKind = MessageKind::Flow;
    const SIZE: usize = 12;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.x);
        dst.put_f32_le(self.y);
        dst.put_f32_le(self.z);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            x: buf.get_f32_le(),
            y: buf.get_f32_le(),
            z: buf.get_f32_le(),
        })
    }
}

/// Barometer and range-sensor readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Altitude {
    pub temperature: f32,
    pub pressure: f32,
    pub altitude: f32,
    pub range_height: f32,
}

impl Payload for Altitude {
    const KIND: MessageKind = MessageKind::Altitude;
    const SIZE: usize = 16;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.temperature);
        dst.put_f32_le(self.pressure);
        dst.put_f32_le(self.altitude);
        dst.put_f32_le(self.range_height);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            temperature: buf.get_f32_le(),
            pressure: buf.get_f32_le(),
            altitude: buf.get_f32_le(),
            range_height: buf.get_f32_le(),
        })
    }
}

/// IMU readings: acceleration, angular rate and fused angle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Motion {
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    pub gyro_roll: i16,
    pub gyro_pitch: i16,
    pub gyro_yaw: i16,
    pub angle_roll: i16,
    pub angle_pitch: i16,
    pub angle_yaw: i16,
}

impl Payload for Motion {
    const KIND: MessageKind = MessageKind::Motion;
    const SIZE: usize = 18;

    fn encode(&self, dst: &mut BytesMut) {
        for value in [
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_roll,
            self.gyro_pitch,
            self.gyro_yaw,
            self.angle_roll,
            self.angle_pitch,
            self.angle_yaw,
        ] {
            dst.put_i16_le(value);
        }
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            accel_x: buf.get_i16_le(),
            accel_y: buf.get_i16_le(),
            accel_z: buf.get_i16_le(),
            gyro_roll: buf.get_i16_le(),
            gyro_pitch: buf.get_i16_le(),
            gyro_yaw: buf.get_i16_le(),
            angle_roll: buf.get_i16_le(),
            angle_pitch: buf.get_i16_le(),
            angle_yaw: buf.get_i16_le(),
        })
    }
}

/// Distance sensors in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Range {
    pub left: i16,
    pub front: i16,
    pub right: i16,
    pub rear: i16,
    pub top: i16,
    pub bottom: i16,
}

impl Payload for Range {
    const KIND: MessageKind = MessageKind::Range;
    const SIZE: usize = 12;

    fn encode(&self, dst: &mut BytesMut) {
        for value in [
            self.left,
            self.front,
            self.right,
            self.rear,
            self.top,
            self.bottom,
        ] {
            dst.put_i16_le(value);
        }
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            left: buf.get_i16_le(),
            front: buf.get_i16_le(),
            right: buf.get_i16_le(),
            rear: buf.get_i16_le(),
            top: buf.get_i16_le(),
            bottom: buf.get_i16_le(),
        })
    }
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Count {
    pub time_system: u32,
    pub time_flight: u32,
    pub takeoffs: u16,
    pub landings: u16,
    pub accidents: u16,
}

impl Payload for Count {
    const KIND: MessageKind = MessageKind::Count;
    const SIZE: usize = 14;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.time_system);
        dst.put_u32_le(self.time_flight);
        dst.put_u16_le(self.takeoffs);
        dst.put_u16_le(self.landings);
        dst.put_u16_le(self.accidents);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            time_system: buf.get_u32_le(),
            time_flight: buf.get_u32_le(),
            takeoffs: buf.get_u16_le(),
            landings: buf.get_u16_le(),
            accidents: buf.get_u16_le(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Trim {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub throttle: i16,
}

impl Payload for Trim {
    const KIND: MessageKind = MessageKind::Trim;
    const SIZE: usize = 8;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.roll);
        dst.put_i16_le(self.pitch);
        dst.put_i16_le(self.yaw);
        dst.put_i16_le(self.throttle);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        let mut buf = src;
        Ok(Self {
            roll: buf.get_i16_le(),
            pitch: buf.get_i16_le(),
            yaw: buf.get_i16_le(),
            throttle: buf.get_i16_le(),
        })
    }
}

/// Radio signal strength in dBm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rssi {
    pub rssi: i8,
}

impl Payload for Rssi {
    const KIND: MessageKind = MessageKind::Rssi;
    const SIZE: usize = 1;

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i8(self.rssi);
    }

    fn decode(src: &[u8]) -> Result<Self, PayloadError> {
        ensure_len::<Self>(src)?;
        Ok(Self {
            rssi: src[0] as i8,
        })
    }
}

/// Any payload the link can send or receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Ping(Ping),
    Ack(Ack),
    Error(ErrorReport),
    Request(Request),
    Command(Command),
    Control(ControlQuad8),
    State(State),
    Attitude(Attitude),
    Position(Position),
    Flow(Flow),
    Altitude(Altitude),
    Motion(Motion),
    Range(Range),
    Count(Count),
    Trim(Trim),
    Rssi(Rssi),
    /// A known kind without a typed layout here, kept as raw bytes.
    Opaque {
        kind: MessageKind,
        #[serde(serialize_with = "hex_bytes")]
        payload: Bytes,
    },
}

fn hex_bytes<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    serializer.serialize_str(&hex)
}

macro_rules! typed_messages {
    ($( $variant:ident($ty:ty) ),+ $(,)?) => {
        impl Message {
            /// Kind tag this message is framed with.
            pub fn kind(&self) -> MessageKind {
                match self {
                    $( Self::$variant(_) => <$ty as Payload>::KIND, )+
                    Self::Opaque { kind, .. } => *kind,
                }
            }

            /// Encoded payload bytes.
            pub fn to_payload(&self) -> Bytes {
                match self {
                    $( Self::$variant(inner) => inner.to_bytes(), )+
                    Self::Opaque { payload, .. } => payload.clone(),
                }
            }

            /// Decode a payload of `kind`. Kinds without a typed layout become
            /// [`Message::Opaque`].
            pub fn decode(kind: MessageKind, payload: &Bytes) -> Result<Self, PayloadError> {
                $(
                    if kind == <$ty as Payload>::KIND {
                        return <$ty as Payload>::decode(payload).map(Self::$variant);
                    }
                )+
                Ok(Self::Opaque {
                    kind,
                    payload: payload.clone(),
                })
            }
        }

        $(
            impl From<$ty> for Message {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

typed_messages! {
    Ping(Ping),
    Ack(Ack),
    Error(ErrorReport),
    Request(Request),
    Command(Command),
    Control(ControlQuad8),
    State(State),
    Attitude(Attitude),
    Position(Position),
    Flow(Flow),
    Altitude(Altitude),
    Motion(Motion),
    Range(Range),
    Count(Count),
    Trim(Trim),
    Rssi(Rssi),
}

impl Message {
    /// Interpret a received frame. A payload that does not fit its layout is
    /// logged and kept as [`Message::Opaque`].
    pub fn from_frame(frame: &Frame) -> Self {
        let kind = frame.kind();
        Self::decode(kind, &frame.payload).unwrap_or_else(|err| {
            debug!(%kind, error = %err, "undecodable payload, keeping raw bytes");
            Self::Opaque {
                kind,
                payload: frame.payload.clone(),
            }
        })
    }

    /// Raw bytes for a kind, bypassing typed layouts.
    pub fn raw(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self::Opaque {
            kind,
            payload: payload.into(),
        }
    }
}
