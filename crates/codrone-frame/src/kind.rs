//! Message kinds and device addresses carried in every frame header.
//!
//! Both are single wire bytes. Unmapped values are not representable here;
//! the codec reports them as [`FrameError::UnknownMessageKind`] or
//! [`FrameError::UnknownDevice`].
//!
//! [`FrameError::UnknownMessageKind`]: crate::FrameError::UnknownMessageKind
//! [`FrameError::UnknownDevice`]: crate::FrameError::UnknownDevice

/// Declares a `#[repr(u8)]` enum with byte and name conversions.
#[macro_export]
#[doc(hidden)]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ::serde::Serialize)]
        #[repr(u8)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Every defined value, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant, )+];

            /// Look up a wire byte.
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The wire byte.
            pub fn as_u8(self) -> u8 {
                self as u8
            }

            /// Human-readable name, as used in logs and on the command line.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                }
            }

            /// Case-insensitive lookup by [`name`](Self::name).
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.name().eq_ignore_ascii_case(name))
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

wire_enum! {
    /// Message kind tag (first header byte).
    pub enum MessageKind {
        // Link management
        Ping = 0x01,
        Ack = 0x02,
        Error = 0x03,
        Request = 0x04,
        Message = 0x05,
        Address = 0x06,
        Information = 0x07,
        UpdateLocation = 0x09,
        SystemInformation = 0x0C,
        Registration = 0x0D,
        Pairing = 0x12,
        Rssi = 0x13,

        // Commands
        Control = 0x10,
        Command = 0x11,
        LightManual = 0x20,
        LightMode = 0x21,
        LightEvent = 0x22,
        LightDefault = 0x23,

        // Raw sensors
        RawMotion = 0x30,
        RawFlow = 0x31,

        // Drone status
        State = 0x40,
        Attitude = 0x41,
        Position = 0x42,
        Altitude = 0x43,
        Motion = 0x44,
        Range = 0x45,
        Flow = 0x46,

        // Settings
        Count = 0x50,
        Bias = 0x51,
        Trim = 0x52,
        Weight = 0x53,

        Buzzer = 0x62,

        // Controller input
        Button = 0x70,
        Joystick = 0x71,

        // Controller display
        DisplayClear = 0x80,
        DisplayInvert = 0x81,
        DisplayDrawPoint = 0x82,
        DisplayDrawLine = 0x83,
        DisplayDrawRect = 0x84,
        DisplayDrawCircle = 0x85,
        DisplayDrawString = 0x86,

        // Card reader
        CardClassify = 0x90,
        CardRange = 0x91,
        CardRaw = 0x92,
        CardColor = 0x93,
        CardList = 0x94,
        CardFunctionList = 0x95,

        InformationAssembledForController = 0xA0,
        InformationAssembledForEntry = 0xA1,
    }
}

wire_enum! {
    /// Participant on the bus, used only to address frames.
    pub enum DeviceType {
        Unassigned = 0x00,
        Drone = 0x10,
        Controller = 0x20,
        Link = 0x30,
        /// Link module temporarily acting as server.
        LinkServer = 0x31,
        BleClient = 0x32,
        BleServer = 0x33,
        Range = 0x40,
        /// The host running this SDK.
        Base = 0x70,
        ByScratch = 0x80,
        Scratch = 0x81,
        Entry = 0x82,
        Tester = 0xA0,
        Monitor = 0xA1,
        Updater = 0xA2,
        Encryptor = 0xA3,
        /// Only the directly adjacent device; it is not forwarded.
        Whispering = 0xFE,
        Broadcasting = 0xFF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bytes_roundtrip() {
        for &kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_u8(kind.as_u8()), Some(kind));
        }
    }

    #[test]
    fn known_tags_match_protocol() {
        assert_eq!(MessageKind::Ack.as_u8(), 0x02);
        assert_eq!(MessageKind::Control.as_u8(), 0x10);
        assert_eq!(MessageKind::State.as_u8(), 0x40);
        assert_eq!(DeviceType::Base.as_u8(), 0x70);
        assert_eq!(DeviceType::Drone.as_u8(), 0x10);
    }

    #[test]
    fn unmapped_bytes_are_rejected() {
        assert_eq!(MessageKind::from_u8(0x00), None);
        assert_eq!(MessageKind::from_u8(0x08), None);
        assert_eq!(MessageKind::from_u8(0xDC), None);
        assert_eq!(DeviceType::from_u8(0x11), None);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(MessageKind::from_name("state"), Some(MessageKind::State));
        assert_eq!(MessageKind::from_name("RawFlow"), Some(MessageKind::RawFlow));
        assert_eq!(DeviceType::from_name("CONTROLLER"), Some(DeviceType::Controller));
        assert_eq!(MessageKind::from_name("warp"), None);
        assert_eq!(MessageKind::Attitude.to_string(), "Attitude");
    }

    #[test]
    fn device_values_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for &device in DeviceType::ALL {
            assert!(seen.insert(device.as_u8()), "duplicate {device}");
        }
    }
}
