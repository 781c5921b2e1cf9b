use bytes::BytesMut;
use codrone_frame::{encode_frame, Header};

use crate::cmd::{parse_hex, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_hex(&args.frame.hex)?;
    let wire = encode(&args, &payload)?;
    print_encoded(
        args.frame.kind.name(),
        args.frame.from.name(),
        args.frame.to.name(),
        payload.len(),
        &wire,
        format,
    );
    Ok(SUCCESS)
}

fn encode(args: &EncodeArgs, payload: &[u8]) -> CliResult<BytesMut> {
    let header = Header::new(args.frame.kind, payload.len(), args.frame.from, args.frame.to)
        .map_err(|err| frame_error("encode failed", err))?;
    let mut wire = BytesMut::with_capacity(header.payload_len() + 8);
    encode_frame(&header, payload, &mut wire).map_err(|err| frame_error("encode failed", err))?;
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use codrone_link::{DeviceType, MessageKind};

    use super::*;
    use crate::cmd::FrameArgs;
    use crate::exit::DATA_INVALID;

    fn args(kind: MessageKind) -> EncodeArgs {
        EncodeArgs {
            frame: FrameArgs {
                kind,
                hex: String::new(),
                from: DeviceType::Base,
                to: DeviceType::Drone,
            },
        }
    }

    #[test]
    fn encodes_request_frame() {
        let wire = encode(&args(MessageKind::Request), &[0x40]).unwrap();
        assert_eq!(&wire[..7], &[0x0A, 0x55, 0x04, 0x01, 0x70, 0x10, 0x40]);
        assert_eq!(wire.len(), 9);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = encode(&args(MessageKind::DisplayDrawString), &[0u8; 256]).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }
}
