use std::fs;

use codrone_frame::{FrameConfig, Synchronizer};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frames, print_stats, FrameRecord, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = read_input(&args)?;

    // Captures have no meaningful arrival times.
    let mut sync = Synchronizer::with_config(FrameConfig {
        max_payload_size: args.max_payload,
        frame_timeout: None,
        ..FrameConfig::default()
    });
    let records: Vec<FrameRecord> = sync
        .push_slice(&bytes)
        .iter()
        .map(FrameRecord::from_received)
        .collect();

    print_frames(&records, format);
    print_stats(&sync.stats(), format);
    if sync.in_frame() {
        tracing::debug!(state = ?sync.state(), "capture ends inside a frame");
    }
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::usage("either --hex or --file is required"))
}
