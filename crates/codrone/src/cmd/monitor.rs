use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codrone_frame::{FrameConfig, FrameError, FrameReader, Received};
use codrone_link::MessageKind;

use crate::cmd::{parse_duration, Endpoint, MonitorArgs};
use crate::exit::{frame_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, print_stats, FrameRecord, OutputFormat};

// How often the read loop wakes up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let stream = Endpoint::parse(&args.endpoint)?.connect(connect_timeout)?;
    let config = FrameConfig {
        read_timeout: Some(POLL_INTERVAL),
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config_link(stream, config)
        .map_err(|err| frame_error("monitor setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let received = match reader.read_frame() {
            Ok(received) => received,
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue
            }
            Err(FrameError::ConnectionClosed) => {
                tracing::info!("bridge closed the connection");
                break;
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        if !wanted(&received, args.kinds.as_deref()) {
            continue;
        }

        print_frame(&FrameRecord::from_received(&received), format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    if !matches!(format, OutputFormat::Json | OutputFormat::Raw) {
        print_stats(&reader.stats(), format);
    }
    Ok(SUCCESS)
}

fn wanted(received: &Received, kinds: Option<&[MessageKind]>) -> bool {
    match (kinds, received) {
        (None, _) => true,
        (Some(kinds), Received::Frame(frame)) => kinds.contains(&frame.kind()),
        (Some(_), Received::Unrecognized { .. }) => false,
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
