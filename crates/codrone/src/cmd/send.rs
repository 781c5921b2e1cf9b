use codrone_link::{Link, LinkConfig, Message, RetryPolicy};

use crate::cmd::{parse_duration, parse_hex, Endpoint, SendArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_hex(&args.frame.hex)?;
    let policy = retry_policy(&args)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;

    let endpoint = Endpoint::parse(&args.endpoint)?;
    let stream = endpoint.connect(connect_timeout)?;
    let config = LinkConfig {
        retry: policy,
        source: args.frame.from,
        destination: args.frame.to,
        ..LinkConfig::default()
    };
    let mut link = Link::open(stream, config).map_err(|err| link_error("open failed", err))?;

    let kind = args.frame.kind;
    let result = if args.confirm {
        link.send_and_confirm(Message::raw(kind, payload.clone()))
    } else {
        link.send_raw(kind, &payload)
    };
    let stats = link.close();
    tracing::debug!(
        frames = stats.frames,
        discarded = stats.discarded(),
        "link closed"
    );
    result.map_err(|err| link_error("send failed", err))?;

    print_sent(
        kind.name(),
        args.frame.to.name(),
        payload.len(),
        args.confirm,
        format,
    );
    Ok(SUCCESS)
}

fn retry_policy(args: &SendArgs) -> CliResult<RetryPolicy> {
    if args.retries == 0 {
        return Err(CliError::usage("--retries must be at least 1"));
    }
    Ok(RetryPolicy {
        max_attempts: args.retries,
        attempt_timeout: parse_duration(&args.ack_timeout)?,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use codrone_link::{DeviceType, MessageKind};

    use super::*;
    use crate::cmd::FrameArgs;

    fn args(retries: u32, ack_timeout: &str) -> SendArgs {
        SendArgs {
            endpoint: "/tmp/drone.sock".to_string(),
            frame: FrameArgs {
                kind: MessageKind::Command,
                hex: "0100".to_string(),
                from: DeviceType::Base,
                to: DeviceType::Drone,
            },
            confirm: true,
            retries,
            ack_timeout: ack_timeout.to_string(),
            connect_timeout: "5s".to_string(),
        }
    }

    #[test]
    fn retry_policy_from_flags() {
        let policy = retry_policy(&args(5, "150ms")).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.attempt_timeout, Duration::from_millis(150));
        assert_eq!(policy.worst_case(), Duration::from_millis(750));
    }

    #[test]
    fn zero_retries_is_usage_error() {
        let err = retry_policy(&args(0, "150ms")).unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
