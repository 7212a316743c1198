use clap::Parser;
use iotfuzz_common::fuzz_report;
use iotfuzz_core::config::{DEFAULT_ITERATIONS, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_TIMEOUT_MS};
use iotfuzz_core::log::Logger;
use iotfuzz_core::output::Output;
use iotfuzz_core::{FuzzError, Protocol, SessionConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "iotfuzz", version, about = "Protocol fuzzer for IoT devices")]
struct IotFuzzCliArgs {
    /// Verbose mode
    #[arg(long, default_value_t = false)]
    verbose: bool,
    /// Target host name or IP address
    #[arg(long, short)]
    target: String,
    /// Target port
    #[arg(long, short)]
    port: u16,
    /// Protocols to fuzz (http, mqtt, coap, modbus, custom), one session per protocol
    #[arg(long, value_delimiter = ',', default_value = "http")]
    protocol: Vec<Protocol>,
    /// Number of messages sent per session
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Timeout in millis for connecting and awaiting a response
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
    /// Upper bound of the random payloads
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
    max_payload_size: usize,
    /// Seed of the random generator to replay a previous session
    #[arg(long)]
    seed: Option<u64>,
    /// output directory for the session reports
    #[arg(long, short)]
    out_dir: Option<PathBuf>,
    /// Reuse a non empty output directory
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl IotFuzzCliArgs {
    fn session_config(&self, protocol: Protocol) -> SessionConfig {
        let mut config = SessionConfig::new(self.target.clone(), self.port, protocol)
            .with_iterations(self.iterations)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_payload_size(self.max_payload_size);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = IotFuzzCliArgs::parse();
    let logger = Logger::init(args.verbose);
    tracing::debug!("Log level {}", logger.level_filter());

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one session per protocol and returns false if any of them failed
async fn run(args: IotFuzzCliArgs) -> Result<bool, FuzzError> {
    let output = args
        .out_dir
        .clone()
        .map(|dir| Output::init(dir, args.overwrite))
        .transpose()?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping all sessions");
            ctrl_c.cancel();
        }
    });

    let mut protocols = args.protocol.clone();
    protocols.sort_by_key(Protocol::as_str);
    protocols.dedup();

    let mut sessions = JoinSet::new();
    for protocol in protocols {
        sessions.spawn(fuzz_report(args.session_config(protocol), cancel.clone()));
    }

    let mut all_ok = true;
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok(Ok(report)) => {
                println!("{}", report.summary());
                for (index, result) in report.results.iter().enumerate() {
                    if let Some(err) = &result.error {
                        tracing::debug!("[{}] #{index}: {err}", report.config.protocol);
                    }
                }
                if let Some(output) = &output {
                    let path = output.save_report(&report)?;
                    tracing::info!("Saved results to {}", path.display());
                }
            }
            Ok(Err(err)) => {
                all_ok = false;
                tracing::error!("{err}");
            }
            Err(err) => {
                all_ok = false;
                tracing::error!("Fuzzing task failed: {err}");
            }
        }
    }
    Ok(all_ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let args = IotFuzzCliArgs::try_parse_from([
            "iotfuzz",
            "--target",
            "192.168.0.10",
            "--port",
            "502",
            "--protocol",
            "modbus,coap",
            "--iterations",
            "20",
            "--seed",
            "7",
        ])
        .expect("valid arguments");
        assert_eq!(args.protocol, vec![Protocol::Modbus, Protocol::Coap]);

        let config = args.session_config(Protocol::Modbus);
        assert_eq!(config.address(), "192.168.0.10:502");
        assert_eq!(config.iterations, 20);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.max_payload_size, 4096);
    }

    #[test]
    fn test_timeout_argument() {
        let args = IotFuzzCliArgs::try_parse_from([
            "iotfuzz",
            "-t",
            "10.0.0.2",
            "-p",
            "1883",
            "--timeout-ms",
            "250",
        ])
        .expect("valid arguments");
        let config = args.session_config(Protocol::Mqtt);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_protocol_is_rejected() {
        let parsed =
            IotFuzzCliArgs::try_parse_from(["iotfuzz", "-t", "h", "-p", "1", "--protocol", "ftp"]);
        assert!(parsed.is_err());
    }
}
