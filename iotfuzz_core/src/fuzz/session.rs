use crate::config::SessionConfig;
use crate::error::{FuzzError, FuzzOutcome};
use crate::fuzz::stats::{SessionStats, StatsType};
use crate::mutator::Mutator;
use crate::protocol::ProtocolEncoder;
use crate::traits::{Encoded, Encoder, Transport};
use crate::types::{Details, FuzzingResult, Protocol, SessionReport};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a session.
///
/// `Init` connects the transport. A failure there ends in `Failed` without any result. Every
/// iteration runs in `Running` and the session ends in `Done` after exactly `iterations`
/// results, or in `Failed` if it was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started or connecting the transport
    Init,
    /// Running the iteration with the given index
    Running {
        /// Zero based index of the current iteration
        iteration: usize,
    },
    /// All iterations were recorded
    Done,
    /// Setup failed or the session was aborted
    Failed,
}

/// Phases of a single iteration, recorded as `phase` when an iteration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The encoder builds the message
    Build,
    /// The message is written to the transport
    Send,
    /// Waiting for the response or the timeout
    Await,
}

impl Phase {
    /// Name stored in the result details
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Build => "build",
            Phase::Send => "send",
            Phase::Await => "await",
        }
    }
}

// One iteration: BUILD -> SEND -> AWAIT -> RECORD. Every failure jumps straight to RECORD.
enum Step {
    Build,
    Send(Encoded),
    Await(Encoded),
    Record(FuzzingResult),
}

// Why the session loop stopped early
enum Stop {
    Setup(FuzzError),
    Aborted(String),
}

/// One fuzzing campaign against a single target, port and protocol.
///
/// The session exclusively owns its transport and sends the messages strictly one after
/// another. Per iteration failures are recorded in the result list and never stop the session.
pub struct FuzzSession<T: Transport> {
    config: SessionConfig,
    transport: T,
    encoder: ProtocolEncoder,
    mutator: Mutator<ChaChaRng>,
    seed: u64,
    state: SessionState,
    stats: StatsType,
    unique_responses: HashSet<Vec<u8>>,
    read_buffer: Vec<u8>,
    results: Vec<FuzzingResult>,
}

impl<T: Transport> FuzzSession<T> {
    /// Creates a new session. If the config has no seed a random one is drawn, it can be
    /// read with `seed()` to replay the session.
    /// # Errors
    /// Returns `InvalidConfig` if the config does not validate.
    pub fn new(config: SessionConfig, transport: T) -> FuzzOutcome<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());

        Ok(Self {
            encoder: ProtocolEncoder::from_config(&config),
            mutator: Mutator::new(ChaChaRng::seed_from_u64(seed)),
            read_buffer: vec![0; config.read_buffer_size],
            results: Vec::with_capacity(config.iterations),
            stats: Arc::default(),
            unique_responses: HashSet::default(),
            state: SessionState::Init,
            seed,
            config,
            transport,
        })
    }

    /// The seed of the random generator
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The current state of the session
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The config the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Handle to the statistics, can be read while the session is running
    pub fn stats(&self) -> StatsType {
        self.stats.clone()
    }

    /// Runs all iterations and returns one result per iteration.
    /// # Errors
    /// `ConnectionFailed` if the transport could not be set up, `SessionAborted` if the
    /// connection was lost for good.
    pub async fn run(&mut self) -> FuzzOutcome<Vec<FuzzingResult>> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Like `run`, but stops as soon as `cancel` is triggered.
    /// # Errors
    /// In addition to the errors of `run`, returns `SessionAborted` carrying the results
    /// completed so far when the session was cancelled.
    pub async fn run_with_cancel(
        &mut self,
        cancel: CancellationToken,
    ) -> FuzzOutcome<Vec<FuzzingResult>> {
        self.run_report(cancel).await.map(|report| report.results)
    }

    /// Runs the session and returns the results together with seed and statistics.
    /// # Errors
    /// See `run_with_cancel`.
    pub async fn run_report(&mut self, cancel: CancellationToken) -> FuzzOutcome<SessionReport> {
        if self.state != SessionState::Init {
            return Err(FuzzError::InvalidConfig {
                err_msg: "a session can only be run once".to_owned(),
            });
        }

        let outcome = self.execute(&cancel).await;

        // the transport is released on every exit path
        if let Err(err) = self.transport.close().await {
            tracing::warn!("Closing {} failed: {err}", self.transport.title());
        }
        if let Ok(mut stats) = self.stats.write() {
            stats.finish();
        }

        match outcome {
            Ok(()) => {
                self.state = SessionState::Done;
                tracing::info!(
                    "Completed fuzzing with {} results ({})",
                    self.results.len(),
                    self.transport.title()
                );
                Ok(SessionReport {
                    config: self.config.clone(),
                    seed: self.seed,
                    stats: self.snapshot(),
                    results: std::mem::take(&mut self.results),
                })
            }
            Err(Stop::Setup(err)) => {
                self.state = SessionState::Failed;
                tracing::error!("Fuzzing failed: {err}");
                Err(err)
            }
            Err(Stop::Aborted(reason)) => {
                self.state = SessionState::Failed;
                tracing::error!(
                    "Fuzzing aborted after {} results: {reason}",
                    self.results.len()
                );
                Err(FuzzError::SessionAborted {
                    reason,
                    partial: std::mem::take(&mut self.results),
                })
            }
        }
    }

    async fn execute(&mut self, cancel: &CancellationToken) -> Result<(), Stop> {
        let title = self.transport.title();
        tracing::info!(
            "Starting protocol fuzzing for {} using {} ({} iterations, seed {})",
            title,
            self.config.protocol,
            self.config.iterations,
            self.seed
        );

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Stop::Aborted("cancelled".to_owned())),
            connected = self.transport.connect() => connected,
        };
        connected.map_err(|err| Stop::Setup(connection_failed(&title, err)))?;

        if let Ok(mut stats) = self.stats.write() {
            stats.start(title);
        }

        for iteration in 0..self.config.iterations {
            self.state = SessionState::Running { iteration };

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Stop::Aborted("cancelled".to_owned())),
                outcome = self.iteration() => outcome,
            };

            match outcome {
                Ok(result) => self.record(result),
                Err(err) => return Err(Stop::Aborted(err.to_string())),
            }
        }
        Ok(())
    }

    /// Builds, sends and awaits one message. Only a failed reconnect is returned as error,
    /// every other failure is part of the returned result.
    async fn iteration(&mut self) -> FuzzOutcome<FuzzingResult> {
        if !self.transport.is_connected() {
            // the target closed the connection during the previous iteration
            tracing::info!("Reconnecting to {}", self.transport.title());
            if let Err(err) = self.transport.connect().await {
                return Err(connection_failed(&self.transport.title(), err));
            }
            if let Ok(mut stats) = self.stats.write() {
                stats.reconnects += 1;
            }
        }

        let protocol = self.encoder.protocol();
        let mut step = Step::Build;
        loop {
            step = match step {
                Step::Build => match self.encoder.encode(&mut self.mutator) {
                    Ok(encoded) => Step::Send(encoded),
                    Err(err) => Step::Record(failed(
                        protocol,
                        Phase::Build,
                        vec![],
                        Details::new(),
                        &err,
                    )),
                },
                Step::Send(encoded) => {
                    tracing::debug!(
                        "Sending: {:X?}",
                        encoded.bytes.iter().take(25).collect::<Vec<&u8>>()
                    );
                    match self.transport.send(&encoded.bytes).await {
                        Ok(()) => Step::Await(encoded),
                        Err(err) => Step::Record(failed(
                            protocol,
                            Phase::Send,
                            encoded.bytes,
                            encoded.details,
                            &err,
                        )),
                    }
                }
                Step::Await(encoded) => match self.transport.receive(&mut self.read_buffer).await {
                    Ok(Some(0)) => Step::Record(failed(
                        protocol,
                        Phase::Await,
                        encoded.bytes,
                        encoded.details,
                        &FuzzError::ConnectionClosed,
                    )),
                    Ok(Some(size)) => Step::Record(FuzzingResult::sent(
                        protocol,
                        encoded.bytes,
                        Some(self.read_buffer[..size].to_vec()),
                        encoded.details,
                    )),
                    Ok(None) => Step::Record(FuzzingResult::sent(
                        protocol,
                        encoded.bytes,
                        None,
                        encoded.details,
                    )),
                    Err(err) => Step::Record(failed(
                        protocol,
                        Phase::Await,
                        encoded.bytes,
                        encoded.details,
                        &err,
                    )),
                },
                Step::Record(result) => return Ok(result),
            };
        }
    }

    fn record(&mut self, result: FuzzingResult) {
        if let Ok(mut stats) = self.stats.write() {
            stats.total_executions += 1;

            if let Some(response) = result.response.as_deref() {
                stats.total_responses += 1;

                let mut hasher = Sha1::new();
                hasher.update(response);
                if self.unique_responses.insert(hasher.finalize().to_vec()) {
                    stats.total_unique_responses += 1;
                    let shown = response.len().min(5);
                    tracing::info!(
                        "Got unique response: {:X?} ({shown} of {} shown)",
                        &response[..shown],
                        response.len()
                    );
                }
            }

            if result.error.is_some() {
                stats.total_errors += 1;
                if result.details.get("error_type").and_then(|v| v.as_str()) == Some("timeout") {
                    stats.total_timeouts += 1;
                }
            }
        }
        self.results.push(result);
    }

    fn snapshot(&self) -> SessionStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}

fn failed(
    protocol: Protocol,
    phase: Phase,
    input: Vec<u8>,
    mut details: Details,
    err: &FuzzError,
) -> FuzzingResult {
    tracing::warn!("[{}] {err}", phase.as_str().to_uppercase());
    details.insert("phase".into(), phase.as_str().into());
    FuzzingResult::failed(protocol, input, err, details)
}

fn connection_failed(title: &str, err: FuzzError) -> FuzzError {
    match err {
        err @ FuzzError::ConnectionFailed { .. } => err,
        err => FuzzError::ConnectionFailed {
            err_msg: format!("{title}: {err}"),
        },
    }
}
