//! The output directory contains one file per fuzzed protocol:
//!
//! - `<protocol>_results.json`: the `SessionReport` with config, seed, statistics and every
//!   `FuzzingResult` of the session
//!

use crate::error::{FuzzError, FuzzOutcome};
use crate::types::{Protocol, SessionReport};
use std::path::{Path, PathBuf};

/// Manages the output directory like creating the needed folders and storing the reports
#[derive(Clone)]
pub struct Output {
    path: PathBuf,
}

impl Output {
    /// create a new output directory instance
    /// # Errors
    /// Fails if the directory exists and `overwrite` is not set, or it cannot be created.
    pub fn init(path: PathBuf, overwrite: bool) -> FuzzOutcome<Self> {
        if path.is_dir() {
            if !overwrite && std::fs::read_dir(&path)?.next().is_some() {
                return Err(FuzzError::InvalidConfig {
                    err_msg: format!(
                        "output directory {} is not empty, use `--overwrite` to reuse it",
                        path.display()
                    ),
                });
            }
        } else {
            tracing::info!("Created output directory: {}", path.display());
            std::fs::create_dir_all(&path)?;
        }
        Ok(Self { path })
    }

    /// The root of the output directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn get_results_file(&self, protocol: Protocol) -> PathBuf {
        self.path.join(format!("{protocol}_results.json"))
    }

    /// Writes the report as pretty printed JSON and returns the path of the file
    /// # Errors
    pub fn save_report(&self, report: &SessionReport) -> FuzzOutcome<PathBuf> {
        let path = self.get_results_file(report.config.protocol);
        let content = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Loads a report written by `save_report`
    /// # Errors
    pub fn load_report(&self, protocol: Protocol) -> FuzzOutcome<SessionReport> {
        let content = std::fs::read_to_string(self.get_results_file(protocol))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::fuzz::stats::SessionStats;
    use crate::types::{Details, FuzzingResult};

    #[test]
    fn test_save_and_load_report() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("report");
        let output = Output::init(dir.clone(), false).expect("init");
        let report = SessionReport {
            config: SessionConfig::new("10.1.1.1", 5683, Protocol::Coap).with_seed(5),
            seed: 5,
            stats: SessionStats::default(),
            results: vec![FuzzingResult::sent(
                Protocol::Coap,
                vec![0x41, 0x00, 0x12, 0x34, 0xff],
                None,
                Details::new(),
            )],
        };
        let path = output.save_report(&report).expect("save");
        assert!(path.ends_with("coap_results.json"));

        let loaded = output.load_report(Protocol::Coap).expect("load");
        assert_eq!(loaded.seed, 5);
        assert_eq!(loaded.results, report.results);
        assert_eq!(loaded.config, report.config);

        assert!(Output::init(dir.clone(), false).is_err());
        assert!(Output::init(dir, true).is_ok());
    }
}
