use crate::index::lifecycle::DEFAULT_RETENTION_MONTHS;
use crate::source::filter::LineFilter;
use crate::source::follow::FollowConfig;
use crate::source::tailer::{TailerSettings, DEFAULT_RESUME_CUTOFF_HOUR};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub project: String,
    /// Files to tail, one tailer each
    pub logs: Vec<PathBuf>,
    pub es_host: String,
    pub es_index_prefix: String,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Lines ending with any of these are not shipped
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub tuning: TuningConfig,
}

fn default_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl WorkerConfig {
    pub fn line_filter(&self) -> LineFilter {
        LineFilter::new(self.exclude.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Age, in 30-day months, of the index deleted by each sweep
    pub retention_months: i64,
    /// Restarts at or after this local hour skip existing file content
    pub resume_cutoff_hour: u32,
    /// Pause between the end of one cycle and the start of the next
    #[serde(with = "humantime_serde")]
    pub cycle_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// How long a rotated-away file may stay missing before its tailer stops
    #[serde(with = "humantime_serde")]
    pub reopen_grace: Duration,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            retention_months: DEFAULT_RETENTION_MONTHS,
            resume_cutoff_hour: DEFAULT_RESUME_CUTOFF_HOUR,
            cycle_interval: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            reopen_grace: Duration::from_secs(60),
        }
    }
}

impl TuningConfig {
    pub fn tailer_settings(&self) -> TailerSettings {
        TailerSettings {
            resume_cutoff_hour: self.resume_cutoff_hour,
            retention_months: self.retention_months,
            follow: FollowConfig {
                poll_interval: self.poll_interval,
                reopen_grace: self.reopen_grace,
            },
        }
    }
}
