//! Client configuration: defaults, overlaid by `CARDKEEP_*` environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// Hard ceiling on injected latency; the simulated backend never hangs.
pub const MAX_SIMULATED_LATENCY: Duration = Duration::from_secs(5);

const DEV_SECRET: &str = "cardkeep-dev-secret";

/// Bounds of the latency the simulated backend injects before each call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyProfile {
    min_ms: u64,
    max_ms: u64,
}

impl LatencyProfile {
    /// `min`/`max` are swapped if inverted and clamped to
    /// [`MAX_SIMULATED_LATENCY`].
    pub fn new(min: Duration, max: Duration) -> Self {
        let cap = MAX_SIMULATED_LATENCY.as_millis() as u64;
        let (a, b) = (min.as_millis() as u64, max.as_millis() as u64);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            min_ms: lo.min(cap),
            max_ms: hi.min(cap),
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Pick a delay uniformly within the bounds.
    pub fn sample(&self) -> Duration {
        let cap = MAX_SIMULATED_LATENCY.as_millis() as u64;
        let (lo, hi) = (self.min_ms.min(cap), self.max_ms.min(cap));
        if lo >= hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Parse `"200-800"` or a single number of milliseconds.
    fn parse(raw: &str) -> anyhow::Result<Self> {
        let parse_ms = |s: &str| {
            s.trim()
                .parse::<u64>()
                .with_context(|| format!("invalid latency '{s}' (expected milliseconds)"))
        };
        match raw.split_once('-') {
            Some((lo, hi)) => Ok(Self::new(
                Duration::from_millis(parse_ms(lo)?),
                Duration::from_millis(parse_ms(hi)?),
            )),
            None => Ok(Self::fixed(Duration::from_millis(parse_ms(raw)?))),
        }
    }
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(800))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub offline_latency: LatencyProfile,
    pub credential_secret: String,
    pub data_dir: Option<PathBuf>,
    pub autosave_offline: bool,
    pub initial_backend: BackendKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 10,
            offline_latency: LatencyProfile::default(),
            credential_secret: DEV_SECRET.to_string(),
            data_dir: None,
            autosave_offline: true,
            initial_backend: BackendKind::Simulated,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `CARDKEEP_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("CARDKEEP_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("CARDKEEP_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("invalid CARDKEEP_REQUEST_TIMEOUT_SECS '{secs}'"))?;
        }
        if let Some(latency) = lookup("CARDKEEP_OFFLINE_LATENCY_MS") {
            config.offline_latency =
                LatencyProfile::parse(&latency).context("invalid CARDKEEP_OFFLINE_LATENCY_MS")?;
        }
        match lookup("CARDKEEP_CREDENTIAL_SECRET") {
            Some(secret) if !secret.is_empty() => config.credential_secret = secret,
            _ => tracing::warn!("CARDKEEP_CREDENTIAL_SECRET not set; using insecure dev default"),
        }
        if let Some(dir) = lookup("CARDKEEP_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = lookup("CARDKEEP_AUTOSAVE") {
            config.autosave_offline = parse_bool(&flag)
                .with_context(|| format!("invalid CARDKEEP_AUTOSAVE '{flag}'"))?;
        }
        if let Some(backend) = lookup("CARDKEEP_BACKEND") {
            config.initial_backend = backend
                .parse()
                .with_context(|| format!("invalid CARDKEEP_BACKEND '{backend}'"))?;
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured data directory, or `{app_data_dir}/cardkeep`.
    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }

        let mut dir = dirs::data_dir()
            .or_else(|| {
                dirs::home_dir().map(|mut h| {
                    h.push(".local");
                    h.push("share");
                    h
                })
            })
            .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;
        dir.push("cardkeep");
        Ok(dir)
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}
