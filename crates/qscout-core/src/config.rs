use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration for quizscout.
///
/// Everything has a working default; env vars override, with an optional
/// `.env` file loaded first (never overriding real env).
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the answers API.
    pub answers_api_url: String,

    /// Hard bound on one answers fetch; the cache rebuild is gated on the
    /// fetch completing inside this window.
    pub fetch_timeout: Duration,

    /// Settle delay after a mutation batch before re-reading the current
    /// question, so a half-rendered question is never read.
    pub settle_delay: Duration,

    /// Pause between detecting a room code and kicking off the load.
    pub auto_load_delay: Duration,

    /// Require the element surrounding a room-code candidate to be visibly
    /// rendered. Rejects hidden templates and off-screen duplicates.
    pub require_visible_identifier: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let answers_api_url = env_str("QSCOUT_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://api.quizit.online".to_string());

        if !answers_api_url.starts_with("http") {
            return Err(Error::Config(format!(
                "QSCOUT_API_URL is not an http(s) url: {answers_api_url}"
            )));
        }

        let fetch_timeout =
            Duration::from_millis(env_u64("QSCOUT_FETCH_TIMEOUT_MS").unwrap_or(8_000));
        let settle_delay =
            Duration::from_millis(env_u64("QSCOUT_SETTLE_DELAY_MS").unwrap_or(300));
        let auto_load_delay =
            Duration::from_millis(env_u64("QSCOUT_AUTO_LOAD_DELAY_MS").unwrap_or(300));
        let require_visible_identifier =
            env_bool("QSCOUT_REQUIRE_VISIBLE").unwrap_or(true);

        Ok(Self {
            answers_api_url,
            fetch_timeout,
            settle_delay,
            auto_load_delay,
            require_visible_identifier,
        })
    }
}

impl Default for Config {
    /// Built-in defaults without touching the environment. Used by tests and
    /// embedders that configure programmatically.
    fn default() -> Self {
        Self {
            answers_api_url: "https://api.quizit.online".to_string(),
            fetch_timeout: Duration::from_secs(8),
            settle_delay: Duration::from_millis(300),
            auto_load_delay: Duration::from_millis(300),
            require_visible_identifier: true,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
