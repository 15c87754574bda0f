//! Process configuration from environment variables

use crate::session::{clamp_base_duration, Settings};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Timing and capacity knobs for the session engine
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long results stay up before the next question starts
    pub results_delay: Duration,
    /// Period of the missed-deadline poll
    pub watchdog_interval: Duration,
    /// Slack added to the one-shot deadline timer
    pub deadline_grace: Duration,
    pub max_players: usize,
    /// Shown to players in `lobby:update`
    pub port: u16,
    pub lobby_addresses: Vec<String>,
    pub initial_settings: Settings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            results_delay: Duration::from_millis(3000),
            watchdog_interval: Duration::from_millis(500),
            deadline_grace: Duration::from_millis(50),
            max_players: 50,
            port: 3000,
            lobby_addresses: Vec::new(),
            initial_settings: Settings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub static_dir: PathBuf,
    pub sample_questions_path: PathBuf,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load config from environment variables. Unparseable values are
    /// logged and replaced by their defaults.
    pub fn from_env() -> Self {
        let defaults = SessionConfig::default();

        let port = parse_var("PORT").unwrap_or(defaults.port);
        let bind_addr = parse_var("BIND_ADDR").unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let static_dir = std::env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));
        let sample_questions_path = std::env::var("SAMPLE_QUESTIONS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("questions.sample.json"));

        let lobby_addresses: Vec<String> = std::env::var("LOBBY_ADDRESSES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if lobby_addresses.is_empty() {
            tracing::warn!("LOBBY_ADDRESSES not set - players will not see a join address");
        }

        let initial_settings = Settings {
            team_mode: parse_bool("TEAM_MODE").unwrap_or(false),
            shuffle_choices: parse_bool("SHUFFLE_CHOICES").unwrap_or(true),
            base_duration: parse_var::<i64>("BASE_DURATION").map(clamp_base_duration),
        };

        let session = SessionConfig {
            results_delay: parse_millis("RESULTS_DELAY_MS").unwrap_or(defaults.results_delay),
            watchdog_interval: parse_millis("WATCHDOG_INTERVAL_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.watchdog_interval),
            deadline_grace: parse_millis("DEADLINE_GRACE_MS").unwrap_or(defaults.deadline_grace),
            max_players: parse_var("MAX_PLAYERS").unwrap_or(defaults.max_players),
            port,
            lobby_addresses,
            initial_settings,
        };

        Self {
            bind_addr,
            port,
            static_dir,
            sample_questions_path,
            session,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

fn parse_bool(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!("Ignoring invalid boolean for {}: {:?}", key, raw);
            None
        }
    }
}

fn parse_millis(key: &str) -> Option<Duration> {
    parse_var::<u64>(key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "PORT",
        "BIND_ADDR",
        "STATIC_DIR",
        "SAMPLE_QUESTIONS_PATH",
        "LOBBY_ADDRESSES",
        "RESULTS_DELAY_MS",
        "WATCHDOG_INTERVAL_MS",
        "DEADLINE_GRACE_MS",
        "MAX_PLAYERS",
        "TEAM_MODE",
        "SHUFFLE_CHOICES",
        "BASE_DURATION",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = AppConfig::from_env();

        assert_eq!(config.port, 3000);
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.session.results_delay, Duration::from_millis(3000));
        assert_eq!(config.session.watchdog_interval, Duration::from_millis(500));
        assert_eq!(config.session.max_players, 50);
        assert!(config.session.lobby_addresses.is_empty());
        assert_eq!(config.session.initial_settings, Settings::default());
    }

    #[test]
    #[serial]
    fn test_values_from_env() {
        clear_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("LOBBY_ADDRESSES", "192.168.1.10, 10.0.0.2,");
        std::env::set_var("RESULTS_DELAY_MS", "5000");
        std::env::set_var("TEAM_MODE", "true");
        std::env::set_var("BASE_DURATION", "300");

        let config = AppConfig::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session.port, 8080);
        assert_eq!(
            config.session.lobby_addresses,
            vec!["192.168.1.10".to_string(), "10.0.0.2".to_string()]
        );
        assert_eq!(config.session.results_delay, Duration::from_millis(5000));
        assert!(config.session.initial_settings.team_mode);
        assert_eq!(config.session.initial_settings.base_duration, Some(120));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("WATCHDOG_INTERVAL_MS", "0");
        std::env::set_var("SHUFFLE_CHOICES", "maybe");

        let config = AppConfig::from_env();
        assert_eq!(config.port, 3000);
        assert_eq!(config.session.watchdog_interval, Duration::from_millis(500));
        assert!(config.session.initial_settings.shuffle_choices);

        clear_env();
    }
}
