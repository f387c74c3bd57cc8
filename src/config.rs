use crate::error::ConfigError;
use crate::http::{HttpSettings, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT};
use crate::poller::PollerSettings;
use crate::scrapers::types::{origin_of, ExtractConfig};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BOT_USERNAME: &str = "OLX Sniper Bot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenBackendKind {
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct SeenSettings {
    pub backend: SeenBackendKind,
    pub path: PathBuf,
}

/// Credentials for the listing API. The bot has no API client; when these are
/// set it says so and keeps scraping.
#[derive(Debug, Clone, Default)]
pub struct ApiCredentials {
    pub base: String,
    pub token: String,
}

impl ApiCredentials {
    pub fn is_complete(&self) -> bool {
        !self.base.is_empty() && !self.token.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_url: String,
    pub bot_username: String,
    pub http: HttpSettings,
    pub extract: ExtractConfig,
    pub seen: SeenSettings,
    pub poller: PollerSettings,
    pub api: ApiCredentials,
    pub health_port: Option<u16>,
}

impl Config {
    /// Load `ini.env` and `.env` when present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::from_filename("ini.env").ok();
        dotenvy::dotenv().ok();
        build_config(|key| std::env::var(key))
    }
}

/// Core parsing and validation, decoupled from the real environment.
pub fn build_config<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let get = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let require = |var: &str| -> Result<String, ConfigError> {
        get(var).ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        get(var).unwrap_or_else(|| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: u64| -> Result<u64, ConfigError> {
        match get(var) {
            Some(raw) => raw.parse::<u64>().map_err(|e| invalid(var, e.to_string())),
            None => Ok(default),
        }
    };

    let parse_positive = |var: &str, default: u64| -> Result<u64, ConfigError> {
        let value = parse_u64(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let search_url = require("OLX_SEARCH_URL")?;
    let base_origin = origin_of(&search_url)
        .ok_or_else(|| invalid("OLX_SEARCH_URL", "not an absolute http(s) URL".to_string()))?;

    let webhook_url = require("DISCORD_WEBHOOK_URL")?;
    if origin_of(&webhook_url).is_none() {
        return Err(invalid(
            "DISCORD_WEBHOOK_URL",
            "not an absolute http(s) URL".to_string(),
        ));
    }

    let seen_backend = match or_default("SEEN_BACKEND", "json").to_lowercase().as_str() {
        "json" => SeenBackendKind::Json,
        "sqlite" => SeenBackendKind::Sqlite,
        "memory" => SeenBackendKind::Memory,
        other => {
            return Err(invalid(
                "SEEN_BACKEND",
                format!("expected json, sqlite or memory, got \"{other}\""),
            ))
        }
    };

    let health_port = get("PORT")
        .map(|raw| raw.parse::<u16>().map_err(|e| invalid("PORT", e.to_string())))
        .transpose()?;

    let keywords = get("KEYWORDS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let max_results = usize::try_from(parse_positive("MAX_RESULTS", 50)?)
        .map_err(|e| invalid("MAX_RESULTS", e.to_string()))?;
    let seen_max = usize::try_from(parse_positive("SEEN_MAX", 1000)?)
        .map_err(|e| invalid("SEEN_MAX", e.to_string()))?;
    if max_results > seen_max / 2 {
        return Err(invalid(
            "SEEN_MAX",
            format!(
                "pruning keeps {} ids, fewer than MAX_RESULTS ({max_results}) listings per page",
                seen_max / 2
            ),
        ));
    }

    Ok(Config {
        webhook_url,
        bot_username: or_default("BOT_USERNAME", DEFAULT_BOT_USERNAME),
        http: HttpSettings {
            user_agent: or_default("USER_AGENT", DEFAULT_USER_AGENT),
            accept_language: or_default("ACCEPT_LANGUAGE", DEFAULT_ACCEPT_LANGUAGE),
            timeout: Duration::from_secs(parse_positive("REQUEST_TIMEOUT_SECS", 30)?),
        },
        extract: ExtractConfig {
            base_origin,
            listing_path: or_default("LISTING_PATH", "/oferta/"),
            max_results,
            keywords,
            default_currency: or_default("DEFAULT_CURRENCY", "zł"),
        },
        seen: SeenSettings {
            backend: seen_backend,
            path: PathBuf::from(or_default("SEEN_FILE", "./seen.json")),
        },
        poller: PollerSettings {
            search_url,
            interval: Duration::from_secs(parse_positive("POLL_INTERVAL", 45)?),
            notify_pause: Duration::from_secs(parse_u64("NOTIFY_PAUSE_SECS", 5)?),
            failure_cooldown: Duration::from_secs(parse_u64("FAILURE_COOLDOWN_SECS", 30)?),
            seen_max,
        },
        api: ApiCredentials {
            base: or_default("OLX_API_BASE", ""),
            token: or_default("OLX_API_TOKEN", ""),
        },
        health_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env::VarError;

    fn lookup_from(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, VarError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned().ok_or(VarError::NotPresent)
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("OLX_SEARCH_URL", "https://www.olx.pl/oferty/q-iphone/?search%5Border%5D=created_at:desc"),
        ("DISCORD_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_set() {
        let config = build_config(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.extract.base_origin, "https://www.olx.pl");
        assert_eq!(config.extract.listing_path, "/oferta/");
        assert_eq!(config.extract.max_results, 50);
        assert!(config.extract.keywords.is_empty());
        assert_eq!(config.poller.interval, Duration::from_secs(45));
        assert_eq!(config.poller.notify_pause, Duration::from_secs(5));
        assert_eq!(config.poller.seen_max, 1000);
        assert_eq!(config.seen.backend, SeenBackendKind::Json);
        assert_eq!(config.seen.path, PathBuf::from("./seen.json"));
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.bot_username, DEFAULT_BOT_USERNAME);
        assert_eq!(config.health_port, None);
        assert!(!config.api.is_complete());
    }

    #[test]
    fn missing_search_url_is_fatal() {
        let err = build_config(lookup_from(&[REQUIRED[1]])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "OLX_SEARCH_URL"));
    }

    #[test]
    fn blank_webhook_counts_as_missing() {
        let err = build_config(lookup_from(&[REQUIRED[0], ("DISCORD_WEBHOOK_URL", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "DISCORD_WEBHOOK_URL"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("POLL_INTERVAL", "15"),
            ("KEYWORDS", "iphone, iPhone 15 ,,"),
            ("SEEN_BACKEND", "SQLite"),
            ("SEEN_FILE", "/data/seen.sqlite"),
            ("MAX_RESULTS", "20"),
            ("PORT", "8080"),
            ("OLX_API_BASE", "https://api.example"),
            ("OLX_API_TOKEN", "secret"),
        ]);
        let config = build_config(lookup_from(&vars)).unwrap();

        assert_eq!(config.poller.interval, Duration::from_secs(15));
        assert_eq!(config.extract.keywords, vec!["iphone", "iPhone 15"]);
        assert_eq!(config.seen.backend, SeenBackendKind::Sqlite);
        assert_eq!(config.seen.path, PathBuf::from("/data/seen.sqlite"));
        assert_eq!(config.extract.max_results, 20);
        assert_eq!(config.health_port, Some(8080));
        assert!(config.api.is_complete());
    }

    #[test]
    fn seen_max_must_hold_a_full_page_after_pruning() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("MAX_RESULTS", "50"), ("SEEN_MAX", "99")]);
        let err = build_config(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "SEEN_MAX"));

        let mut vars = REQUIRED.to_vec();
        vars.extend([("MAX_RESULTS", "50"), ("SEEN_MAX", "100")]);
        assert_eq!(build_config(lookup_from(&vars)).unwrap().poller.seen_max, 100);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (var, value) in [
            ("POLL_INTERVAL", "soon"),
            ("POLL_INTERVAL", "0"),
            ("SEEN_BACKEND", "redis"),
            ("PORT", "70000"),
            ("OLX_SEARCH_URL", "olx.pl/oferty"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.retain(|(k, _)| *k != var);
            vars.push((var, value));
            let err = build_config(lookup_from(&vars)).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnvVar { var: ref v, .. } if v == var),
                "{var}={value} gave {err:?}"
            );
        }
    }
}
