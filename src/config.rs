//! Configuration loader and validator for the office notification relay.
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

pub const DEFAULT_PORT: u16 = 8080;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Supabase project base URL, e.g. `https://xyzcompany.supabase.co`.
    pub supabase_url: String,
    /// Service-role key used for both PostgREST and Realtime access.
    pub supabase_service_role_key: String,
    /// Mailbox the Gmail sender impersonates via domain-wide delegation.
    pub impersonate_user: String,
    /// Path to the Google service-account key file.
    pub google_credentials_path: String,
    /// HTTP listen port.
    pub port: u16,
}

/// Load configuration from the process environment and validate it.
/// Missing required variables are fatal; the caller exits instead of
/// starting degraded.
pub fn load() -> Result<Config, ConfigError> {
    from_lookup(|name| env::var(name).ok())
}

/// Build a config from an arbitrary variable lookup. Split out from
/// [`load`] so tests never have to mutate the real environment.
pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &'static str| -> Result<String, ConfigError> {
        match lookup(name) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::Missing(name)),
        }
    };

    let port = match lookup("PORT") {
        Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
            var: "PORT",
            reason: e.to_string(),
        })?,
        None => DEFAULT_PORT,
    };

    Ok(Config {
        supabase_url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
        supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
        impersonate_user: required("USER_TO_IMPERSONATE")?,
        google_credentials_path: required("GOOGLE_APPLICATION_CREDENTIALS")?,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SUPABASE_URL", "https://demo.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-role-key"),
            ("USER_TO_IMPERSONATE", "notifications@example.com"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/keys/sa.json"),
        ])
    }

    fn load_from(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        from_lookup(|name| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn loads_with_default_port() {
        let cfg = load_from(&full_env()).unwrap();
        assert_eq!(cfg.supabase_url, "https://demo.supabase.co");
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn trailing_slash_is_stripped_from_url() {
        let mut env = full_env();
        env.insert("SUPABASE_URL", "https://demo.supabase.co/");
        let cfg = load_from(&env).unwrap();
        assert_eq!(cfg.supabase_url, "https://demo.supabase.co");
    }

    #[test]
    fn explicit_port_overrides_default() {
        let mut env = full_env();
        env.insert("PORT", "9090");
        let cfg = load_from(&env).unwrap();
        assert_eq!(cfg.port, 9090);
    }

    #[test]
    fn missing_supabase_url_is_fatal() {
        let mut env = full_env();
        env.remove("SUPABASE_URL");
        let err = load_from(&env).unwrap_err();
        match err {
            ConfigError::Missing(name) => assert_eq!(name, "SUPABASE_URL"),
            other => panic!("wrong error: {other}"),
        }
    }

    #[test]
    fn blank_service_role_key_is_fatal() {
        let mut env = full_env();
        env.insert("SUPABASE_SERVICE_ROLE_KEY", "   ");
        let err = load_from(&env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")
        ));
    }

    #[test]
    fn missing_impersonation_target_is_fatal() {
        let mut env = full_env();
        env.remove("USER_TO_IMPERSONATE");
        assert!(matches!(
            load_from(&env).unwrap_err(),
            ConfigError::Missing("USER_TO_IMPERSONATE")
        ));
    }

    #[test]
    fn unparseable_port_is_rejected() {
        let mut env = full_env();
        env.insert("PORT", "not-a-port");
        let err = load_from(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
    }
}
