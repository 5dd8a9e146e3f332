//! Process configuration, read once from the environment at startup.
//!
//! Mirrors the teacher's `CrawlConfig` in spirit (a plain struct with a
//! `Default` and getters) without its typestate builder, which exists there
//! to guide construction of ~40 fields — overkill for the five this crate
//! needs. Secret loading and process bootstrap stay out of scope; `Config`
//! only reads what the core loop consults.

use std::env;

/// Environment-derived configuration. `cses_username`/`cses_password` are
/// both-or-neither: if only one is set, the crawler falls back to
/// anonymous CSES mode and logs a warning (finalize still degrades
/// gracefully in that mode).
#[derive(Debug, Clone)]
pub struct Config {
    pub cosmos_endpoint: String,
    pub cosmos_key: String,
    pub env_name: String,
    pub cses_username: Option<String>,
    pub cses_password: Option<String>,
}

impl Config {
    /// # Errors
    /// Returns an error naming the missing variable if a required one
    /// (`COSMOS_ENDPOINT`, `COSMOS_KEY`) is absent.
    pub fn from_env() -> Result<Self, String> {
        let cosmos_endpoint =
            env::var("COSMOS_ENDPOINT").map_err(|_| "COSMOS_ENDPOINT is not set".to_string())?;
        let cosmos_key = env::var("COSMOS_KEY").map_err(|_| "COSMOS_KEY is not set".to_string())?;
        let env_name = env::var("ENV_NAME").unwrap_or_else(|_| "dev".to_string());

        let cses_username = env::var("CSES_USERNAME").ok();
        let cses_password = env::var("CSES_PASSWORD").ok();
        if cses_username.is_some() != cses_password.is_some() {
            log::warn!(
                "only one of CSES_USERNAME/CSES_PASSWORD is set; falling back to anonymous CSES mode"
            );
        }

        Ok(Self {
            cosmos_endpoint,
            cosmos_key,
            env_name,
            cses_username,
            cses_password,
        })
    }

    /// CSES credentials, present only when both environment variables were
    /// set (a single missing half degrades to anonymous mode rather than a
    /// startup error, since login is optional per the platform contract).
    #[must_use]
    pub fn cses_credentials(&self) -> Option<crate::platforms::cses::CsesCredentials> {
        match (&self.cses_username, &self.cses_password) {
            (Some(username), Some(password)) => Some(crate::platforms::cses::CsesCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // env::set_var mutates global process state; serialize tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_var_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK, single-threaded test execution for this test.
        unsafe {
            env::remove_var("COSMOS_ENDPOINT");
        }
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn mismatched_cses_credentials_yield_no_credentials() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: serialized by ENV_LOCK, single-threaded test execution for this test.
        unsafe {
            env::set_var("COSMOS_ENDPOINT", "https://example.test");
            env::set_var("COSMOS_KEY", "key");
            env::set_var("CSES_USERNAME", "alice");
            env::remove_var("CSES_PASSWORD");
        }
        let config = Config::from_env().unwrap();
        assert!(config.cses_credentials().is_none());
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            env::remove_var("COSMOS_ENDPOINT");
            env::remove_var("COSMOS_KEY");
            env::remove_var("CSES_USERNAME");
        }
    }
}
