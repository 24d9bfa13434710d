use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use std::thread;

/// Parsed from `APP_`-prefixed environment variables via envy.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_threads")]
    pub api_threads: usize,
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
    #[serde(default = "default_journal_location")]
    pub journal_location: PathBuf,
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
    #[serde(default = "default_superadmin_username")]
    pub superadmin_username: String,
    #[serde(default = "default_superadmin_password")]
    pub superadmin_password: String,
}

fn default_host() -> String {
    "[::]:3000".into()
}

fn default_api_threads() -> usize {
    let cores: usize = thread::available_parallelism().unwrap().into();
    usize::max(1, cores - 1)
}

fn default_starting_balance() -> Decimal {
    Decimal::from(10_000)
}

fn default_journal_location() -> PathBuf {
    "./log".into()
}

fn default_session_secret() -> String {
    // Dev fallback; deployments set APP_SESSION_SECRET.
    "openbookpro-dev-secret".into()
}

fn default_superadmin_username() -> String {
    "superadmin".into()
}

fn default_superadmin_password() -> String {
    "superadmin".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_fill_every_default() {
        let config: Config = envy::prefixed("OPENBOOKPRO_TEST_UNSET_")
            .from_env()
            .unwrap();
        assert_eq!(config.host, "[::]:3000");
        assert!(config.api_threads >= 1);
        assert_eq!(config.starting_balance, Decimal::from(10_000));
        assert_eq!(config.journal_location, PathBuf::from("./log"));
    }
}
