use anyhow::Context;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Upper bound of the SQLite pool. Concurrent handlers beyond this wait
    /// for a connection; each write still holds one only for one statement.
    pub db_max_connections: u32,

    /// JSON log lines instead of the human-readable format.
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite://slotswap.db?mode=rwc".to_string());

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS must be an integer, got {raw:?}"))?,
            None => 8,
        };

        let json_logs = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));

        Ok(Self {
            database_url,
            db_max_connections,
            json_logs,
        })
    }
}
