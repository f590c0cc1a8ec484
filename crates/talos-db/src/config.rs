use talos_core::AppError;

/// Default checkpoint database: a SQLite file in the working directory,
/// created on first use.
pub const DEFAULT_CHECKPOINT_URL: &str = "sqlite://checkpoint.db?mode=rwc";

/// Configuration for the checkpoint database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHECKPOINT_URL.to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `CHECKPOINT_DATABASE_URL` (optional, defaults to a local file)
    /// - `CHECKPOINT_MAX_CONNECTIONS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("CHECKPOINT_DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_CHECKPOINT_URL.to_string());

        let max_connections = match std::env::var("CHECKPOINT_MAX_CONNECTIONS") {
            Err(_) => 5,
            Ok(raw) => {
                let parsed: u32 = raw.parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid CHECKPOINT_MAX_CONNECTIONS '{raw}': must be a positive integer"
                    ))
                })?;
                if parsed == 0 {
                    return Err(AppError::ConfigError(
                        "CHECKPOINT_MAX_CONNECTIONS must be at least 1".into(),
                    ));
                }
                parsed
            }
        };

        Ok(Self {
            url,
            max_connections,
        })
    }
}
