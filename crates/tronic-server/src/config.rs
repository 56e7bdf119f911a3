use anyhow::Result;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    /// AI upstream; `None` leaves the responder unconfigured and the AI
    /// endpoints returning generation errors.
    pub ai_api_key: Option<String>,
    pub ai_base_url: String,
    pub ai_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port: u16 = std::env::var("TRONIC_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;

        Ok(Self {
            host: std::env::var("TRONIC_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            db_path: std::env::var("TRONIC_DB_PATH").unwrap_or_else(|_| "tronic.db".into()),
            jwt_secret: std::env::var("TRONIC_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".into()),
            ai_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            ai_base_url: std::env::var("TRONIC_AI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            ai_model: std::env::var("TRONIC_AI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".into()),
        })
    }
}
