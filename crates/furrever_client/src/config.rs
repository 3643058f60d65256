use crate::FurreverError;
use secrecy::SecretString;

pub const DEFAULT_BASE_URL: &str = "https://furrevercare-deploy-8.onrender.com/api";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_token: SecretString,
    pub user_id: String,
    pub base_url: String,
    /// Automatic retries for idempotent reads. Zero keeps a failed fetch visible.
    pub max_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, FurreverError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, FurreverError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let token = get("FURREVER_API_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| FurreverError::Config("FURREVER_API_TOKEN missing".into()))?;
        let user_id = get("FURREVER_USER_ID")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| FurreverError::Config("FURREVER_USER_ID missing".into()))?;
        let base_url = get("FURREVER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let max_retries = match get("FURREVER_MAX_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                FurreverError::Config(format!("FURREVER_MAX_RETRIES is not a number: {raw}"))
            })?,
            None => 0,
        };
        Ok(Self {
            api_token: SecretString::new(token.into()),
            user_id,
            base_url,
            max_retries,
        })
    }
}
