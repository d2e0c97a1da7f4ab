// config.rs
use crate::errors::AppError;
use crate::scraper::CrawlSettings;

pub const DEFAULT_DATABASE_PATH: &str = "autos.sqlite3";
pub const DEFAULT_BROWSERLESS_URL: &str = "http://localhost:3000";

/// Run configuration, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub headless: bool,
    /// `None` crawls until the site runs out of pages.
    pub max_pages: Option<u32>,
    /// Normalization credential. `None` disables enrichment.
    pub github_token: Option<String>,
    pub database_path: String,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub min_price: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_keys();
        Ok(config)
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_pages = match get("MAX_PAGES") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) => None,
                Ok(n) => Some(n),
                Err(e) => return Err(AppError::Config(format!("MAX_PAGES={raw}: {e}"))),
            },
            None => None,
        };

        let min_price = match get("MIN_PRICE") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|p| p.is_finite() && *p >= 0.0)
                .ok_or_else(|| AppError::Config(format!("MIN_PRICE={raw}: not a valid price")))?,
            None => crate::scraper::DEFAULT_MIN_PRICE,
        };

        Ok(Self {
            headless: get("HEADLESS").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            max_pages,
            github_token: get("GITHUB_TOKEN"),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            browserless_url: get("BROWSERLESS_URL")
                .unwrap_or_else(|| DEFAULT_BROWSERLESS_URL.to_string()),
            browserless_token: get("BROWSERLESS_TOKEN"),
            min_price,
        })
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            min_price: self.min_price,
            max_pages: self.max_pages,
            ..CrawlSettings::default()
        }
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let head: String = v.chars().take(4).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  HEADLESS: {}", self.headless);
        tracing::info!("  MAX_PAGES: {:?}", self.max_pages);
        tracing::info!("  MIN_PRICE: {}", self.min_price);
        tracing::info!("  DATABASE_PATH: {}", self.database_path);
        tracing::info!("  BROWSERLESS_URL: {}", self.browserless_url);
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!("  GITHUB_TOKEN: {}", preview_opt(&self.github_token));
    }
}
