//! Configuration management

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub lessons: LessonsConfig,
    pub visits: VisitsConfig,
    pub tts: TtsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under /static
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: "static".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite file holding the visit log
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "visits.db".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LessonsConfig {
    pub data_dir: String,
}

impl Default for LessonsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/vocab".to_string(),
        }
    }
}

/// Which clock decides the calendar day a hit is filed under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayClock {
    /// Server local time
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VisitsConfig {
    pub clock: DayClock,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub endpoint: String,
    pub api_key: String,
    pub language_code: String,
    pub voice: String,
    /// Max number of synthesized snippets kept in memory
    pub cache_capacity: usize,
    /// Longest snippet (in chars) accepted by /tts
    pub max_chars: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://texttospeech.googleapis.com/v1/text:synthesize".to_string(),
            api_key: String::new(),
            language_code: "el-GR".to_string(),
            voice: "el-GR-Wavenet-A".to_string(),
            cache_capacity: 512,
            max_chars: 200,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";

        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GLOSSA")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        if self.lessons.data_dir.is_empty() {
            anyhow::bail!("lessons.data_dir cannot be empty");
        }

        if self.tts.cache_capacity == 0 {
            anyhow::bail!("tts.cache_capacity must be at least 1");
        }
        if self.tts.max_chars == 0 {
            anyhow::bail!("tts.max_chars must be at least 1");
        }

        Ok(())
    }
}
