use crate::error::{ConfigError, Result as AppResult};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, Value, ValueKind};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

const ENV_PREFIX: &str = "KANTOQUIZ";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub duration_secs: u64,
    pub tick_interval_secs: u64,
    pub grid_sections: usize,
    pub reject_delete_delay_ms: u64,
    pub command_prefix: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            duration_secs: 15 * 60,
            tick_interval_secs: 5,
            grid_sections: 4,
            reject_delete_delay_ms: 1000,
            command_prefix: "!".to_string(),
        }
    }
}

impl GameConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn reject_delete_delay(&self) -> Duration {
        Duration::from_millis(self.reject_delete_delay_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "game.duration_secs must be greater than zero".to_string(),
            ));
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "game.tick_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.grid_sections == 0 {
            return Err(ConfigError::InvalidValue(
                "game.grid_sections must be at least 1".to_string(),
            ));
        }
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "game.command_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub bot_name: String,
    pub max_message_len: usize,
    pub history_limit: usize,
    #[serde(deserialize_with = "deserialize_string_or_list_lowercase")]
    pub banned_words: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bot_name: "QuizBot".to_string(),
            max_message_len: 2000,
            history_limit: 500,
            banned_words: vec!["shit".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub game: GameConfig,
    pub chat: ChatConfig,
}

fn string_list(items: &[String]) -> Value {
    let values = items
        .iter()
        .map(|item| Value::new(None, ValueKind::String(item.clone())))
        .collect();
    Value::new(None, ValueKind::Array(values))
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let game = GameConfig::default();
    let chat = ChatConfig::default();
    builder
        .set_default("server.port", 3000)?
        .set_default("server.cors_origins", string_list(&[]))?
        .set_default("game.duration_secs", game.duration_secs)?
        .set_default("game.tick_interval_secs", game.tick_interval_secs)?
        .set_default("game.grid_sections", game.grid_sections as u64)?
        .set_default("game.reject_delete_delay_ms", game.reject_delete_delay_ms)?
        .set_default("game.command_prefix", game.command_prefix)?
        .set_default("chat.bot_name", chat.bot_name)?
        .set_default("chat.max_message_len", chat.max_message_len as u64)?
        .set_default("chat.history_limit", chat.history_limit as u64)?
        .set_default("chat.banned_words", string_list(&chat.banned_words))
}

fn finish(builder: ConfigBuilder<DefaultState>) -> AppResult<AppSettings> {
    let settings: AppSettings = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    settings.game.validate()?;
    Ok(settings)
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = with_defaults(Config::builder())
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .with_list_parse_key("chat.banned_words")
                .try_parsing(true),
        );
    finish(builder)
}

fn deserialize_string_or_list_lowercase<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    let mut words = Vec::new();

    match value {
        Value::String(s) => {
            for item in s.split(',') {
                let word = item.trim().to_lowercase();
                if !word.is_empty() {
                    words.push(word);
                }
            }
        }
        Value::Array(arr) => {
            for item in arr {
                if let Value::String(s) = item {
                    let word = s.trim().to_lowercase();
                    if !word.is_empty() {
                        words.push(word);
                    }
                } else {
                    return Err(D::Error::custom("Array must contain only strings"));
                }
            }
        }
        _ => return Err(D::Error::custom("Expected string or array of strings")),
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use config::FileFormat;

    fn settings_from_toml(toml: &str) -> AppResult<AppSettings> {
        let builder = with_defaults(Config::builder())
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml));
        finish(builder)
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let settings = settings_from_toml("").unwrap();
        assert_eq!(settings.server.port, 3000);
        assert!(settings.server.cors_origins.is_empty());
        assert_eq!(settings.game.duration(), Duration::from_secs(900));
        assert_eq!(settings.game.tick_interval(), Duration::from_secs(5));
        assert_eq!(settings.game.grid_sections, 4);
        assert_eq!(settings.game.reject_delete_delay(), Duration::from_secs(1));
        assert_eq!(settings.game.command_prefix, "!");
        assert_eq!(settings.chat.bot_name, "QuizBot");
        assert_eq!(settings.chat.max_message_len, 2000);
        assert_eq!(settings.chat.banned_words, vec!["shit".to_string()]);
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = settings_from_toml(
            r#"
            [server]
            port = 8080
            cors_origins = ["http://localhost:5173"]

            [game]
            duration_secs = 60
            grid_sections = 6

            [chat]
            banned_words = "Darn, HECK"
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(settings.game.duration_secs, 60);
        assert_eq!(settings.game.grid_sections, 6);
        assert_eq!(settings.game.tick_interval_secs, 5);
        assert_eq!(settings.chat.banned_words, vec!["darn", "heck"]);
    }

    #[test]
    fn zero_sections_are_rejected() {
        let err = settings_from_toml("[game]\ngrid_sections = 0").unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::InvalidValue(ref msg)) if msg.contains("grid_sections")
        ));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        assert!(settings_from_toml("[game]\ntick_interval_secs = 0").is_err());
    }
}
