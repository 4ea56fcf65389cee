use crate::error::{CoderError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use survey_coder_common::{Highlight, SheetLayout, SpellingMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: SheetLayout,
    pub highlight: Highlight,
    pub spelling: SpellingMode,
    /// 単語頻度辞書（未設定ならスペル補正なし）
    pub dictionary: Option<PathBuf>,
    /// 感情辞書（未設定なら内蔵辞書）
    pub lexicon: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: SheetLayout::default(),
            highlight: Highlight::default(),
            spelling: SpellingMode::default(),
            dictionary: None,
            lexicon: None,
            cache_dir: None,
            retry_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoderError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("survey-coder").join("config.json"))
    }

    /// 用語集キャッシュの置き場所
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|d| d.join("survey-coder"))
            .ok_or_else(|| CoderError::Config("キャッシュディレクトリが見つかりません".into()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn set_dictionary(&mut self, path: PathBuf) -> Result<()> {
        if !path.exists() {
            return Err(CoderError::NotFound(path.display().to_string()));
        }
        self.dictionary = Some(path);
        self.save()
    }

    pub fn set_lexicon(&mut self, path: PathBuf) -> Result<()> {
        if !path.exists() {
            return Err(CoderError::NotFound(path.display().to_string()));
        }
        self.lexicon = Some(path);
        self.save()
    }

    pub fn set_spelling(&mut self, mode: SpellingMode) -> Result<()> {
        self.spelling = mode;
        self.save()
    }

    pub fn set_highlight(&mut self, hex: &str) -> Result<()> {
        self.highlight = Highlight::from_hex(hex)
            .ok_or_else(|| CoderError::Config(format!("色の指定が不正です: {} (例: #FFFFB3)", hex)))?;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.layout, SheetLayout::default());
        assert_eq!(config.spelling, SpellingMode::Fix);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.dictionary.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r##"{"spelling": "legacy", "highlight": "#FF0000"}"##).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.spelling, SpellingMode::Legacy);
        assert_eq!(config.highlight.to_hex(), "#FF0000");
        assert_eq!(config.retry_delay_ms, 500);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            cache_dir: Some(dir.path().join("cache")),
            retry_attempts: 5,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.retry_attempts, 5);
        assert_eq!(loaded.cache_dir().unwrap(), dir.path().join("cache"));
        assert_eq!(loaded.retry_policy().delay, Duration::from_millis(500));
    }

    #[test]
    fn test_broken_json_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(CoderError::JsonParse(_))));
    }
}
