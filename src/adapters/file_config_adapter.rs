//! INI file configuration adapter.

use crate::domain::error::StockcastError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StockcastError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn from_string(content: &str) -> Result<Self, StockcastError> {
        Self::parse(content, "<string>")
    }

    fn parse(content: &str, source: &str) -> Result<Self, StockcastError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| StockcastError::ConfigParse {
                file: source.to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Drop a trailing `; comment` or `# comment`.
    fn strip_inline_comment(value: &str) -> &str {
        let cut = value
            .char_indices()
            .find(|&(i, c)| {
                (c == ';' || c == '#')
                    && value[..i].chars().last().is_some_and(char::is_whitespace)
            })
            .map(|(i, _)| i)
            .unwrap_or(value.len());
        value[..cut].trim()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| Self::strip_inline_comment(&v).to_string())
            .filter(|v| !v.is_empty())
    }
}
