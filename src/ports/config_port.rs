//! Configuration access port trait.

use crate::domain::error::StockcastError;

/// Sectioned key/value configuration.
///
/// Only `get_string` is required. The typed getters return `default` for a
/// missing key and `ConfigInvalid` for a value that does not parse.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_usize(&self, section: &str, key: &str, default: usize) -> Result<usize, StockcastError> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| invalid(section, key, format!("'{raw}' is not a non-negative integer"))),
        }
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, StockcastError> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(invalid(section, key, format!("'{raw}' is not a finite number"))),
            },
        }
    }
}

fn invalid(section: &str, key: &str, reason: String) -> StockcastError {
    StockcastError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}
