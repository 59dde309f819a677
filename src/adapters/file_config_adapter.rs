//! INI file configuration adapter.

use crate::domain::error::TierfolioError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

/// Section and key names are lowercased on load, so lookups are
/// case-insensitive.
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TierfolioError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TierfolioError::Io {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut config = Ini::new();
        config
            .read(content)
            .map_err(|reason| TierfolioError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TierfolioError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TierfolioError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn has_section(&self, section: &str) -> bool {
        self.config.sections().iter().any(|s| s.eq_ignore_ascii_case(section))
    }
}
