//! Конфигурация рантайма.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RtResult, RuntimeError};

/// Конфигурация рантайма композиции.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Автоматически вызывать resolve после `include`/`extend`/определений
    pub auto_resolve: bool,
    /// Минимальный запас стека перед рекурсивным обходом (байт)
    pub stack_red_zone: usize,
    /// Размер нового сегмента стека при нехватке (байт)
    pub stack_grow_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            auto_resolve: true,
            stack_red_zone: 256 * 1024,
            stack_grow_size: 8 * 1024 * 1024,
        }
    }
}

impl RuntimeConfig {
    /// Разобрать конфигурацию из JSON. Отсутствующие поля берутся по умолчанию.
    pub fn from_json_str(source: &str) -> RtResult<Self> {
        serde_json::from_str(source)
            .map_err(|e| RuntimeError::ConfigError(format!("invalid config: {}", e)))
    }

    /// Загрузить конфигурацию из JSON-файла.
    pub fn from_file(path: &Path) -> RtResult<Self> {
        let source = fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&source)
    }
}

/// Опции отдельного определения модуля или класса.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefineOptions {
    /// Переопределяет `RuntimeConfig::auto_resolve` для этого вызова
    pub resolve: Option<bool>,
}

impl DefineOptions {
    /// Отложить resolve (пакетная настройка).
    pub fn deferred() -> Self {
        Self {
            resolve: Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.auto_resolve);
        assert_eq!(config.stack_red_zone, 256 * 1024);
    }

    #[test]
    fn test_partial_json() {
        let config = RuntimeConfig::from_json_str(r#"{"auto_resolve": false}"#).unwrap();
        assert!(!config.auto_resolve);
        assert_eq!(config.stack_grow_size, 8 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_json() {
        let result = RuntimeConfig::from_json_str("{auto_resolve");
        assert!(matches!(result, Err(RuntimeError::ConfigError(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runtime.json");
        File::create(&path)
            .unwrap()
            .write_all(br#"{"stack_red_zone": 65536}"#)
            .unwrap();

        let config = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(config.stack_red_zone, 65536);
        assert!(config.auto_resolve);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = RuntimeConfig::from_file(&dir.path().join("nope.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_deferred_options() {
        assert_eq!(DefineOptions::deferred().resolve, Some(false));
        assert_eq!(DefineOptions::default().resolve, None);
    }
}
