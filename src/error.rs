//! Определения ошибок рантайма композиции.

use thiserror::Error;

/// Основной тип `Result` для библиотеки.
pub type RtResult<T> = Result<T, RuntimeError>;

/// Перечисление всех возможных ошибок.
///
/// Слой композиции почти ничего не считает ошибкой: включение пустого
/// модуля, поиск несуществующего метода и `call_super` без предка
/// молча возвращают пустой результат.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Module with ID {0} not found in registry")]
    UnknownModule(u32),

    #[error("Object with ID {0} not found in heap")]
    UnknownObject(u32),

    #[error("Module is not a class: {0}")]
    NotAClass(String),

    #[error("Cyclic include detected: {0}")]
    CyclicInclude(String),

    #[error("No such method: {0}")]
    NoSuchMethod(String),

    #[error("Member is not callable: {0}")]
    NotCallable(String),

    /// Ошибка, брошенная телом пользовательского метода.
    #[error("{0}")]
    Raised(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl RuntimeError {
    /// Удобный конструктор для ошибок из тел методов.
    pub fn raised(msg: impl Into<String>) -> Self {
        Self::Raised(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RuntimeError::CyclicInclude("A -> B -> A".to_string()).to_string(),
            "Cyclic include detected: A -> B -> A"
        );
        assert_eq!(RuntimeError::raised("boom").to_string(), "boom");
        assert_eq!(
            RuntimeError::UnknownModule(7).to_string(),
            "Module with ID 7 not found in registry"
        );
    }
}
