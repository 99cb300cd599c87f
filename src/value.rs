//! Рантайм-значения и идентификаторы.

use serde::{Deserialize, Serialize};

/// Идентификатор модуля (или класса, или eigen-модуля) в реестре.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

/// Идентификатор объекта в куче.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Представление значений, с которыми работают методы.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Отсутствие значения (`undefined`)
    Nil,
    /// Булево значение
    Bool(bool),
    /// Целое число
    Int(i64),
    /// Число с плавающей точкой
    Float(f64),
    /// Строка
    Str(String),
    /// Список
    List(Vec<Value>),
    /// Ссылка на объект в куче
    Object(ObjectId),
    /// Ссылка на модуль или класс
    Module(ModuleId),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<ModuleId> {
        match self {
            Value::Module(id) => Some(*id),
            _ => None,
        }
    }

    /// Форматировать значение для вывода (человекочитаемый формат).
    pub fn format_display(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => format!("\"{}\"", s),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(|v| v.format_display()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(id) => format!("<object #{}>", id.0),
            Value::Module(id) => format!("<module #{}>", id.0),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

impl From<ModuleId> for Value {
    fn from(id: ModuleId) -> Self {
        Value::Module(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_display() {
        let list = Value::List(vec![Value::Int(1), Value::from("a"), Value::Nil]);
        assert_eq!(list.format_display(), "[1, \"a\", nil]");
        assert_eq!(Value::Object(ObjectId(3)).format_display(), "<object #3>");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(5).as_int(), Some(5));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(ModuleId(2)).as_module(), Some(ModuleId(2)));
        assert!(Value::Nil.is_nil());
        assert_eq!(Value::Bool(true).as_object(), None);
    }
}
