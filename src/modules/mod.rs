//! Граф композиции модулей.
//!
//! Модуль — именованная таблица членов с рёбрами включения. Класс и
//! eigen-модуль — тоже модули, но со связанным хранилищем, куда
//! материализуются выигрывающие методы.
//!
//! ## Порядок предков
//!
//! ```text
//! A includes B, B includes C
//! ancestors(A) = [C, B, A]   ; самый производный — последний
//! ```

mod registry;
mod resolver;

pub use registry::{Module, ModuleKind, ModuleRegistry};
pub use resolver::ModuleCompiler;

use serde::Serialize;

use crate::method::Definition;
use crate::value::ModuleId;

/// Аргумент `include`/`extend`: модуль, таблица или ничего.
#[derive(Debug, Clone)]
pub enum Mixin {
    /// Пустой аргумент: операция ничего не делает
    Nothing,
    Module(ModuleId),
    /// Таблица оборачивается в анонимный модуль
    Table(Definition),
}

impl From<ModuleId> for Mixin {
    fn from(id: ModuleId) -> Self {
        Mixin::Module(id)
    }
}

impl From<Option<ModuleId>> for Mixin {
    fn from(id: Option<ModuleId>) -> Self {
        id.map_or(Mixin::Nothing, Mixin::Module)
    }
}

impl From<Definition> for Mixin {
    fn from(def: Definition) -> Self {
        Mixin::Table(def)
    }
}

/// Снимок состояния модуля для диагностики.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub id: ModuleId,
    pub name: Option<String>,
    pub kind: &'static str,
    pub includes: Vec<ModuleId>,
    pub dependents: Vec<ModuleId>,
    pub ancestors: Vec<ModuleId>,
    pub members: Vec<String>,
}

impl ModuleInfo {
    /// Сериализовать снимок в JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
