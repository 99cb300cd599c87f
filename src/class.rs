//! Слой классов: определение, наследование и создание экземпляров.
//!
//! Класс — модуль с двумя объектами: прототипом (хранилище методов
//! экземпляров) и объектом класса (хранилище «статических» методов через
//! его eigen-модуль). Eigen-модуль класса включает eigen-модуль родителя,
//! поэтому расширения уровня класса наследуются с той же семантикой
//! переопределения, что и методы экземпляров.

use log::debug;

use crate::config::DefineOptions;
use crate::error::{RtResult, RuntimeError};
use crate::method::{Definition, Method, Slot};
use crate::modules::ModuleKind;
use crate::runtime::Runtime;
use crate::value::{ModuleId, ObjectId, Value};

/// Части класса, нужные для наследования и создания экземпляров.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassParts {
    pub prototype: ObjectId,
    pub constructor: ObjectId,
    pub parent: Option<ModuleId>,
}

impl Runtime {
    /// Разобрать модуль как класс.
    pub fn class_parts(&self, class: ModuleId) -> RtResult<ClassParts> {
        match self.registry.get(class)?.kind {
            ModuleKind::Class {
                prototype,
                constructor,
                parent,
            } => Ok(ClassParts {
                prototype,
                constructor,
                parent,
            }),
            _ => Err(RuntimeError::NotAClass(self.registry.label(class))),
        }
    }

    /// Хранилище методов экземпляров класса.
    pub fn prototype_of(&self, class: ModuleId) -> RtResult<ObjectId> {
        Ok(self.class_parts(class)?.prototype)
    }

    /// Объект самого класса (носитель статических методов).
    pub fn class_object(&self, class: ModuleId) -> RtResult<ObjectId> {
        Ok(self.class_parts(class)?.constructor)
    }

    /// Класс экземпляра.
    pub fn class_of(&self, object: ObjectId) -> RtResult<Option<ModuleId>> {
        Ok(self.heap.get(object)?.class)
    }

    /// Определить класс.
    ///
    /// Порядок включений: `Base`, модуль родителя, затем `include` из
    /// определения. Собственные члены определения переопределяют всё.
    pub fn new_class(
        &mut self,
        name: Option<&str>,
        parent: Option<ModuleId>,
        definition: Definition,
        options: DefineOptions,
    ) -> RtResult<ModuleId> {
        let parent_parts = match parent {
            Some(parent) => Some(self.class_parts(parent)?),
            None => None,
        };

        let prototype = self.heap.alloc(parent_parts.map(|p| p.prototype), None);
        let constructor = self.heap.alloc(parent_parts.map(|p| p.constructor), None);
        let class = self.registry.create(
            name,
            ModuleKind::Class {
                prototype,
                constructor,
                parent,
            },
        );
        let label = self.registry.label(class);
        self.heap.get_mut(prototype)?.label = Some(format!("{}.prototype", label));
        self.heap.get_mut(constructor)?.label = Some(label.clone());
        debug!(
            "defining class {} < {}",
            label,
            parent.map_or_else(|| "nil".to_string(), |p| self.registry.label(p))
        );

        let eigen = self.eigen_module_of(constructor)?;
        if let Some(parts) = parent_parts {
            let parent_eigen = self.eigen_module_of(parts.constructor)?;
            self.include_module(eigen, parent_eigen, false)?;
        }

        let base = self.base;
        self.include_module(class, base, false)?;
        if let Some(parent) = parent {
            self.include_module(class, parent, false)?;
        }
        self.apply_definition(class, definition)?;

        if options.resolve.unwrap_or(self.config.auto_resolve) {
            self.resolve(class)?;
            self.resolve(eigen)?;
        }
        Ok(class)
    }

    /// Создать экземпляр класса.
    ///
    /// Если определён `initialize`, он вызывается с аргументами; объект,
    /// который он вернул, заменяет созданный экземпляр.
    pub fn instantiate(&mut self, class: ModuleId, args: Vec<Value>) -> RtResult<ObjectId> {
        let prototype = self.prototype_of(class)?;
        let object = self.heap.alloc(Some(prototype), Some(class));

        if let Some(Slot::Method(initialize)) = self.heap.find_slot(object, "initialize")?.cloned() {
            if let Value::Object(replacement) = self.invoke(object, &initialize, args)? {
                return Ok(replacement);
            }
        }
        Ok(object)
    }

    /// Определить класс и сразу вернуть его единственный экземпляр.
    ///
    /// Внешний класс-фабрика в `initialize` создаёт экземпляр внутреннего.
    pub fn singleton(
        &mut self,
        name: &str,
        parent: Option<ModuleId>,
        definition: Definition,
        args: Vec<Value>,
    ) -> RtResult<ObjectId> {
        let now = DefineOptions {
            resolve: Some(true),
        };
        let inner = self.new_class(Some(name), parent, definition, now)?;
        let factory = Definition::new().method(
            "initialize",
            Method::new(move |rt, inv| Ok(Value::Object(rt.instantiate(inner, inv.args().to_vec())?))),
        );
        let outer = self.new_class(Some(&format!("{}Factory", name)), None, factory, now)?;
        self.instantiate(outer, args)
    }
}
