//! Методы, члены таблиц модулей и установленные слоты.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::dispatch::Invocation;
use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::{ModuleId, Value};

/// Сигнатура нативного тела метода.
pub type NativeFn = dyn Fn(&mut Runtime, &mut Invocation) -> RtResult<Value>;

/// Вызываемое тело метода.
///
/// Флаг `calls_super` объявляется явно при создании: только такие методы
/// получают цепочку предков при вызове.
#[derive(Clone)]
pub struct Method {
    func: Rc<NativeFn>,
    calls_super: bool,
}

impl Method {
    /// Метод, не обращающийся к реализациям предков.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Runtime, &mut Invocation) -> RtResult<Value> + 'static,
    {
        Self {
            func: Rc::new(func),
            calls_super: false,
        }
    }

    /// Метод, который может вызывать `call_super`.
    pub fn with_super<F>(func: F) -> Self
    where
        F: Fn(&mut Runtime, &mut Invocation) -> RtResult<Value> + 'static,
    {
        Self {
            func: Rc::new(func),
            calls_super: true,
        }
    }

    pub fn calls_super(&self) -> bool {
        self.calls_super
    }

    /// Идентичность по телу: две копии одного `Method` равны.
    pub fn ptr_eq(&self, other: &Method) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn call(&self, rt: &mut Runtime, inv: &mut Invocation) -> RtResult<Value> {
        (self.func)(rt, inv)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<method {:p}{}>",
            Rc::as_ptr(&self.func) as *const (),
            if self.calls_super { " super" } else { "" }
        )
    }
}

/// Член таблицы модуля: метод или простое значение.
#[derive(Debug, Clone)]
pub enum Member {
    Method(Method),
    Value(Value),
}

impl Member {
    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Member::Method(m) => Some(m),
            Member::Value(_) => None,
        }
    }

    /// Идентичность: методы сравниваются по телу, значения по содержимому.
    pub fn same_as(&self, other: &Member) -> bool {
        match (self, other) {
            (Member::Method(a), Member::Method(b)) => a.ptr_eq(b),
            (Member::Value(a), Member::Value(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Method> for Member {
    fn from(m: Method) -> Self {
        Member::Method(m)
    }
}

impl From<Value> for Member {
    fn from(v: Value) -> Self {
        Member::Value(v)
    }
}

/// Кандидат в списке поиска: член таблицы вместе с модулем-владельцем.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub owner: ModuleId,
    pub name: String,
    pub member: Member,
}

/// Скомпилированный метод, установленный в хранилище.
///
/// `env` — модуль, для которого материализовано хранилище; по нему при
/// вызове вычисляется актуальная цепочка `call_super`.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub env: ModuleId,
    pub owner: ModuleId,
    pub name: String,
    pub method: Method,
}

impl PartialEq for Compiled {
    fn eq(&self, other: &Self) -> bool {
        if !self.method.ptr_eq(&other.method)
            || self.name != other.name
            || self.owner != other.owner
        {
            return false;
        }
        // Без super окружение не влияет на поведение
        !self.method.calls_super() || self.env == other.env
    }
}

/// Слот хранилища.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Value(Value),
    Method(Compiled),
}

impl Slot {
    /// Скомпилировать кандидат для окружения `env`.
    pub fn compile(entry: &MethodEntry, env: ModuleId) -> Self {
        match &entry.member {
            Member::Value(v) => Slot::Value(v.clone()),
            Member::Method(m) => Slot::Method(Compiled {
                env,
                owner: entry.owner,
                name: entry.name.clone(),
                method: m.clone(),
            }),
        }
    }

    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Slot::Method(c) => Some(&c.method),
            Slot::Value(_) => None,
        }
    }
}

/// Определение модуля или класса: таблица членов плюс декларативная композиция.
///
/// Ключи `include` и `extend` задают вложенную композицию: `include` —
/// модули, подмешиваемые в определяемый модуль; `extend` — модули,
/// расширяющие объект класса, в который этот модуль будет включён.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    pub members: HashMap<String, Member>,
    pub include: Vec<ModuleId>,
    pub extend: Vec<ModuleId>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить метод.
    pub fn method(mut self, name: &str, method: Method) -> Self {
        self.members.insert(name.to_string(), Member::Method(method));
        self
    }

    /// Добавить простое значение.
    pub fn value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.members
            .insert(name.to_string(), Member::Value(value.into()));
        self
    }

    pub fn include(mut self, module: ModuleId) -> Self {
        self.include.push(module);
        self
    }

    pub fn extend(mut self, module: ModuleId) -> Self {
        self.extend.push(module);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.include.is_empty() && self.extend.is_empty()
    }
}
