//! Рантайм композиции: реестр модулей, куча объектов и операции над ними.
//!
//! Каждый `Runtime` — изолированный граф. Все операции синхронны и
//! выполняются до конца до возврата управления.

use log::debug;

use crate::config::{DefineOptions, RuntimeConfig};
use crate::error::RtResult;
use crate::method::{Definition, Member, Method, MethodEntry, Slot};
use crate::modules::{Mixin, ModuleCompiler, ModuleInfo, ModuleKind, ModuleRegistry};
use crate::objects::ObjectHeap;
use crate::value::{ModuleId, ObjectId, Value};

/// Рантайм композиции.
#[derive(Debug)]
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) registry: ModuleRegistry,
    pub(crate) heap: ObjectHeap,
    /// Базовый модуль каждого класса (`is_a`, `extend`)
    pub(crate) base: ModuleId,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut registry = ModuleRegistry::new(config.stack_red_zone, config.stack_grow_size);
        let base = registry.create(Some("Base"), ModuleKind::Trait);
        let mut rt = Self {
            config,
            registry,
            heap: ObjectHeap::new(),
            base,
        };
        rt.install_base_members();
        rt
    }

    fn install_base_members(&mut self) {
        let members = match self.registry.get_mut(self.base) {
            Ok(module) => &mut module.members,
            Err(_) => return,
        };
        members.insert(
            "is_a".to_string(),
            Member::Method(Method::new(|rt, inv| match inv.arg(0).as_module() {
                Some(module) => Ok(Value::Bool(rt.is_a(inv.receiver(), module)?)),
                None => Ok(Value::Bool(false)),
            })),
        );
        members.insert(
            "extend".to_string(),
            Member::Method(Method::new(|rt, inv| {
                rt.extend(inv.receiver(), inv.arg(0).as_module())?;
                Ok(Value::Nil)
            })),
        );
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Модуль `Base`, включаемый в каждый класс.
    pub fn base_module(&self) -> ModuleId {
        self.base
    }

    pub fn module_label(&self, id: ModuleId) -> String {
        self.registry.label(id)
    }

    pub fn module_kind(&self, id: ModuleId) -> RtResult<ModuleKind> {
        Ok(self.registry.get(id)?.kind)
    }

    fn should_resolve(&self, options: DefineOptions) -> bool {
        options.resolve.unwrap_or(self.config.auto_resolve)
    }

    /// Определить модуль (трейт).
    pub fn new_module(
        &mut self,
        name: Option<&str>,
        definition: Definition,
        options: DefineOptions,
    ) -> RtResult<ModuleId> {
        let id = self.registry.create(name, ModuleKind::Trait);
        self.apply_definition(id, definition)?;
        if self.should_resolve(options) {
            self.resolve(id)?;
        }
        Ok(id)
    }

    /// Влить определение в модуль: члены, `include` и `extend`.
    pub(crate) fn apply_definition(&mut self, id: ModuleId, definition: Definition) -> RtResult<()> {
        let Definition {
            members,
            include,
            extend,
        } = definition;

        self.registry.get_mut(id)?.members.extend(members);
        for module in include {
            self.include_module(id, module, false)?;
        }
        for module in extend {
            self.add_extension(id, module, false)?;
        }
        self.registry.invalidate(id)
    }

    /// Подмешать модуль или таблицу в `host`.
    ///
    /// `Mixin::Nothing` ничего не делает.
    pub fn include(&mut self, host: ModuleId, mixin: impl Into<Mixin>) -> RtResult<()> {
        match self.materialize(mixin.into())? {
            Some(module) => {
                let resolve = self.config.auto_resolve;
                self.include_module(host, module, resolve)
            }
            None => Ok(()),
        }
    }

    fn materialize(&mut self, mixin: Mixin) -> RtResult<Option<ModuleId>> {
        match mixin {
            Mixin::Nothing => Ok(None),
            Mixin::Module(id) => {
                self.registry.get(id)?;
                Ok(Some(id))
            }
            Mixin::Table(definition) => {
                let id = self.new_module(None, definition, DefineOptions::deferred())?;
                Ok(Some(id))
            }
        }
    }

    pub(crate) fn include_module(
        &mut self,
        host: ModuleId,
        module: ModuleId,
        resolve: bool,
    ) -> RtResult<()> {
        self.registry.add_include(host, module)?;

        let extends = self.registry.get(module)?.extends.clone();
        for extension in extends {
            self.add_extension(host, extension, resolve)?;
        }

        if resolve {
            self.resolve(host)?;
        }
        Ok(())
    }

    /// Декларативное `extend`: у класса расширяется объект класса, у трейта
    /// расширение запоминается до включения в класс.
    fn add_extension(&mut self, host: ModuleId, extension: ModuleId, resolve: bool) -> RtResult<()> {
        match self.registry.get(host)?.kind {
            ModuleKind::Class { constructor, .. } => {
                let eigen = self.eigen_module_of(constructor)?;
                self.include_module(eigen, extension, resolve)
            }
            ModuleKind::Trait => {
                let extends = &mut self.registry.get_mut(host)?.extends;
                if !extends.contains(&extension) {
                    extends.push(extension);
                }
                Ok(())
            }
            ModuleKind::Eigen { .. } => Ok(()),
        }
    }

    /// Расширить конкретный объект модулем (singleton-расширение).
    ///
    /// Объект класса — тоже объект, поэтому так же добавляются
    /// «статические» методы класса.
    pub fn extend(&mut self, object: ObjectId, mixin: impl Into<Mixin>) -> RtResult<()> {
        match self.materialize(mixin.into())? {
            Some(module) => {
                let eigen = self.eigen_module_of(object)?;
                debug!("extend {} with {}", self.heap.label(object), self.registry.label(module));
                let resolve = self.config.auto_resolve;
                self.include_module(eigen, module, resolve)
            }
            None => Ok(()),
        }
    }

    /// Eigen-модуль объекта; создаётся один раз при первом обращении.
    pub fn eigen_module_of(&mut self, object: ObjectId) -> RtResult<ModuleId> {
        if let Some(eigen) = self.heap.get(object)?.eigen {
            return Ok(eigen);
        }
        let eigen = self.registry.create(None, ModuleKind::Eigen { object });
        self.heap.get_mut(object)?.eigen = Some(eigen);
        // Изменения цепочки класса пересобирают и singleton-методы экземпляра
        if let Some(class) = self.heap.get(object)?.class {
            self.registry.add_dependent(class, eigen)?;
        }
        Ok(eigen)
    }

    /// Входит ли `module` в динамическую цепочку объекта или его класса.
    pub fn is_a(&mut self, object: ObjectId, module: ModuleId) -> RtResult<bool> {
        self.registry.get(module)?;
        let eigen = self.eigen_module_of(object)?;
        if self.registry.ancestors_of(eigen)?.contains(&module) {
            return Ok(true);
        }
        if let Some(class) = self.heap.get(object)?.class {
            if self.registry.ancestors_of(class)?.contains(&module) {
                return Ok(true);
            }
        }
        match self.registry.get(module)?.kind {
            ModuleKind::Class { prototype, .. } => self.heap.derives_from(object, prototype),
            _ => Ok(false),
        }
    }

    /// Включает ли `module` (транзитивно) модуль `other`.
    pub fn includes(&mut self, module: ModuleId, other: ModuleId) -> RtResult<bool> {
        self.registry.get(other)?;
        Ok(module != other && self.registry.ancestors_of(module)?.contains(&other))
    }

    pub fn ancestors_of(&mut self, module: ModuleId) -> RtResult<Vec<ModuleId>> {
        self.registry.ancestors_of(module)
    }

    pub fn lookup(&mut self, module: ModuleId, name: &str) -> RtResult<Vec<MethodEntry>> {
        self.registry.lookup(module, name)
    }

    /// Активная реализация `name` без обёртки диспетчера.
    pub fn instance_method(&mut self, module: ModuleId, name: &str) -> RtResult<Option<MethodEntry>> {
        self.registry.instance_method(module, name)
    }

    /// Сбросить кэши и переустановить методы во все достижимые хранилища.
    pub fn resolve(&mut self, module: ModuleId) -> RtResult<()> {
        let (red_zone, grow_size) = (self.config.stack_red_zone, self.config.stack_grow_size);
        ModuleCompiler::new(&mut self.registry, &mut self.heap, red_zone, grow_size)
            .resolve(module)?;
        Ok(())
    }

    /// Добавить или заменить член модуля.
    pub fn define_method(
        &mut self,
        module: ModuleId,
        name: &str,
        member: impl Into<Member>,
    ) -> RtResult<()> {
        self.registry
            .get_mut(module)?
            .members
            .insert(name.to_string(), member.into());
        self.registry.invalidate(module)?;
        if self.config.auto_resolve {
            self.resolve(module)?;
        }
        Ok(())
    }

    /// Прочитать простое значение по цепочке хранилищ.
    pub fn get(&self, object: ObjectId, name: &str) -> RtResult<Option<Value>> {
        Ok(match self.heap.find_slot(object, name)? {
            Some(Slot::Value(value)) => Some(value.clone()),
            _ => None,
        })
    }

    /// Записать собственное значение объекта.
    pub fn set(&mut self, object: ObjectId, name: &str, value: impl Into<Value>) -> RtResult<()> {
        self.heap.install(object, name, Slot::Value(value.into()))?;
        Ok(())
    }

    /// Собственный установленный слот хранилища.
    pub fn slot(&self, object: ObjectId, name: &str) -> RtResult<Option<&Slot>> {
        self.heap.own_slot(object, name)
    }

    /// Снимок модуля для диагностики.
    pub fn describe(&mut self, module: ModuleId) -> RtResult<ModuleInfo> {
        let ancestors = self.registry.ancestors_of(module)?;
        let m = self.registry.get(module)?;
        let mut members: Vec<String> = m.members.keys().cloned().collect();
        members.sort();
        Ok(ModuleInfo {
            id: m.id,
            name: m.name.clone(),
            kind: match m.kind {
                ModuleKind::Trait => "trait",
                ModuleKind::Class { .. } => "class",
                ModuleKind::Eigen { .. } => "eigen",
            },
            includes: m.includes.clone(),
            dependents: m.dependents.clone(),
            ancestors,
            members,
        })
    }
}
