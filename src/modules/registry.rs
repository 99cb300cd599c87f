//! Реестр модулей: граф композиции, порядок предков и кэш поиска методов.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::error::{RtResult, RuntimeError};
use crate::method::{Member, MethodEntry};
use crate::value::{ModuleId, ObjectId};

/// Вид модуля.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Чистый трейт: только таблица методов, никуда не устанавливается напрямую
    Trait,
    /// Класс: прототип экземпляров и объект самого класса
    Class {
        prototype: ObjectId,
        constructor: ObjectId,
        parent: Option<ModuleId>,
    },
    /// Приватный модуль объекта; методы ставятся прямо на объект
    Eigen { object: ObjectId },
}

/// Узел графа композиции.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// Имя модуля (анонимные модули без имени)
    pub name: Option<String>,
    pub kind: ModuleKind,
    /// Включённые модули в порядке включения
    pub includes: Vec<ModuleId>,
    /// Обратные рёбра: кто включает этот модуль
    pub dependents: Vec<ModuleId>,
    /// Сырая таблица членов
    pub members: HashMap<String, Member>,
    /// Модули, которыми расширяется объект класса при включении этого модуля
    pub extends: Vec<ModuleId>,
    /// Кэш порядка предков (`None` — грязный)
    ancestors: Option<Vec<ModuleId>>,
    /// Кэш поиска по имени
    lookup: HashMap<String, Vec<MethodEntry>>,
}

impl Module {
    fn new(id: ModuleId, name: Option<String>, kind: ModuleKind) -> Self {
        Self {
            id,
            name,
            kind,
            includes: Vec::new(),
            dependents: Vec::new(),
            members: HashMap::new(),
            extends: Vec::new(),
            ancestors: None,
            lookup: HashMap::new(),
        }
    }

    /// Хранилище, куда устанавливаются методы. У трейтов его нет.
    pub fn backing_store(&self) -> Option<ObjectId> {
        match self.kind {
            ModuleKind::Trait => None,
            ModuleKind::Class { prototype, .. } => Some(prototype),
            ModuleKind::Eigen { object } => Some(object),
        }
    }

    /// Имя для сообщений и логов.
    pub fn label(&self) -> String {
        match (&self.name, self.kind) {
            (Some(name), _) => name.clone(),
            (None, ModuleKind::Eigen { object }) => format!("#<eigen of #{}>", object.0),
            (None, _) => format!("#<module #{}>", self.id.0),
        }
    }

    /// Закэширован ли порядок предков.
    pub fn is_resolved(&self) -> bool {
        self.ancestors.is_some()
    }
}

/// Реестр модулей.
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: Vec<Module>,
    /// Параметры `stacker::maybe_grow` для рекурсивных обходов
    red_zone: usize,
    grow_size: usize,
}

impl ModuleRegistry {
    /// Создать реестр с заданными параметрами роста стека.
    pub fn new(red_zone: usize, grow_size: usize) -> Self {
        Self {
            modules: Vec::new(),
            red_zone,
            grow_size,
        }
    }

    /// Зарегистрировать новый пустой модуль.
    pub fn create(&mut self, name: Option<&str>, kind: ModuleKind) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        let module = Module::new(id, name.map(str::to_string), kind);
        debug!("registered {} ({:?})", module.label(), kind);
        self.modules.push(module);
        id
    }

    pub fn get(&self, id: ModuleId) -> RtResult<&Module> {
        self.modules
            .get(id.0 as usize)
            .ok_or(RuntimeError::UnknownModule(id.0))
    }

    pub fn get_mut(&mut self, id: ModuleId) -> RtResult<&mut Module> {
        self.modules
            .get_mut(id.0 as usize)
            .ok_or(RuntimeError::UnknownModule(id.0))
    }

    pub fn label(&self, id: ModuleId) -> String {
        self.get(id)
            .map(Module::label)
            .unwrap_or_else(|_| format!("#<unknown #{}>", id.0))
    }

    /// Добавить ребро `host -> module` и обратное ребро.
    ///
    /// Ребро, замыкающее цикл, отвергается. Повторное включение ничего не
    /// меняет. Кэши `host` и всех его зависимых сбрасываются.
    pub fn add_include(&mut self, host: ModuleId, module: ModuleId) -> RtResult<bool> {
        self.get(module)?;
        if self.get(host)?.includes.contains(&module) {
            return Ok(false);
        }
        if host == module || self.ancestors_of(module)?.contains(&host) {
            return Err(RuntimeError::CyclicInclude(format!(
                "{} -> {}",
                self.label(host),
                self.label(module)
            )));
        }

        self.get_mut(host)?.includes.push(module);
        self.get_mut(module)?.dependents.push(host);
        debug!("{} includes {}", self.label(host), self.label(module));
        self.invalidate(host)?;
        Ok(true)
    }

    /// Добавить только обратное ребро: `dependent` пересобирается вместе с
    /// `module`, не включая его в свой порядок предков.
    pub fn add_dependent(&mut self, module: ModuleId, dependent: ModuleId) -> RtResult<()> {
        self.get(dependent)?;
        let dependents = &mut self.get_mut(module)?.dependents;
        if !dependents.contains(&dependent) {
            dependents.push(dependent);
        }
        Ok(())
    }

    /// Сбросить кэши модуля и транзитивно всех зависимых.
    pub fn invalidate(&mut self, id: ModuleId) -> RtResult<()> {
        let mut seen = HashSet::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            let module = self.get_mut(current)?;
            module.ancestors = None;
            module.lookup.clear();
            pending.extend(module.dependents.iter().copied());
        }
        trace!("invalidated {} module(s) from {}", seen.len(), self.label(id));
        Ok(())
    }

    /// Линейный порядок предков: пост-порядок обхода в глубину, первое
    /// вхождение выигрывает, сам модуль последним.
    pub fn ancestors_of(&mut self, id: ModuleId) -> RtResult<Vec<ModuleId>> {
        let mut visiting = HashSet::new();
        self.compute_ancestors(id, &mut visiting)
    }

    fn compute_ancestors(
        &mut self,
        id: ModuleId,
        visiting: &mut HashSet<ModuleId>,
    ) -> RtResult<Vec<ModuleId>> {
        if let Some(cached) = &self.get(id)?.ancestors {
            return Ok(cached.clone());
        }
        if !visiting.insert(id) {
            return Err(RuntimeError::CyclicInclude(self.label(id)));
        }

        let includes = self.get(id)?.includes.clone();
        let (red_zone, grow_size) = (self.red_zone, self.grow_size);
        let mut order: Vec<ModuleId> = Vec::new();
        for included in includes {
            let sub = stacker::maybe_grow(red_zone, grow_size, || {
                self.compute_ancestors(included, visiting)
            })?;
            for ancestor in sub {
                if !order.contains(&ancestor) {
                    order.push(ancestor);
                }
            }
        }
        if !order.contains(&id) {
            order.push(id);
        }

        visiting.remove(&id);
        self.get_mut(id)?.ancestors = Some(order.clone());
        Ok(order)
    }

    /// Все кандидаты с именем `name` в порядке предков. Последний — активный.
    pub fn lookup(&mut self, id: ModuleId, name: &str) -> RtResult<Vec<MethodEntry>> {
        if let Some(cached) = self.get(id)?.lookup.get(name) {
            return Ok(cached.clone());
        }

        let mut entries = Vec::new();
        for ancestor in self.ancestors_of(id)? {
            if let Some(member) = self.get(ancestor)?.members.get(name) {
                entries.push(MethodEntry {
                    owner: ancestor,
                    name: name.to_string(),
                    member: member.clone(),
                });
            }
        }

        self.get_mut(id)?
            .lookup
            .insert(name.to_string(), entries.clone());
        Ok(entries)
    }

    /// Самая производная реализация `name`.
    pub fn instance_method(&mut self, id: ModuleId, name: &str) -> RtResult<Option<MethodEntry>> {
        Ok(self.lookup(id, name)?.pop())
    }

    /// Выигрывающие члены по всем именам, видимым из `id`.
    ///
    /// Предки из `skip` не участвуют: их члены уже видны через другое хранилище.
    pub fn winners(&mut self, id: ModuleId, skip: &[ModuleId]) -> RtResult<Vec<MethodEntry>> {
        let mut winners: HashMap<String, MethodEntry> = HashMap::new();
        for ancestor in self.ancestors_of(id)? {
            if skip.contains(&ancestor) {
                continue;
            }
            for (name, member) in &self.get(ancestor)?.members {
                winners.insert(
                    name.clone(),
                    MethodEntry {
                        owner: ancestor,
                        name: name.clone(),
                        member: member.clone(),
                    },
                );
            }
        }
        let mut winners: Vec<MethodEntry> = winners.into_values().collect();
        winners.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(winners)
    }

    /// Сколько имён закэшировано в таблице поиска модуля.
    pub fn cached_lookups(&self, id: ModuleId) -> RtResult<usize> {
        Ok(self.get(id)?.lookup.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::value::Value;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(256 * 1024, 8 * 1024 * 1024)
    }

    fn define(reg: &mut ModuleRegistry, name: &str, method: &str) -> ModuleId {
        let id = reg.create(Some(name), ModuleKind::Trait);
        let label = name.to_string();
        reg.get_mut(id).unwrap().members.insert(
            method.to_string(),
            Member::Method(Method::new(move |_, _| Ok(Value::Str(label.clone())))),
        );
        id
    }

    #[test]
    fn test_linearization_order() {
        let mut reg = registry();
        let c = define(&mut reg, "C", "foo");
        let b = define(&mut reg, "B", "foo");
        let a = define(&mut reg, "A", "foo");
        reg.add_include(b, c).unwrap();
        reg.add_include(a, b).unwrap();

        assert_eq!(reg.ancestors_of(a).unwrap(), vec![c, b, a]);
        let owners: Vec<ModuleId> = reg.lookup(a, "foo").unwrap().iter().map(|e| e.owner).collect();
        assert_eq!(owners, vec![c, b, a]);
        assert_eq!(reg.instance_method(a, "foo").unwrap().unwrap().owner, a);
    }

    #[test]
    fn test_diamond_dedup() {
        let mut reg = registry();
        let d = define(&mut reg, "D", "foo");
        let b = reg.create(Some("B"), ModuleKind::Trait);
        let c = reg.create(Some("C"), ModuleKind::Trait);
        let a = reg.create(Some("A"), ModuleKind::Trait);
        reg.add_include(b, d).unwrap();
        reg.add_include(c, d).unwrap();
        reg.add_include(a, b).unwrap();
        reg.add_include(a, c).unwrap();

        let ancestors = reg.ancestors_of(a).unwrap();
        assert_eq!(ancestors, vec![d, b, c, a]);
        assert_eq!(ancestors.iter().filter(|m| **m == d).count(), 1);
    }

    #[test]
    fn test_include_invalidates_dependents() {
        let mut reg = registry();
        let base = reg.create(Some("Base"), ModuleKind::Trait);
        let mid = reg.create(Some("Mid"), ModuleKind::Trait);
        let top = reg.create(Some("Top"), ModuleKind::Trait);
        reg.add_include(mid, base).unwrap();
        reg.add_include(top, mid).unwrap();
        assert_eq!(reg.ancestors_of(top).unwrap(), vec![base, mid, top]);
        assert!(reg.lookup(top, "foo").unwrap().is_empty());
        assert_eq!(reg.cached_lookups(top).unwrap(), 1);

        let extra = define(&mut reg, "Extra", "foo");
        reg.add_include(base, extra).unwrap();

        assert!(!reg.get(top).unwrap().is_resolved());
        assert_eq!(reg.cached_lookups(top).unwrap(), 0);
        assert_eq!(reg.ancestors_of(top).unwrap(), vec![extra, base, mid, top]);
        assert_eq!(reg.lookup(top, "foo").unwrap().len(), 1);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut reg = registry();
        let a = reg.create(Some("A"), ModuleKind::Trait);
        let b = reg.create(Some("B"), ModuleKind::Trait);
        reg.add_include(a, b).unwrap();

        let err = reg.add_include(b, a).unwrap_err();
        assert!(matches!(err, RuntimeError::CyclicInclude(_)));
        assert!(matches!(reg.add_include(a, a), Err(RuntimeError::CyclicInclude(_))));
        // Граф не изменился
        assert!(reg.get(b).unwrap().includes.is_empty());
    }

    #[test]
    fn test_duplicate_include_is_noop() {
        let mut reg = registry();
        let a = reg.create(Some("A"), ModuleKind::Trait);
        let b = reg.create(Some("B"), ModuleKind::Trait);
        assert!(reg.add_include(a, b).unwrap());
        assert!(!reg.add_include(a, b).unwrap());
        assert_eq!(reg.get(b).unwrap().dependents, vec![a]);
    }

    #[test]
    fn test_lookup_missing_name() {
        let mut reg = registry();
        let a = define(&mut reg, "A", "foo");
        assert!(reg.lookup(a, "bar").unwrap().is_empty());
        assert!(reg.instance_method(a, "bar").unwrap().is_none());
    }

    #[test]
    fn test_lookup_returns_copy() {
        let mut reg = registry();
        let a = define(&mut reg, "A", "foo");
        let mut first = reg.lookup(a, "foo").unwrap();
        first.clear();
        assert_eq!(reg.lookup(a, "foo").unwrap().len(), 1);
    }

    #[test]
    fn test_winners_pick_most_derived() {
        let mut reg = registry();
        let c = define(&mut reg, "C", "foo");
        let a = define(&mut reg, "A", "foo");
        reg.get_mut(c).unwrap().members.insert("bar".to_string(), Member::Value(Value::Int(1)));
        reg.add_include(a, c).unwrap();

        let winners = reg.winners(a, &[]).unwrap();
        let names: Vec<(&str, ModuleId)> = winners.iter().map(|e| (e.name.as_str(), e.owner)).collect();
        assert_eq!(names, vec![("bar", c), ("foo", a)]);
    }

    #[test]
    fn test_winners_skip_listed_ancestors() {
        let mut reg = registry();
        let c = define(&mut reg, "C", "foo");
        let a = reg.create(Some("A"), ModuleKind::Trait);
        reg.add_include(a, c).unwrap();

        assert_eq!(reg.winners(a, &[]).unwrap().len(), 1);
        assert!(reg.winners(a, &[c]).unwrap().is_empty());
    }

    #[test]
    fn test_dependent_edge_is_invalidated_without_include() {
        let mut reg = registry();
        let class = define(&mut reg, "Class", "foo");
        let eigen = reg.create(None, ModuleKind::Trait);
        reg.add_dependent(class, eigen).unwrap();
        reg.add_dependent(class, eigen).unwrap();
        assert_eq!(reg.get(class).unwrap().dependents, vec![eigen]);

        assert_eq!(reg.ancestors_of(eigen).unwrap(), vec![eigen]);
        reg.invalidate(class).unwrap();
        assert!(!reg.get(eigen).unwrap().is_resolved());
    }

    #[test]
    fn test_unknown_module() {
        let mut reg = registry();
        assert!(matches!(reg.ancestors_of(ModuleId(9)), Err(RuntimeError::UnknownModule(9))));
    }
}
