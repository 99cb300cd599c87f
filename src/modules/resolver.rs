//! Компиляция и установка методов в хранилища.
//!
//! Resolve сбрасывает кэши изменённого модуля и всех зависимых, затем
//! каскадно материализует выигрывающие члены в каждое достижимое хранилище.

use std::collections::HashSet;

use log::{debug, trace};

use super::registry::{ModuleKind, ModuleRegistry};
use crate::error::RtResult;
use crate::method::{MethodEntry, Slot};
use crate::objects::ObjectHeap;
use crate::value::{ModuleId, ObjectId};

/// Компилятор: связывает реестр модулей с кучей объектов на время resolve.
pub struct ModuleCompiler<'a> {
    registry: &'a mut ModuleRegistry,
    heap: &'a mut ObjectHeap,
    red_zone: usize,
    grow_size: usize,
}

impl<'a> ModuleCompiler<'a> {
    pub fn new(
        registry: &'a mut ModuleRegistry,
        heap: &'a mut ObjectHeap,
        red_zone: usize,
        grow_size: usize,
    ) -> Self {
        Self {
            registry,
            heap,
            red_zone,
            grow_size,
        }
    }

    /// Resolve модуля и всех транзитивно зависимых от него.
    ///
    /// Возвращает число перезаписанных слотов.
    pub fn resolve(&mut self, id: ModuleId) -> RtResult<usize> {
        self.registry.invalidate(id)?;
        let mut done = HashSet::new();
        let written = self.resolve_cascade(id, &mut done)?;
        debug!(
            "resolved {}: {} module(s) visited, {} slot(s) written",
            self.registry.label(id),
            done.len(),
            written
        );
        Ok(written)
    }

    fn resolve_cascade(&mut self, id: ModuleId, done: &mut HashSet<ModuleId>) -> RtResult<usize> {
        if !done.insert(id) {
            return Ok(0);
        }

        let mut written = 0;
        let dependents = self.registry.get(id)?.dependents.clone();
        let (red_zone, grow_size) = (self.red_zone, self.grow_size);
        for dependent in dependents {
            written += stacker::maybe_grow(red_zone, grow_size, || {
                self.resolve_cascade(dependent, done)
            })?;
        }

        written += self.install(id)?;
        Ok(written)
    }

    /// Установить выигрывающие члены модуля в его хранилище.
    ///
    /// Модули без хранилища (трейты) пропускаются. Слот перезаписывается,
    /// только если скомпилированное значение отличается от установленного.
    /// Eigen-модуль экземпляра не ставит члены предков своего класса: они уже
    /// видны через прототип и стоят в цепочке `call_super` на позиции класса.
    pub fn install(&mut self, id: ModuleId) -> RtResult<usize> {
        let (store, kind) = {
            let module = self.registry.get(id)?;
            match module.backing_store() {
                Some(store) => (store, module.kind),
                None => return Ok(0),
            }
        };

        let mut skip = Vec::new();
        if let ModuleKind::Eigen { object } = kind {
            if let Some(class) = self.heap.get(object)?.class {
                skip = self.registry.ancestors_of(class)?;
            }
        }

        let winners = self.registry.winners(id, &skip)?;
        let mut written = self.remove_stale(id, store, &winners)?;
        for entry in winners {
            let slot = Slot::compile(&entry, id);
            if self.heap.install(store, &entry.name, slot)? {
                trace!(
                    "installed {}#{} from {} onto {}",
                    self.registry.label(id),
                    entry.name,
                    self.registry.label(entry.owner),
                    self.heap.label(store)
                );
                written += 1;
            }
        }
        Ok(written)
    }

    /// Снять методы, ранее установленные этим модулем, которые больше не выигрывают.
    fn remove_stale(
        &mut self,
        id: ModuleId,
        store: ObjectId,
        winners: &[MethodEntry],
    ) -> RtResult<usize> {
        let stale: Vec<String> = self
            .heap
            .get(store)?
            .slots
            .iter()
            .filter(|(name, slot)| {
                matches!(slot, Slot::Method(c) if c.env == id)
                    && !winners.iter().any(|w| &w.name == *name)
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in &stale {
            trace!("removed stale {} from {}", name, self.heap.label(store));
            self.heap.get_mut(store)?.slots.remove(name);
        }
        Ok(stale.len())
    }
}
