//! Куча объектов и хранилища слотов.
//!
//! Каждый объект хранит собственные слоты и ссылку на структурного
//! родителя (прототип). Прототип класса — это его хранилище; экземпляры
//! ссылаются на него, поэтому установленные в него методы сразу видны всем
//! экземплярам, включая созданные раньше.

use std::collections::HashMap;

use crate::error::{RtResult, RuntimeError};
use crate::method::Slot;
use crate::value::{ModuleId, ObjectId};

/// Объект кучи.
#[derive(Debug, Clone, Default)]
pub struct Object {
    /// Собственные слоты
    pub slots: HashMap<String, Slot>,
    /// Структурный родитель
    pub proto: Option<ObjectId>,
    /// Класс экземпляра (у прототипов и объектов классов нет)
    pub class: Option<ModuleId>,
    /// Лениво созданный eigen-модуль
    pub eigen: Option<ModuleId>,
    /// Метка для отладки
    pub label: Option<String>,
}

/// Куча объектов.
#[derive(Debug, Default)]
pub struct ObjectHeap {
    objects: Vec<Object>,
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Выделить объект.
    pub fn alloc(&mut self, proto: Option<ObjectId>, class: Option<ModuleId>) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(Object {
            proto,
            class,
            ..Object::default()
        });
        id
    }

    pub fn get(&self, id: ObjectId) -> RtResult<&Object> {
        self.objects
            .get(id.0 as usize)
            .ok_or(RuntimeError::UnknownObject(id.0))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> RtResult<&mut Object> {
        self.objects
            .get_mut(id.0 as usize)
            .ok_or(RuntimeError::UnknownObject(id.0))
    }

    pub fn label(&self, id: ObjectId) -> String {
        match self.get(id) {
            Ok(Object {
                label: Some(label), ..
            }) => label.clone(),
            _ => format!("#<object #{}>", id.0),
        }
    }

    /// Собственный слот объекта, без обхода родителей.
    pub fn own_slot(&self, id: ObjectId, name: &str) -> RtResult<Option<&Slot>> {
        Ok(self.get(id)?.slots.get(name))
    }

    /// Записать слот, если он отличается от текущего. Возвращает `true` при записи.
    pub fn install(&mut self, id: ObjectId, name: &str, slot: Slot) -> RtResult<bool> {
        let object = self.get_mut(id)?;
        if object.slots.get(name) == Some(&slot) {
            return Ok(false);
        }
        object.slots.insert(name.to_string(), slot);
        Ok(true)
    }

    /// Найти слот по цепочке родителей: сначала собственный.
    pub fn find_slot(&self, id: ObjectId, name: &str) -> RtResult<Option<&Slot>> {
        let mut current = Some(id);
        while let Some(object_id) = current {
            let object = self.get(object_id)?;
            if let Some(slot) = object.slots.get(name) {
                return Ok(Some(slot));
            }
            current = object.proto;
        }
        Ok(None)
    }

    /// Выводится ли объект структурно из `ancestor` (не считая себя).
    pub fn derives_from(&self, id: ObjectId, ancestor: ObjectId) -> RtResult<bool> {
        let mut current = self.get(id)?.proto;
        while let Some(object_id) = current {
            if object_id == ancestor {
                return Ok(true);
            }
            current = self.get(object_id)?.proto;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_find_slot_walks_proto_chain() {
        let mut heap = ObjectHeap::new();
        let root = heap.alloc(None, None);
        let mid = heap.alloc(Some(root), None);
        let leaf = heap.alloc(Some(mid), None);
        heap.install(root, "x", Slot::Value(Value::Int(1))).unwrap();

        assert_eq!(heap.find_slot(leaf, "x").unwrap(), Some(&Slot::Value(Value::Int(1))));
        assert!(heap.own_slot(leaf, "x").unwrap().is_none());

        heap.install(mid, "x", Slot::Value(Value::Int(2))).unwrap();
        assert_eq!(heap.find_slot(leaf, "x").unwrap(), Some(&Slot::Value(Value::Int(2))));
        assert!(heap.find_slot(leaf, "y").unwrap().is_none());
    }

    #[test]
    fn test_install_skips_identical() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc(None, None);
        assert!(heap.install(obj, "x", Slot::Value(Value::Int(1))).unwrap());
        assert!(!heap.install(obj, "x", Slot::Value(Value::Int(1))).unwrap());
        assert!(heap.install(obj, "x", Slot::Value(Value::Int(2))).unwrap());
    }

    #[test]
    fn test_derives_from() {
        let mut heap = ObjectHeap::new();
        let root = heap.alloc(None, None);
        let leaf = heap.alloc(Some(root), None);
        let other = heap.alloc(None, None);
        assert!(heap.derives_from(leaf, root).unwrap());
        assert!(!heap.derives_from(leaf, other).unwrap());
        assert!(!heap.derives_from(root, root).unwrap());
    }

    #[test]
    fn test_unknown_object() {
        let heap = ObjectHeap::new();
        assert!(matches!(heap.get(ObjectId(3)), Err(RuntimeError::UnknownObject(3))));
    }
}
