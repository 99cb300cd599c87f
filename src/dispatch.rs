//! Вызов методов и цепочка `call_super`.
//!
//! Курсор цепочки принадлежит кадру вызова (`Invocation`), а не объекту:
//! вложенные и рекурсивные вызовы того же метода на том же получателе
//! получают собственные кадры и не сбивают друг другу позицию.

use log::trace;

use crate::error::{RtResult, RuntimeError};
use crate::method::{Compiled, Member, MethodEntry, Slot};
use crate::modules::ModuleKind;
use crate::runtime::Runtime;
use crate::value::{ModuleId, ObjectId, Value};

/// Цепочка реализаций предков для одного вызова.
#[derive(Debug, Clone)]
struct SuperChain {
    methods: Vec<MethodEntry>,
    cursor: usize,
}

/// Кадр вызова метода.
#[derive(Debug)]
pub struct Invocation {
    receiver: ObjectId,
    args: Vec<Value>,
    chain: Option<SuperChain>,
}

impl Invocation {
    pub fn receiver(&self) -> ObjectId {
        self.receiver
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Аргумент по позиции; отсутствующий — `Nil`.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Nil)
    }

    /// Есть ли у вызова реализация предка.
    pub fn has_super(&self) -> bool {
        self.chain.as_ref().map_or(false, |c| c.cursor > 0)
    }

    /// Вызвать следующую менее производную реализацию.
    ///
    /// Новые аргументы позиционно замещают текущие. Без оставшихся предков
    /// возвращает `Nil`.
    pub fn call_super(&mut self, rt: &mut Runtime, args: Vec<Value>) -> RtResult<Value> {
        let entry = match self.chain.as_mut() {
            Some(chain) if chain.cursor > 0 => {
                chain.cursor -= 1;
                chain.methods[chain.cursor].clone()
            }
            _ => return Ok(Value::Nil),
        };

        for (index, arg) in args.into_iter().enumerate() {
            if index < self.args.len() {
                self.args[index] = arg;
            } else {
                self.args.push(arg);
            }
        }

        trace!("super -> {}#{}", rt.module_label(entry.owner), entry.name);
        let (red_zone, grow_size) = (rt.config.stack_red_zone, rt.config.stack_grow_size);
        let result = match &entry.member {
            Member::Method(method) => {
                stacker::maybe_grow(red_zone, grow_size, || method.call(rt, self))
            }
            Member::Value(value) => Ok(value.clone()),
        };

        if let Some(chain) = self.chain.as_mut() {
            chain.cursor += 1;
        }
        result
    }
}

impl Runtime {
    /// Вызвать метод `name` у объекта.
    pub fn send(&mut self, receiver: ObjectId, name: &str, args: Vec<Value>) -> RtResult<Value> {
        let slot = self.heap.find_slot(receiver, name)?.cloned();
        match slot {
            Some(Slot::Method(compiled)) => self.invoke(receiver, &compiled, args),
            Some(Slot::Value(value)) if args.is_empty() => Ok(value),
            Some(Slot::Value(_)) => Err(RuntimeError::NotCallable(format!(
                "{}#{}",
                self.heap.label(receiver),
                name
            ))),
            None => Err(RuntimeError::NoSuchMethod(format!(
                "{}#{}",
                self.heap.label(receiver),
                name
            ))),
        }
    }

    pub(crate) fn invoke(
        &mut self,
        receiver: ObjectId,
        compiled: &Compiled,
        args: Vec<Value>,
    ) -> RtResult<Value> {
        let chain = if compiled.method.calls_super() {
            // Цепочка берётся на момент вызова, а не компиляции
            let methods = self.super_chain(compiled.env, &compiled.name)?;
            if methods.len() > 1 {
                Some(SuperChain {
                    cursor: methods.len() - 1,
                    methods,
                })
            } else {
                None
            }
        } else {
            None
        };

        let mut invocation = Invocation {
            receiver,
            args,
            chain,
        };
        let (red_zone, grow_size) = (self.config.stack_red_zone, self.config.stack_grow_size);
        stacker::maybe_grow(red_zone, grow_size, || {
            compiled.method.call(self, &mut invocation)
        })
    }

    /// Кандидаты для `call_super` в окружении `env`.
    ///
    /// Для eigen-модуля экземпляра цепочка начинается с реализаций его класса.
    fn super_chain(&mut self, env: ModuleId, name: &str) -> RtResult<Vec<MethodEntry>> {
        let mut methods = Vec::new();
        if let ModuleKind::Eigen { object } = self.registry.get(env)?.kind {
            if let Some(class) = self.heap.get(object)?.class {
                methods = self.registry.lookup(class, name)?;
            }
        }
        for entry in self.registry.lookup(env, name)? {
            if !methods.iter().any(|m| m.owner == entry.owner) {
                methods.push(entry);
            }
        }
        Ok(methods)
    }
}
