//! # Mixin Runtime
//!
//! Рантайм композиции объектов: модули-примеси в стиле Ruby поверх
//! одиночного наследования, цепочки `call_super`, singleton-расширение
//! объектов и автоматическая перематериализация таблиц диспетчеризации
//! при изменении композиции.
//!
//! ## Основные модули
//!
//! - [`modules`] - Граф композиции, порядок предков, кэш поиска, компилятор
//! - [`dispatch`] - Вызов методов и цепочка `call_super`
//! - [`class`] - Классы, наследование, создание экземпляров
//! - [`objects`] - Куча объектов и хранилища слотов
//! - [`runtime`] - Фасад: `include`, `extend`, `is_a`, `resolve`
//!
//! ## Пример
//!
//! ```rust
//! use mixin_runtime::{Definition, DefineOptions, Method, Runtime, Value};
//!
//! let mut rt = Runtime::new();
//! let module_a = rt
//!     .new_module(
//!         Some("ModuleA"),
//!         Definition::new().method("say_hi", Method::new(|_, _| Ok(Value::from("A")))),
//!         DefineOptions::default(),
//!     )
//!     .unwrap();
//! let class_x = rt
//!     .new_class(
//!         Some("ClassX"),
//!         None,
//!         Definition::new().include(module_a).method(
//!             "say_hi",
//!             Method::with_super(|rt, inv| {
//!                 let prefix = inv.call_super(rt, vec![])?;
//!                 Ok(Value::from(format!("{}X", prefix.as_str().unwrap_or(""))))
//!             }),
//!         ),
//!         DefineOptions::default(),
//!     )
//!     .unwrap();
//!
//! let x = rt.instantiate(class_x, vec![]).unwrap();
//! assert_eq!(rt.send(x, "say_hi", vec![]).unwrap(), Value::from("AX"));
//! ```

// === Основные модули ===
pub mod class;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod method;
pub mod modules;
pub mod objects;
pub mod runtime;
pub mod value;

// === Re-exports для удобства ===
pub use class::ClassParts;
pub use config::{DefineOptions, RuntimeConfig};
pub use dispatch::Invocation;
pub use error::{RtResult, RuntimeError};
pub use method::{Compiled, Definition, Member, Method, MethodEntry, Slot};
pub use modules::{Mixin, ModuleInfo, ModuleKind};
pub use runtime::Runtime;
pub use value::{ModuleId, ObjectId, Value};
