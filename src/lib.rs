//! # proptree
//!
//! A reactive property graph for declarative component trees.
//!
//! Components hold typed property [`Value`]s. A value is either a literal or
//! bound to a small scripted [`Expression`]; running an expression records
//! every value it reads and writes, and those records are the dependency
//! graph. When an input changes, its readers are marked dirty and
//! [`Engine::update_expressions`] re-evaluates them, pass after pass, until
//! nothing changes.
//!
//! ## Core Systems
//!
//! - **[`value`]**: `Variant`, `ValueKind`, casting rules and the `Value` slot
//! - **[`expression`]**: compiled bindings with their dependency sets
//! - **[`component`]**: slotmap-backed component tree and scope resolution
//! - **[`engine`]**: declaration, dirty propagation, aliases and the fixpoint loop
//! - **[`script`]**: the bundled expression language behind the `Bridge` seam
//! - **[`definition`]**: definition trees consumed by `Engine::instantiate`
//! - **[`config`]**: engine configuration
//! - **[`testing`]**: tree dumps and fixtures for tests
//!
//! ## Example
//!
//! ```
//! use proptree::{ComponentData, Engine, Position, ValueKind, Variant};
//!
//! let mut engine = Engine::new();
//! let root = engine.create_root(ComponentData::new("Window").with_id("root")).unwrap();
//! let width = engine.declare(root, "width", ValueKind::Int).unwrap();
//! let half = engine.declare(root, "half", ValueKind::Float).unwrap();
//! engine.set_value(width, 10).unwrap();
//! engine.set_expression(half, "width / 2", Position::unknown()).unwrap();
//!
//! engine.update_expressions().unwrap();
//! assert_eq!(engine.value(half), Some(Variant::Float(5.0)));
//! ```

// Foundation
pub mod config;
pub mod error;
pub mod position;

// Data model
pub mod component;
pub mod expression;
pub mod value;

// Scripting
pub(crate) mod collector;
pub mod script;

// Engine
pub mod definition;
pub mod engine;

// Test support
pub mod testing;

pub use component::{ComponentData, ComponentId, Entity, Enumeration, Namespace};
pub use config::{EngineConfig, GroupReset};
pub use definition::{ComponentDefinition, PropertyDefinition};
pub use engine::{Engine, UpdateReport, ValueUpdate};
pub use error::{Error, ErrorSet, Result};
pub use expression::{ExprId, Expression};
pub use position::Position;
pub use value::{Color, Function, Value, ValueId, ValueKind, Variant};
