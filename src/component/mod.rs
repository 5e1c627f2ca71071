//! Component arena: slotmap-backed component tree with scope resolution.

pub mod node;
pub mod scope;
pub mod tree;

pub use node::{ComponentData, ComponentId, Enumeration, Namespace};
pub use scope::Entity;
pub use tree::Tree;
