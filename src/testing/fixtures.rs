//! Small ready-made component trees.
//!
//! Every fixture is instantiated from a [`ComponentDefinition`] but not yet
//! updated, so tests decide when the first
//! [`update_expressions`](Engine::update_expressions) runs.

use crate::component::ComponentId;
use crate::definition::{ComponentDefinition, PropertyDefinition};
use crate::engine::Engine;
use crate::value::ValueKind;

/// Instantiate `definition` as the root of a fresh engine.
///
/// # Panics
///
/// Panics if the definition does not instantiate.
pub fn build(definition: &ComponentDefinition) -> (Engine, ComponentId) {
    let mut engine = Engine::new();
    let root = engine
        .instantiate(None, definition)
        .unwrap_or_else(|err| panic!("fixture failed to instantiate: {err}"));
    (engine, root)
}

/// `Window#root { Rect#a { width: 10 }, Rect#b { width: a.width * 2 } }`
pub fn width_pair() -> (Engine, ComponentId) {
    build(
        &ComponentDefinition::new("Window")
            .with_id("root")
            .with_child(
                ComponentDefinition::new("Rect")
                    .with_id("a")
                    .with_property(PropertyDefinition::new("width").with_source("10")),
            )
            .with_child(
                ComponentDefinition::new("Rect").with_id("b").with_property(
                    PropertyDefinition::new("width")
                        .with_kind(ValueKind::Int)
                        .with_source("a.width * 2"),
                ),
            ),
    )
}

/// `Window#root { size: 2, border: { color: "red", width: root.size } }`
/// with `border` a `{ color: string, width: int }` group.
pub fn bordered() -> (Engine, ComponentId) {
    build(
        &ComponentDefinition::new("Window")
            .with_id("root")
            .with_property(PropertyDefinition::new("size").with_source("2"))
            .with_property(
                PropertyDefinition::new("border")
                    .with_kind(ValueKind::group([
                        ("color", ValueKind::String),
                        ("width", ValueKind::Int),
                    ]))
                    .with_source("{ color: \"red\", width: root.size }"),
            ),
    )
}
