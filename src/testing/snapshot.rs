//! Text rendering of a live component tree for snapshot assertions.

use std::fmt::Write;

use crate::component::ComponentId;
use crate::engine::Engine;
use crate::value::Variant;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render `root` and its subtree as indented text.
///
/// Each component is printed by its label (`Kind#id`), followed by its
/// properties in declaration order, two spaces deeper per level. Literal
/// properties print as `name = value`, expression-bound ones as
/// `name := value`, and aliases as `name -> value`. Group members are shown
/// inside their group's record. Values that have not settled yet print as
/// `<unsettled>`.
///
/// # Examples
///
/// ```
/// use proptree::testing::{dump_tree, fixtures};
///
/// let (mut engine, root) = fixtures::width_pair();
/// engine.update_expressions().unwrap();
/// assert!(dump_tree(&engine, root).contains("width := 20"));
/// ```
pub fn dump_tree(engine: &Engine, root: ComponentId) -> String {
    let mut out = String::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((component, depth)) = stack.pop() {
        let Some(data) = engine.component(component) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}{}", data.label());

        for &value in data.values() {
            let Some(slot) = engine.get(value) else {
                continue;
            };
            if slot.group().is_some() {
                continue;
            }
            let operator = if slot.is_alias() {
                "->"
            } else if slot.expression().is_some() {
                ":="
            } else {
                "="
            };
            let rendered = engine
                .value(value)
                .map_or_else(|| "<unsettled>".to_owned(), |v| render(engine, &v));
            let _ = writeln!(out, "{indent}  {} {operator} {rendered}", slot.name());
        }

        for &child in engine.children(component).iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    out.trim_end().to_owned()
}

/// `Display` with component references shown by label.
fn render(engine: &Engine, value: &Variant) -> String {
    match value {
        Variant::Component(id) => engine
            .component(*id)
            .map_or_else(|| "<removed>".to_owned(), |data| format!("&{}", data.label())),
        Variant::List(items) if items.iter().any(|i| matches!(i, Variant::Component(_))) => {
            let items: Vec<String> = items.iter().map(|item| render(engine, item)).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentData;
    use crate::position::Position;
    use crate::testing::fixtures;
    use crate::value::ValueKind;

    #[test]
    fn literal_expression_and_unsettled() {
        let (engine, root) = fixtures::width_pair();
        insta::assert_snapshot!(dump_tree(&engine, root), @r"
        Window#root
          Rect#a
            width = 10
          Rect#b
            width := <unsettled>
        ");
    }

    #[test]
    fn groups_aliases_and_references() {
        let mut engine = Engine::new();
        let root = engine.create_root(ComponentData::new("Window")).unwrap();
        let child = engine.add_child(root, ComponentData::new("Rect").with_id("r")).unwrap();
        engine
            .declare(
                root,
                "border",
                ValueKind::group([("color", ValueKind::String), ("width", ValueKind::Int)]),
            )
            .unwrap();
        engine.set_property(root, "border.color", "red").unwrap();
        engine
            .declare_alias(root, "stroke", "border.width", Position::unknown())
            .unwrap();
        let content = engine.declare(root, "content", ValueKind::Component).unwrap();
        engine.set_value(content, child).unwrap();
        engine.update_expressions().unwrap();

        insta::assert_snapshot!(dump_tree(&engine, root), @r#"
        Window
          border = { color: "red", width: 0 }
          stroke -> 0
          content = &Rect#r
          Rect#r
        "#);
    }
}
