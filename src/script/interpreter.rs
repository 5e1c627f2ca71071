//! Tree-walking evaluator for compiled [`Block`]s.
//!
//! The interpreter never touches engine state directly: every identifier
//! lookup, assignment and member access on an engine object goes through
//! the [`Bridge`], which is what lets the engine observe reads and writes.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::ast::{BinaryOp, Block, Expr, UnaryOp};
use super::builtins;
use super::Bridge;
use crate::error::{Error, Result};
use crate::value::{Function, Handle, Variant};

/// Evaluator state shared by every expression run through one
/// [`Runtime`](super::Runtime).
#[derive(Debug)]
pub struct Interpreter {
    builtins: HashMap<String, Function>,
    evaluations: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter with the standard built-in functions.
    pub fn new() -> Self {
        Self {
            builtins: builtins::standard(),
            evaluations: 0,
        }
    }

    /// Register (or replace) a built-in function.
    pub fn register(&mut self, function: Function) {
        self.builtins.insert(function.name().to_owned(), function);
    }

    /// Number of blocks run so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Run every statement in `block`, returning the last statement's value.
    pub fn run(&mut self, block: &Block, bridge: &mut dyn Bridge) -> Result<Variant> {
        self.evaluations += 1;
        let mut last = Variant::Nil;
        for statement in &block.statements {
            last = self.eval(statement, bridge)?;
        }
        Ok(last)
    }

    /// Evaluate to a plain value; group handles are materialized.
    fn eval(&self, expr: &Expr, bridge: &mut dyn Bridge) -> Result<Variant> {
        match self.eval_ref(expr, bridge)? {
            Variant::Object(handle @ Handle::Group(_)) => bridge.settle(&handle),
            other => Ok(other),
        }
    }

    /// Evaluate, leaving engine handles as handles so member access on them
    /// reads only the member.
    fn eval_ref(&self, expr: &Expr, bridge: &mut dyn Bridge) -> Result<Variant> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.lookup(name, bridge),
            Expr::Member(object, name) => {
                let object = self.eval_ref(object, bridge)?;
                member(object, name, bridge)
            }
            Expr::Index(object, index) => {
                let object = self.eval(object, bridge)?;
                let index = self.eval(index, bridge)?;
                index_into(object, &index)
            }
            Expr::Call(callee, args) => {
                let callee = self.eval(callee, bridge)?;
                let kind = callee.kind_name();
                let Variant::Function(function) = callee else {
                    return Err(Error::script(format!("{kind} is not callable")));
                };
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, bridge))
                    .collect::<Result<Vec<_>>>()?;
                function.call(&args)
            }
            Expr::Unary(op, operand) => {
                let operand = self.eval(operand, bridge)?;
                unary(*op, operand)
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let lhs = self.eval(lhs, bridge)?;
                if lhs.truthy() {
                    self.eval(rhs, bridge)
                } else {
                    Ok(lhs)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let lhs = self.eval(lhs, bridge)?;
                if lhs.truthy() {
                    Ok(lhs)
                } else {
                    self.eval(rhs, bridge)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, bridge)?;
                let rhs = self.eval(rhs, bridge)?;
                binary(*op, lhs, rhs)
            }
            Expr::Conditional(condition, then, otherwise) => {
                if self.eval(condition, bridge)?.truthy() {
                    self.eval_ref(then, bridge)
                } else {
                    self.eval_ref(otherwise, bridge)
                }
            }
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item, bridge))
                .collect::<Result<Vec<_>>>()
                .map(Variant::List),
            Expr::Record(fields) => fields
                .iter()
                .map(|(key, value)| -> Result<(String, Variant)> {
                    Ok((key.clone(), self.eval(value, bridge)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Variant::Record),
            Expr::Assign(target, value) => {
                let value = self.eval(value, bridge)?;
                self.assign(target, value.clone(), bridge)?;
                Ok(value)
            }
        }
    }

    fn lookup(&self, name: &str, bridge: &mut dyn Bridge) -> Result<Variant> {
        if let Some(value) = bridge.get(name)? {
            return Ok(value);
        }
        self.builtins
            .get(name)
            .cloned()
            .map(Variant::Function)
            .ok_or_else(|| Error::Unresolved {
                name: name.to_owned(),
            })
    }

    fn assign(&self, target: &Expr, value: Variant, bridge: &mut dyn Bridge) -> Result<()> {
        match target {
            Expr::Ident(name) => bridge.set(name, value),
            Expr::Member(object, name) => {
                let object = self.eval_ref(object, bridge)?;
                match object {
                    Variant::Component(_) | Variant::Object(_) => {
                        bridge.set_member(&object, name, value)
                    }
                    other => Err(Error::script(format!(
                        "cannot assign to member `{name}` of {}",
                        other.kind_name()
                    ))),
                }
            }
            _ => Err(Error::script("invalid assignment target")),
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn member(object: Variant, name: &str, bridge: &mut dyn Bridge) -> Result<Variant> {
    match object {
        Variant::Record(mut fields) => fields.remove(name).ok_or_else(|| Error::Unresolved {
            name: name.to_owned(),
        }),
        Variant::Component(_) | Variant::Object(_) => bridge.member(&object, name),
        other => Err(Error::script(format!(
            "{} has no member `{name}`",
            other.kind_name()
        ))),
    }
}

fn index_into(object: Variant, index: &Variant) -> Result<Variant> {
    let position = |len: usize| -> Result<usize> {
        match index {
            Variant::Int(i) if *i >= 0 && (*i as u64) < len as u64 => Ok(*i as usize),
            Variant::Int(i) => Err(Error::script(format!(
                "index {i} out of range for length {len}"
            ))),
            other => Err(Error::script(format!(
                "index must be an int, got {}",
                other.kind_name()
            ))),
        }
    };
    match object {
        Variant::List(mut items) => {
            let at = position(items.len())?;
            Ok(items.swap_remove(at))
        }
        Variant::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let at = position(chars.len())?;
            Ok(Variant::Str(chars[at].to_string()))
        }
        Variant::Record(mut fields) => match index {
            Variant::Str(key) => fields.remove(key.as_str()).ok_or_else(|| Error::Unresolved {
                name: key.clone(),
            }),
            other => Err(Error::script(format!(
                "record key must be a string, got {}",
                other.kind_name()
            ))),
        },
        other => Err(Error::script(format!(
            "{} cannot be indexed",
            other.kind_name()
        ))),
    }
}

fn unary(op: UnaryOp, operand: Variant) -> Result<Variant> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Variant::Bool(!value.truthy())),
        (UnaryOp::Neg, Variant::Int(i)) => i
            .checked_neg()
            .map(Variant::Int)
            .ok_or_else(|| Error::script("integer overflow")),
        (UnaryOp::Neg, Variant::Float(f)) => Ok(Variant::Float(-f)),
        (UnaryOp::Neg, other) => Err(Error::script(format!(
            "cannot negate {}",
            other.kind_name()
        ))),
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}

fn unsupported(op: BinaryOp, lhs: &Variant, rhs: &Variant) -> Error {
    Error::script(format!(
        "cannot apply `{}` to {} and {}",
        symbol(op),
        lhs.kind_name(),
        rhs.kind_name()
    ))
}

fn overflow() -> Error {
    Error::script("integer overflow")
}

fn binary(op: BinaryOp, lhs: Variant, rhs: Variant) -> Result<Variant> {
    use Variant::{Float, Int, List, Str};

    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Int(a), Int(b)) => a.checked_add(b).map(Int).ok_or_else(overflow),
            (Str(a), b) => Ok(Str(a + &b.to_text())),
            (a, Str(b)) => Ok(Str(a.to_text() + &b)),
            (List(mut a), List(b)) => {
                a.extend(b);
                Ok(List(a))
            }
            (a, b) => float_op(op, &a, &b, |x, y| x + y),
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (Int(a), Int(b)) => a.checked_sub(b).map(Int).ok_or_else(overflow),
            (a, b) => float_op(op, &a, &b, |x, y| x - y),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Int(a), Int(b)) => a.checked_mul(b).map(Int).ok_or_else(overflow),
            (a, b) => float_op(op, &a, &b, |x, y| x * y),
        },
        BinaryOp::Div => {
            if rhs.as_float() == Some(0.0) {
                return Err(Error::script("division by zero"));
            }
            float_op(op, &lhs, &rhs, |x, y| x / y)
        }
        BinaryOp::Rem => match (lhs, rhs) {
            (Int(_), Int(0)) => Err(Error::script("division by zero")),
            (Int(a), Int(b)) => a.checked_rem_euclid(b).map(Int).ok_or_else(overflow),
            (a, b) => {
                if b.as_float() == Some(0.0) {
                    return Err(Error::script("division by zero"));
                }
                float_op(op, &a, &b, |x, y| x % y)
            }
        },
        BinaryOp::Eq => Ok(Variant::Bool(equals(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Variant::Bool(!equals(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&lhs, &rhs).ok_or_else(|| unsupported(op, &lhs, &rhs))?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Variant::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => Err(Error::Internal(
            "short-circuit operators are evaluated lazily".into(),
        )),
    }
}

fn float_op(
    op: BinaryOp,
    lhs: &Variant,
    rhs: &Variant,
    apply: impl Fn(f64, f64) -> f64,
) -> Result<Variant> {
    match (lhs.as_float(), rhs.as_float()) {
        (Some(a), Some(b)) => Ok(Variant::Float(apply(a, b))),
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

fn equals(lhs: &Variant, rhs: &Variant) -> bool {
    match (lhs, rhs) {
        (Variant::Int(a), Variant::Float(b)) | (Variant::Float(b), Variant::Int(a)) => {
            (*a as f64) == *b
        }
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Variant, rhs: &Variant) -> Option<Ordering> {
    match (lhs, rhs) {
        (Variant::Int(a), Variant::Int(b)) => Some(a.cmp(b)),
        (Variant::Str(a), Variant::Str(b)) => Some(a.cmp(b)),
        _ => lhs.as_float()?.partial_cmp(&rhs.as_float()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse;
    use pretty_assertions::assert_eq;

    /// A flat variable map standing in for a component scope.
    #[derive(Default)]
    struct MapBridge {
        vars: HashMap<String, Variant>,
        reads: Vec<String>,
    }

    impl Bridge for MapBridge {
        fn has(&mut self, name: &str) -> bool {
            self.vars.contains_key(name)
        }

        fn get(&mut self, name: &str) -> Result<Option<Variant>> {
            self.reads.push(name.to_owned());
            Ok(self.vars.get(name).cloned())
        }

        fn set(&mut self, name: &str, value: Variant) -> Result<()> {
            self.vars.insert(name.to_owned(), value);
            Ok(())
        }

        fn member(&mut self, object: &Variant, name: &str) -> Result<Variant> {
            Err(Error::Internal(format!(
                "no member `{name}` on {}",
                object.kind_name()
            )))
        }

        fn set_member(&mut self, object: &Variant, name: &str, _value: Variant) -> Result<()> {
            self.member(object, name).map(|_| ())
        }

        fn settle(&mut self, _handle: &Handle) -> Result<Variant> {
            Ok(Variant::Nil)
        }
    }

    fn run_with(source: &str, bridge: &mut MapBridge) -> Result<Variant> {
        let block = parse(source).expect("test source must parse");
        Interpreter::new().run(&block, bridge)
    }

    fn run(source: &str) -> Result<Variant> {
        run_with(source, &mut MapBridge::default())
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(run("2 + 3 * 4").unwrap(), Variant::Int(14));
        assert_eq!(run("-7 % 3").unwrap(), Variant::Int(2));
    }

    #[test]
    fn division_promotes_to_float() {
        assert_eq!(run("7 / 2").unwrap(), Variant::Float(3.5));
        assert_eq!(run("1 + 0.5").unwrap(), Variant::Float(1.5));
    }

    #[test]
    fn division_by_zero_is_a_script_error() {
        assert_eq!(run("1 / 0").unwrap_err(), Error::script("division by zero"));
        assert_eq!(run("1 % 0").unwrap_err(), Error::script("division by zero"));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(
            run("9223372036854775807 + 1").unwrap_err(),
            Error::script("integer overflow")
        );
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(run(r#""w=" + 10"#).unwrap(), Variant::from("w=10"));
    }

    #[test]
    fn comparisons_cross_numeric_kinds() {
        assert_eq!(run("1 == 1.0").unwrap(), Variant::Bool(true));
        assert_eq!(run("2 < 2.5").unwrap(), Variant::Bool(true));
        assert_eq!(run(r#""a" < "b""#).unwrap(), Variant::Bool(true));
        assert!(run(r#"1 < "b""#).is_err());
    }

    #[test]
    fn short_circuit_skips_rhs() {
        let mut bridge = MapBridge::default();
        let result = run_with("false && missing", &mut bridge).unwrap();
        assert_eq!(result, Variant::Bool(false));
        assert!(bridge.reads.is_empty());
        assert_eq!(run("nil || 4").unwrap(), Variant::Int(4));
    }

    #[test]
    fn ternary_picks_branch() {
        assert_eq!(run("0 ? 1 : 2").unwrap(), Variant::Int(2));
    }

    #[test]
    fn variables_resolve_through_bridge() {
        let mut bridge = MapBridge::default();
        bridge.vars.insert("width".into(), Variant::Int(10));
        assert_eq!(run_with("width * 2", &mut bridge).unwrap(), Variant::Int(20));
        assert_eq!(bridge.reads, vec!["width".to_string()]);
    }

    #[test]
    fn assignment_writes_and_yields_value() {
        let mut bridge = MapBridge::default();
        let result = run_with("height = 4; height + 1", &mut bridge).unwrap();
        assert_eq!(result, Variant::Int(5));
        assert_eq!(bridge.vars.get("height"), Some(&Variant::Int(4)));
    }

    #[test]
    fn unknown_identifier_is_unresolved() {
        assert_eq!(
            run("nope + 1").unwrap_err(),
            Error::Unresolved {
                name: "nope".into()
            }
        );
    }

    #[test]
    fn builtins_are_fallback() {
        assert_eq!(run("max(3, 9, 4)").unwrap(), Variant::Int(9));
        let mut bridge = MapBridge::default();
        bridge.vars.insert("max".into(), Variant::Int(1));
        assert_eq!(run_with("max", &mut bridge).unwrap(), Variant::Int(1));
    }

    #[test]
    fn records_and_indexing() {
        assert_eq!(run("{ a: 1, b: [5, 6] }.b[1]").unwrap(), Variant::Int(6));
        assert_eq!(run(r#""abc"[2]"#).unwrap(), Variant::from("c"));
        assert!(run("[1][3]").is_err());
        assert!(run("[1][-1]").is_err());
    }

    #[test]
    fn calling_a_non_function_fails() {
        assert_eq!(run("3(1)").unwrap_err(), Error::script("int is not callable"));
    }

    #[test]
    fn evaluation_counter() {
        let block = parse("1").unwrap();
        let mut interpreter = Interpreter::new();
        let mut bridge = MapBridge::default();
        interpreter.run(&block, &mut bridge).unwrap();
        interpreter.run(&block, &mut bridge).unwrap();
        assert_eq!(interpreter.evaluations(), 2);
    }
}
