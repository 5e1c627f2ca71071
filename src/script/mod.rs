//! Embedded expression language: tokenizer, parser, interpreter and the
//! shared [`Runtime`] handle.
//!
//! The engine talks to scripts only through three calls:
//!
//! - [`Runtime::compile`]: source text to a [`Program`], or a [`CompileError`]
//! - [`Runtime::run`]: execute a program against a [`Bridge`]
//! - [`Bridge`]: the variable interface (`has`, `get`, `set`, member access)

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod parser;
pub mod tokenizer;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub use ast::{Block, Expr};
pub use interpreter::Interpreter;
pub use parser::CompileError;

use crate::error::Result;
use crate::value::{Function, Handle, Variant};

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Variable resolution interface a script runs against.
///
/// Every identifier the script names, every assignment it makes, and every
/// member it reads on an engine object goes through this trait.
pub trait Bridge {
    /// Whether `name` resolves to anything in scope.
    fn has(&mut self, name: &str) -> bool;

    /// Resolve `name`. `Ok(None)` lets the interpreter fall back to its
    /// built-in functions.
    fn get(&mut self, name: &str) -> Result<Option<Variant>>;

    /// Assign to the property `name` resolves to.
    fn set(&mut self, name: &str, value: Variant) -> Result<()>;

    /// Read `name` on a component reference or engine handle.
    fn member(&mut self, object: &Variant, name: &str) -> Result<Variant>;

    /// Assign `name` on a component reference or engine handle.
    fn set_member(&mut self, object: &Variant, name: &str, value: Variant) -> Result<()>;

    /// Materialize a handle into a plain value.
    fn settle(&mut self, handle: &Handle) -> Result<Variant>;
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// A compiled expression body. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    block: Arc<Block>,
}

impl Program {
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// The value this program always produces, if it reads nothing.
    pub fn constant(&self) -> Option<Variant> {
        self.block.constant()
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Shared handle to the script interpreter.
///
/// Clones share one [`Interpreter`]; runs are serialized behind a mutex so
/// a handle may be passed between threads, but a single program always runs
/// to completion before the next one starts.
#[derive(Clone, Default)]
pub struct Runtime {
    inner: Arc<Mutex<Interpreter>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("evaluations", &self.evaluations())
            .finish()
    }
}

impl Runtime {
    /// A runtime with the standard built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source`. Compilation needs no interpreter state.
    pub fn compile(&self, source: &str) -> std::result::Result<Program, CompileError> {
        parser::parse(source).map(|block| Program {
            block: Arc::new(block),
        })
    }

    /// Run `program`, resolving variables through `bridge`.
    pub fn run(&self, program: &Program, bridge: &mut dyn Bridge) -> Result<Variant> {
        let mut interpreter = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        interpreter.run(&program.block, bridge)
    }

    /// Make `function` callable by name from every program.
    pub fn register(&self, function: Function) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(function);
    }

    /// Total number of programs run through this runtime.
    pub fn evaluations(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evaluations()
    }
}
