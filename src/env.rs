// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::ExprRef;
use crate::builtins::{standard, BuiltinFcn, Overload};
use crate::checker::Checker;
use crate::clock::{Clock, SystemClock};
use crate::interpreter::Interpreter;
use crate::lexer::Source;
use crate::macros::{self, Macro, STANDARD_MACROS};
use crate::parser::Parser;
use crate::value::Value;
use crate::*;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use log::debug;

/// Computes the value of a library-provided variable from the evaluation
/// start time.
pub type VariableFcn = Rc<dyn Fn(&DateTime<Utc>) -> Value>;

#[derive(Clone)]
pub struct Binding {
    pub fcn: BuiltinFcn,
    pub strict: bool,
}

/// Declarations and implementations contributed by libraries.
#[derive(Clone)]
pub struct Registry {
    functions: BTreeMap<String, Vec<Overload>>,
    bindings: BTreeMap<String, Binding>,
    macros: Vec<Macro>,
    variables: BTreeMap<String, Option<VariableFcn>>,
    clock: Rc<dyn Clock>,
}

impl Registry {
    fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            functions: BTreeMap::new(),
            bindings: BTreeMap::new(),
            macros: STANDARD_MACROS.clone(),
            variables: BTreeMap::new(),
            clock,
        }
    }

    /// Adds overloads to a function. Overload ids must be unique across the
    /// registry.
    pub fn declare(&mut self, name: &str, overloads: Vec<Overload>) -> Result<()> {
        for o in &overloads {
            let dup = self
                .functions
                .values()
                .flatten()
                .any(|existing| existing.id == o.id);
            if dup {
                bail!("overload `{}` of `{name}` is already declared", o.id);
            }
        }
        self.functions
            .entry(name.to_string())
            .or_default()
            .extend(overloads);
        Ok(())
    }

    fn is_declared(&self, id: &str) -> bool {
        self.functions.values().flatten().any(|o| o.id == id)
    }

    fn bind_with(&mut self, id: &str, fcn: BuiltinFcn, strict: bool) -> Result<()> {
        if !self.is_declared(id) {
            bail!("cannot bind undeclared overload `{id}`");
        }
        self.bindings.insert(id.to_string(), Binding { fcn, strict });
        Ok(())
    }

    /// Binds an implementation. Error arguments are returned without
    /// invoking it.
    pub fn bind(&mut self, id: &str, fcn: BuiltinFcn) -> Result<()> {
        self.bind_with(id, fcn, true)
    }

    /// Binds an implementation that also receives error arguments.
    pub fn bind_non_strict(&mut self, id: &str, fcn: BuiltinFcn) -> Result<()> {
        self.bind_with(id, fcn, false)
    }

    /// Declares a function and binds every overload to the same
    /// implementation.
    pub fn function(
        &mut self,
        name: &str,
        overloads: Vec<Overload>,
        fcn: BuiltinFcn,
    ) -> Result<()> {
        let ids: Vec<String> = overloads.iter().map(|o| o.id.clone()).collect();
        self.declare(name, overloads)?;
        for id in ids {
            self.bind(&id, fcn.clone())?;
        }
        Ok(())
    }

    pub fn declare_macro(&mut self, m: Macro) {
        self.macros.push(m);
    }

    /// Declares a variable whose value is supplied at evaluation time.
    pub fn declare_variable(&mut self, name: &str) {
        self.variables.insert(name.to_string(), None);
    }

    /// Declares a variable whose value is computed by the library.
    pub fn bind_variable(&mut self, name: &str, fcn: VariableFcn) {
        self.variables.insert(name.to_string(), Some(fcn));
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        self.clock.clone()
    }

    pub fn overloads(&self, name: &str) -> Option<&[Overload]> {
        self.functions.get(name).map(|v| v.as_slice())
    }

    pub fn binding(&self, id: &str) -> Option<&Binding> {
        self.bindings.get(id)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Option<VariableFcn>> {
        self.variables.get(name)
    }

    pub fn macros(&self) -> &[Macro] {
        &self.macros
    }
}

/// A named set of functions, macros and variables.
pub trait Library {
    fn name(&self) -> &'static str;
    fn register(&self, registry: &mut Registry) -> Result<()>;
}

/// Compilation environment.
///
/// ```ignore
/// let mut env = Env::new();
/// env.add_library(&libs::Strings)?;
/// env.declare_variable("state");
/// let program = env.compile("state.name.to_upper()")?;
/// ```
#[derive(Clone)]
pub struct Env {
    registry: Rc<Registry>,
    libraries: Vec<&'static str>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        let mut registry = Registry::new(clock);
        // The standard declarations are fixed and cannot collide.
        if let Err(e) = standard::register(&mut registry) {
            log::error!("failed to register standard functions: {e}");
        }
        Self {
            registry: Rc::new(registry),
            libraries: vec![],
        }
    }

    /// Registers a library once; adding the same library again is a no-op.
    pub fn add_library(&mut self, lib: &dyn Library) -> Result<()> {
        if self.libraries.contains(&lib.name()) {
            debug!("library `{}` already registered", lib.name());
            return Ok(());
        }
        lib.register(Rc::make_mut(&mut self.registry))?;
        self.libraries.push(lib.name());
        debug!("registered library `{}`", lib.name());
        Ok(())
    }

    pub fn libraries(&self) -> &[&'static str] {
        &self.libraries
    }

    pub fn declare_variable(&mut self, name: &str) {
        Rc::make_mut(&mut self.registry).declare_variable(name);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn compile(&self, src: &str) -> Result<Program> {
        let source = Source::from_contents("<expr>".to_string(), src.to_string())?;
        self.compile_source(&source)
    }

    /// Parses, expands macros and checks the expression.
    pub fn compile_source(&self, source: &Source) -> Result<Program> {
        let mut parser = Parser::new(source)?;
        let parsed = parser.parse()?;
        let expr = macros::expand(&parsed, self.registry.macros())?;
        Checker::new(&self.registry).check(&expr)?;
        debug!("compiled {}", source.file());
        Ok(Program {
            expr,
            registry: self.registry.clone(),
        })
    }
}

/// A checked expression ready for evaluation.
pub struct Program {
    expr: ExprRef,
    registry: Rc<Registry>,
}

impl Program {
    /// Evaluates against the given variable values. A soft error result is
    /// returned as `Ok(Value::Error(..))`.
    pub fn eval(&self, activation: &BTreeMap<String, Value>) -> Result<Value> {
        let start = self.registry.clock().now();
        let mut interpreter = Interpreter::new(&self.registry, activation, start);
        interpreter.eval_expr(&self.expr)
    }

    pub fn eval_with(&self, name: &str, value: Value) -> Result<Value> {
        let mut activation = BTreeMap::new();
        activation.insert(name.to_string(), value);
        self.eval(&activation)
    }
}
