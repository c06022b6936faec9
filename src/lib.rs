//! `kestrel`: a small dynamically-typed, object-oriented scripting language.
//!
//! The pipeline a script passes through end to end:
//!
//! `syntax::parse` -> `desugar::desugar_program` -> `scope::analyze` ->
//! `codegen::compile_program` -> `vm::call_code`.
//!
//! [`Kestrel`] wraps an [`Interpreter`] (the runtime ontology plus the
//! dynamic scoped-variable environment) and drives a script through every
//! stage. It needs no `unsafe impl Send` the way the reference embedding
//! API's `Hebi` does: an `Interpreter`'s `Rc`/`RefCell` internals already
//! make it `!Send`/`!Sync`, so there's nothing to assert away.

pub mod ast;
pub mod codegen;
pub mod desugar;
pub mod error;
pub mod runtime;
pub mod scope;
pub mod scoped_env;
pub mod syntax;
pub mod util;
pub mod value;
pub mod vm;

use ast::Node;
use error::Result;
use runtime::Interpreter;
use value::{Package, Ptr, Value};

/// The embedding surface: parse, compile and run scripts against one
/// interpreter instance. Each [`eval`](Kestrel::eval) call compiles and runs
/// the given source as a single top-level program, with `self` bound to a
/// fresh [`Package`] value (not nil) so that top-level `def`/`class`/`has`
/// forms dispatch through [`value::PackageMirror`] exactly the way they
/// would inside an explicit `class` body.
pub struct Kestrel {
    interp: Interpreter,
}

impl Kestrel {
    pub fn new() -> Self {
        Kestrel { interp: Interpreter::new() }
    }

    /// Parses `src` without compiling or running it; surfaces a syntax
    /// error without touching the runtime's class/package registries.
    pub fn check(&self, src: &str) -> Result<()> {
        syntax::parse(src)?;
        Ok(())
    }

    /// Parses, desugars, compiles and runs `src` as a single top-level
    /// program, returning the value of its last statement.
    pub fn eval(&self, src: &str) -> Result<Value> {
        let (program, mut ids) = syntax::parse(src)?;
        let program = desugar::desugar_program(program, &mut ids);
        let analysis = scope::analyze(&Node::Block(program.clone()))?;
        let code = codegen::compile_program(&self.interp.rt, &analysis, &program)?;

        let pkg = Package::new("main", self.interp.rt.class("Package"));
        let self_value = Value::object(Ptr::new(pkg));
        vm::call_code(&self.interp, &code, self_value, Vec::new(), &[])
    }

    /// Parses, desugars and compiles `src` without running it. Used by the
    /// CLI's `--disassemble` flag and by tests that want to inspect the
    /// generated bytecode directly.
    pub fn compile(&self, src: &str) -> Result<Ptr<value::Code>> {
        let (program, mut ids) = syntax::parse(src)?;
        let program = desugar::desugar_program(program, &mut ids);
        let analysis = scope::analyze(&Node::Block(program.clone()))?;
        codegen::compile_program(&self.interp.rt, &analysis, &program)
    }

    /// Direct access to the underlying runtime, for embedders that want to
    /// register additional packages before running a script.
    pub fn runtime(&self) -> &runtime::Runtime {
        &self.interp.rt
    }
}

impl Default for Kestrel {
    fn default() -> Self {
        Self::new()
    }
}
