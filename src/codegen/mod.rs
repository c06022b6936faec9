//! Code generator: walks desugared, scope-analyzed AST and produces
//! `Code` objects. Register allocation is purely compile-time — the low
//! `num_params` registers stage incoming call arguments, the next
//! `num_locals` are permanent slots for non-captured locals, and
//! everything above that is scratch space reclaimed after each
//! sub-expression the way a hand-written recursive emitter naturally
//! does it (no separate liveness pass).

pub mod peephole;

use indexmap::IndexMap;

use crate::ast::{Node, NodeId};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::scope::{Analysis, CaptureSource, Resolved};
use crate::value::code::{Arity, CallSite, Instruction, Op};
use crate::value::{Code, Ptr};

struct CodeBuilder<'a> {
    rt: &'a Runtime,
    analysis: &'a Analysis,
    name: String,
    param_ids: Vec<NodeId>,
    num_params: u32,
    num_locals: u32,
    num_own_refs: u32,
    captures: Vec<CaptureSource>,
    instructions: Vec<Instruction>,
    strings: Vec<Ptr<crate::value::Str>>,
    string_index: IndexMap<String, u32>,
    calls: Vec<CallSite>,
    sub_code: Vec<Ptr<Code>>,
    scratch_top: u8,
    max_reg: u8,
}

impl<'a> CodeBuilder<'a> {
    fn new(
        rt: &'a Runtime,
        analysis: &'a Analysis,
        name: String,
        param_ids: Vec<NodeId>,
        num_locals: u32,
        num_own_refs: u32,
        captures: Vec<CaptureSource>,
    ) -> Self {
        let num_params = param_ids.len() as u32;
        let base = num_params + num_locals;
        CodeBuilder {
            rt,
            analysis,
            name,
            param_ids,
            num_params,
            num_locals,
            num_own_refs,
            captures,
            instructions: Vec::new(),
            strings: Vec::new(),
            string_index: IndexMap::new(),
            calls: Vec::new(),
            sub_code: Vec::new(),
            scratch_top: base as u8,
            max_reg: base as u8,
        }
    }

    fn local_reg(&self, idx: u32) -> u8 {
        (self.num_params + idx) as u8
    }

    fn alloc_scratch(&mut self) -> u8 {
        let r = self.scratch_top;
        self.scratch_top += 1;
        self.max_reg = self.max_reg.max(self.scratch_top);
        r
    }

    fn emit(&mut self, op: Op, a: u8, b: u8, c: u8, data: i32) -> usize {
        self.instructions.push(Instruction::new(op, a, b, c, data));
        self.instructions.len() - 1
    }

    fn patch(&mut self, idx: usize, target: i32) {
        self.instructions[idx].data = target;
    }

    fn next_index(&self) -> i32 {
        self.instructions.len() as i32
    }

    fn intern_str(&mut self, s: &str) -> i32 {
        if let Some(&i) = self.string_index.get(s) {
            return i as i32;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(self.rt.intern(s));
        self.string_index.insert(s.to_string(), idx);
        idx as i32
    }

    fn add_call_site(&mut self, method: &str, kw_names: Option<Vec<String>>) -> i32 {
        let method = self.rt.intern(method);
        let site = match kw_names {
            None => CallSite::positional(method),
            Some(names) => CallSite::keyword(method, names.into_iter().map(|n| self.rt.intern(&n)).collect()),
        };
        self.calls.push(site);
        (self.calls.len() - 1) as i32
    }

    fn resolved(&self, id: NodeId) -> Result<Resolved> {
        self.analysis
            .resolved
            .get(&id)
            .copied()
            .ok_or_else(|| Error::panic(format!("node {id} was never scope-resolved")))
    }

    /// Emits `node`'s value into `dest`. Any scratch registers allocated
    /// while doing so are reclaimed before returning — `dest` itself must
    /// already be allocated by the caller.
    fn emit_expr(&mut self, node: &Node, dest: u8) -> Result<()> {
        let entry = self.scratch_top;
        self.emit_expr_inner(node, dest)?;
        self.scratch_top = entry;
        Ok(())
    }

    fn emit_expr_inner(&mut self, node: &Node, dest: u8) -> Result<()> {
        match node {
            Node::Nil => {
                self.emit(Op::StoreNil, dest, 0, 0, 0);
            }
            Node::Bool(true) => {
                self.emit(Op::StoreTrue, dest, 0, 0, 0);
            }
            Node::Bool(false) => {
                self.emit(Op::StoreFalse, dest, 0, 0, 0);
            }
            Node::Int(n) => {
                let truncated = i32::try_from(*n).unwrap_or(i32::MAX);
                self.emit(Op::StoreInt, dest, 0, 0, truncated);
            }
            Node::Str(s) => {
                let idx = self.intern_str(s);
                self.emit(Op::StoreStr, dest, 0, 0, idx);
            }
            Node::Variable { id, .. } => match self.resolved(*id)? {
                Resolved::Local(idx) => {
                    self.emit(Op::CopyReg, dest, self.local_reg(idx), 0, 0);
                }
                Resolved::OwnRef(idx) => {
                    self.emit(Op::LoadRef, dest, idx as u8, 0, 0);
                }
            },
            Node::Assign { id, value, .. } => {
                self.emit_expr(value, dest)?;
                match self.resolved(*id)? {
                    Resolved::Local(idx) => {
                        let reg = self.local_reg(idx);
                        if reg != dest {
                            self.emit(Op::CopyReg, reg, dest, 0, 0);
                        }
                    }
                    Resolved::OwnRef(idx) => {
                        self.emit(Op::StoreRef, idx as u8, dest, 0, 0);
                    }
                }
            }
            Node::GetScoped(name) => {
                let idx = self.intern_str(name);
                self.emit(Op::GetScoped, dest, 0, 0, idx);
            }
            Node::SetScoped(name, value) => {
                self.emit_expr(value, dest)?;
                let idx = self.intern_str(name);
                self.emit(Op::SetScoped, dest, dest, 0, idx);
            }
            Node::GetIvar(name) => {
                let idx = self.intern_str(name);
                self.emit(Op::GetIvar, dest, 0, 0, idx);
            }
            Node::SetIvar(name, value) => {
                self.emit_expr(value, dest)?;
                let idx = self.intern_str(name);
                self.emit(Op::SetIvar, dest, dest, 0, idx);
            }
            Node::Block(stmts) => {
                if stmts.is_empty() {
                    self.emit(Op::StoreNil, dest, 0, 0, 0);
                } else {
                    for s in &stmts[..stmts.len() - 1] {
                        let mark = self.scratch_top;
                        let tmp = self.alloc_scratch();
                        self.emit_expr(s, tmp)?;
                        self.scratch_top = mark;
                    }
                    self.emit_expr(stmts.last().unwrap(), dest)?;
                }
            }
            Node::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_reg = self.alloc_scratch();
                self.emit_expr(cond, cond_reg)?;
                let jf = self.emit(Op::GotoIfFalse, cond_reg, 0, 0, -1);
                self.emit_expr(then_branch, dest)?;
                let jend = self.emit(Op::Goto, 0, 0, 0, -1);
                let else_start = self.next_index();
                self.patch(jf, else_start);
                match else_branch {
                    Some(e) => self.emit_expr(e, dest)?,
                    None => {
                        self.emit(Op::StoreNil, dest, 0, 0, 0);
                    }
                }
                let end = self.next_index();
                self.patch(jend, end);
            }
            Node::While { cond, body } => {
                let loop_start = self.next_index();
                let cond_reg = self.alloc_scratch();
                self.emit_expr(cond, cond_reg)?;
                let jf = self.emit(Op::GotoIfFalse, cond_reg, 0, 0, -1);
                let mark = self.scratch_top;
                let tmp = self.alloc_scratch();
                self.emit_expr(body, tmp)?;
                self.scratch_top = mark;
                self.emit(Op::Goto, 0, 0, 0, loop_start);
                let end = self.next_index();
                self.patch(jf, end);
                self.emit(Op::StoreNil, dest, 0, 0, 0);
            }
            Node::SelfExpr => {
                self.emit(Op::LoadSelf, dest, 0, 0, 0);
            }
            Node::Call {
                receiver,
                method,
                args,
                kwargs,
            } => {
                let recv_reg = self.alloc_scratch();
                self.emit_expr(receiver, recv_reg)?;
                let mut arg_regs = Vec::with_capacity(args.len());
                for a in args {
                    let r = self.alloc_scratch();
                    self.emit_expr(a, r)?;
                    arg_regs.push(r);
                }
                if kwargs.is_empty() {
                    let call_site = self.add_call_site(method, None);
                    let op = if args.is_empty() { Op::Call0 } else { Op::CallN };
                    self.emit(op, dest, recv_reg, args.len() as u8, call_site);
                } else {
                    let mut kw_names = Vec::with_capacity(kwargs.len());
                    for (name, value) in kwargs {
                        let r = self.alloc_scratch();
                        self.emit_expr(value, r)?;
                        kw_names.push(name.clone());
                    }
                    let call_site = self.add_call_site(method, Some(kw_names));
                    self.emit(Op::CallKW, dest, recv_reg, args.len() as u8, call_site);
                }
            }
            Node::UpCall {
                receiver,
                method,
                args,
                kwargs,
            } => {
                if !kwargs.is_empty() {
                    crate::fail!("up-calls do not support keyword arguments");
                }
                let mirror_reg = self.alloc_scratch();
                self.emit_expr(receiver, mirror_reg)?;
                self.emit(Op::GetMirror, mirror_reg, mirror_reg, 0, 0);
                for a in args {
                    let r = self.alloc_scratch();
                    self.emit_expr(a, r)?;
                }
                let call_site = self.add_call_site(method, None);
                self.emit(Op::UpCallN, dest, mirror_reg, args.len() as u8, call_site);
            }
            Node::Invoke { callee, args } => {
                let callee_reg = self.alloc_scratch();
                self.emit_expr(callee, callee_reg)?;
                for a in args {
                    let r = self.alloc_scratch();
                    self.emit_expr(a, r)?;
                }
                self.emit(Op::Invoke, dest, callee_reg, args.len() as u8, 0);
            }
            Node::Lambda { id, params, body } => {
                let layout = self
                    .analysis
                    .lambdas
                    .get(id)
                    .ok_or_else(|| Error::panic("lambda was never scope-resolved"))?;
                let param_ids: Vec<NodeId> = params.iter().map(|(_, pid)| *pid).collect();
                let param_names: Vec<String> = params.iter().map(|(name, _)| name.clone()).collect();
                let sub = compile_function(
                    self.rt,
                    self.analysis,
                    format!("{}$lambda{}", self.name, id),
                    param_ids,
                    param_names,
                    Arity::fixed(params.len() as u32),
                    layout.num_locals,
                    layout.num_own_refs,
                    layout.captures.clone(),
                    body,
                )?;
                let idx = self.sub_code.len() as i32;
                self.sub_code.push(sub);
                self.emit(Op::CreateLambda, dest, 0, 0, idx);
            }
            Node::ListLit(items) => {
                self.emit(Op::NewList, dest, 0, 0, 0);
                for item in items {
                    let r = self.alloc_scratch();
                    self.emit_expr(item, r)?;
                    self.emit(Op::ListAppend, dest, r, 0, 0);
                    self.scratch_top -= 1;
                }
            }
            Node::MapLit(pairs) => {
                self.emit(Op::NewMap, dest, 0, 0, 0);
                for (k, v) in pairs {
                    let kr = self.alloc_scratch();
                    self.emit_expr(k, kr)?;
                    let vr = self.alloc_scratch();
                    self.emit_expr(v, vr)?;
                    self.emit(Op::SetMap, dest, kr, vr, 0);
                    self.scratch_top -= 2;
                }
            }
            Node::Attribute { .. }
            | Node::Import { .. }
            | Node::Definition { .. }
            | Node::ClassDefinition { .. }
            | Node::Has { .. } => {
                crate::bug!("{node:?} survived desugaring and reached codegen");
            }
        }
        Ok(())
    }

    /// Prologue: move each staged argument register into its resolved
    /// local register or own-ref cell.
    fn emit_param_prologue(&mut self) -> Result<()> {
        for (i, pid) in self.param_ids.clone().iter().enumerate() {
            let stage_reg = i as u8;
            match self.resolved(*pid)? {
                Resolved::Local(idx) => {
                    let reg = self.local_reg(idx);
                    if reg != stage_reg {
                        self.emit(Op::CopyReg, reg, stage_reg, 0, 0);
                    }
                }
                Resolved::OwnRef(idx) => {
                    self.emit(Op::StoreRef, idx as u8, stage_reg, 0, 0);
                }
            }
        }
        Ok(())
    }

    fn build(mut self, body: &Node, arity: Arity, param_names: Vec<String>) -> Result<Ptr<Code>> {
        self.emit_param_prologue()?;
        let result_reg = self.alloc_scratch();
        self.emit_expr(body, result_reg)?;
        self.emit(Op::Return, result_reg, 0, 0, 0);
        peephole::optimize(&mut self.instructions);

        Ok(Ptr::new(Code {
            name: self.rt.intern(&self.name),
            num_params: self.num_params,
            arity,
            num_regs: self.max_reg as u32,
            num_own_refs: self.num_own_refs,
            instructions: self.instructions,
            strings: self.strings,
            calls: self.calls,
            sub_code: self.sub_code,
            captures: self.captures,
            param_names,
        }))
    }
}

#[allow(clippy::too_many_arguments)]
fn compile_function(
    rt: &Runtime,
    analysis: &Analysis,
    name: String,
    param_ids: Vec<NodeId>,
    param_names: Vec<String>,
    arity: Arity,
    num_locals: u32,
    num_own_refs: u32,
    captures: Vec<CaptureSource>,
    body: &Node,
) -> Result<Ptr<Code>> {
    let builder = CodeBuilder::new(rt, analysis, name, param_ids, num_locals, num_own_refs, captures);
    builder.build(body, arity, param_names)
}

/// Compiles a whole program into the single top-level `Code` the VM runs
/// first. Classes and methods are no longer special-cased here: by the
/// time a program reaches codegen, the desugarer has already turned every
/// `ClassDefinition`/`Definition`/`Has`/`Import` into ordinary
/// assignments, up-calls and lambdas that execute the same way any other
/// top-level statement does, registering classes and methods through the
/// mirror natives as the program runs.
pub fn compile_program(rt: &Runtime, analysis: &Analysis, program: &[Node]) -> Result<Ptr<Code>> {
    let body = Node::Block(program.to_vec());
    let builder = CodeBuilder::new(
        rt,
        analysis,
        "<main>".to_string(),
        Vec::new(),
        analysis.root_locals,
        analysis.root_own_refs,
        Vec::new(),
    );
    builder.build(&body, Arity::fixed(0), Vec::new())
}
