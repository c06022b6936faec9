//! Scope analysis: walks a desugared tree bottom-up-by-discovery, deciding
//! for every variable whether it can live in a plain register (`Local`) or
//! must be boxed in a heap `Ref` cell because some nested lambda reads or
//! writes it (`OwnRef`).
//!
//! The key invariant, carried over unchanged from the reference algorithm:
//! the moment a variable is observed across a lambda boundary, *every*
//! access to it — including ones that lexically precede the lambda — is
//! promoted to a ref, not just the ones inside the lambda. A variable's
//! frame is the scope that first reads or writes it; every scope between
//! that frame and the lambda that captures it relays the name upward so
//! closures can chain (a grandchild lambda captures through its parent's
//! own captured-ref array, not directly from the grandparent).

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::{Node, NodeId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Local(u32),
    OwnRef(u32),
}

#[derive(Debug, Clone, Copy)]
pub enum CaptureSource {
    FromParentOwnRef(u32),
    FromParentCapture(u32),
}

#[derive(Debug, Default)]
pub struct LambdaLayout {
    pub num_locals: u32,
    pub num_own_refs: u32,
    /// One entry per slot of the lambda's *captured*-ref array, in order.
    pub captures: Vec<CaptureSource>,
}

#[derive(Default)]
pub struct Analysis {
    pub resolved: HashMap<NodeId, Resolved>,
    pub lambdas: HashMap<NodeId, LambdaLayout>,
    pub root_locals: u32,
    pub root_own_refs: u32,
}

#[derive(Default)]
struct VarEntry {
    needs_ref: bool,
    reads: Vec<NodeId>,
    writes: Vec<NodeId>,
}

#[derive(Default)]
struct Frame {
    variables: IndexMap<String, VarEntry>,
    /// Discovery-ordered relay list; mirrors the reference `Scope.Refs`.
    refs: Vec<String>,
}

impl Frame {
    fn add_ref(&mut self, name: &str) {
        if !self.refs.iter().any(|r| r == name) {
            self.refs.push(name.to_string());
        }
    }

    fn ref_index(&self, name: &str) -> u32 {
        self.refs.iter().position(|r| r == name).expect("ref relayed") as u32
    }
}

pub struct Analyzer {
    stack: Vec<Frame>,
    analysis: Analysis,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            stack: vec![Frame::default()],
            analysis: Analysis::default(),
        }
    }

    pub fn analyze(mut self, root: &Node) -> Result<Analysis> {
        self.walk(root)?;
        let frame = self.stack.pop().expect("root frame");
        let (num_locals, num_own_refs) = self.close_frame(frame, None);
        self.analysis.root_locals = num_locals;
        self.analysis.root_own_refs = num_own_refs;
        Ok(self.analysis)
    }

    fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    fn find_ancestor(&self, name: &str) -> Option<usize> {
        if self.depth() == 0 {
            return None;
        }
        let mut d = self.depth() - 1;
        loop {
            if self.stack[d].variables.contains_key(name) {
                return Some(d);
            }
            if d == 0 {
                return None;
            }
            d -= 1;
        }
    }

    fn make_ref_chain(&mut self, name: &str) {
        let mut d = self.depth();
        loop {
            self.stack[d].add_ref(name);
            if d == 0 {
                break;
            }
            d -= 1;
        }
    }

    /// A read is legal only if `name` is already known — either written
    /// earlier in this same scope (including a parameter's synthetic
    /// write at lambda entry) or found in an ancestor scope. Anything
    /// else is an unresolved read: a scope-analyzer/front-end bug, since
    /// the parser guarantees every binding site threads a synthetic
    /// write before any read of it can be walked.
    fn read(&mut self, name: &str, id: NodeId) -> Result<()> {
        let cur = self.depth();
        let known_locally = self.stack[cur].variables.contains_key(name);
        let ancestor = self.find_ancestor(name);
        if !known_locally && ancestor.is_none() {
            return Err(Error::panic(format!("unresolved read of `{name}` (node {id})")));
        }

        self.stack[cur]
            .variables
            .entry(name.to_string())
            .or_default()
            .reads
            .push(id);

        if let Some(def_depth) = ancestor {
            self.stack[def_depth]
                .variables
                .get_mut(name)
                .unwrap()
                .needs_ref = true;
            self.make_ref_chain(name);
        }
        Ok(())
    }

    fn write(&mut self, name: &str, id: NodeId) {
        let cur = self.depth();
        self.stack[cur]
            .variables
            .entry(name.to_string())
            .or_default()
            .writes
            .push(id);

        if let Some(def_depth) = self.find_ancestor(name) {
            self.stack[def_depth]
                .variables
                .get_mut(name)
                .unwrap()
                .needs_ref = true;
            self.make_ref_chain(name);
        }
    }

    /// Resolves every variable in `frame` (locals vs. own-refs), recording
    /// entries into `self.analysis.resolved`. Returns `(num_locals, num_own_refs)`.
    fn close_frame(&mut self, frame: Frame, lambda_id: Option<NodeId>) -> (u32, u32) {
        let mut num_locals = 0u32;
        let mut own_ref_names = Vec::new();

        for (name, entry) in frame.variables.iter() {
            if entry.needs_ref {
                let idx = own_ref_names.len() as u32;
                own_ref_names.push(name.clone());
                for id in entry.reads.iter().chain(entry.writes.iter()) {
                    self.analysis.resolved.insert(*id, Resolved::OwnRef(idx));
                }
            } else {
                let idx = num_locals;
                num_locals += 1;
                for id in entry.reads.iter().chain(entry.writes.iter()) {
                    self.analysis.resolved.insert(*id, Resolved::Local(idx));
                }
            }
        }

        // Names relayed through but never directly accessed at this level
        // are captures this frame must receive from its own parent.
        let captured_ref_names: Vec<String> = frame
            .refs
            .iter()
            .filter(|n| !own_ref_names.contains(n))
            .cloned()
            .collect();

        if let Some(id) = lambda_id {
            let parent = self.stack.last().expect("parent frame");
            let mut captures = Vec::with_capacity(captured_ref_names.len());
            for name in &captured_ref_names {
                let source = if let Some(entry) = parent.variables.get(name) {
                    debug_assert!(entry.needs_ref, "captured name must be a ref at every level");
                    let idx = parent
                        .refs
                        .iter()
                        .filter(|n| parent.variables.get(*n).map_or(false, |e| e.needs_ref))
                        .position(|n| n == name)
                        .expect("own ref index") as u32;
                    CaptureSource::FromParentOwnRef(idx)
                } else {
                    let idx = parent
                        .refs
                        .iter()
                        .filter(|n| !parent.variables.contains_key(*n))
                        .position(|n| n == name)
                        .expect("parent capture index") as u32;
                    CaptureSource::FromParentCapture(idx)
                };
                captures.push(source);
            }
            self.analysis.lambdas.insert(
                id,
                LambdaLayout {
                    num_locals,
                    num_own_refs: own_ref_names.len() as u32,
                    captures,
                },
            );
        }

        (num_locals, own_ref_names.len() as u32)
    }

    fn walk(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Nil | Node::Bool(_) | Node::Int(_) | Node::Str(_) => {}
            Node::Variable { id, name } => self.read(name, *id)?,
            Node::Assign { id, name, value } => {
                self.walk(value)?;
                self.write(name, *id);
            }
            Node::GetScoped(_) => {}
            Node::SetScoped(_, value) => self.walk(value)?,
            Node::GetIvar(_) => {}
            Node::SetIvar(_, value) => self.walk(value)?,
            Node::Block(stmts) => {
                for s in stmts {
                    self.walk(s)?;
                }
            }
            Node::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.walk(cond)?;
                self.walk(then_branch)?;
                if let Some(e) = else_branch {
                    self.walk(e)?;
                }
            }
            Node::While { cond, body } => {
                self.walk(cond)?;
                self.walk(body)?;
            }
            Node::SelfExpr => {}
            Node::Call {
                receiver,
                args,
                kwargs,
                ..
            } => {
                self.walk(receiver)?;
                for a in args {
                    self.walk(a)?;
                }
                for (_, v) in kwargs {
                    self.walk(v)?;
                }
            }
            Node::UpCall { receiver, args, kwargs, .. } => {
                self.walk(receiver)?;
                for a in args {
                    self.walk(a)?;
                }
                for (_, v) in kwargs {
                    self.walk(v)?;
                }
            }
            Node::Invoke { callee, args } => {
                self.walk(callee)?;
                for a in args {
                    self.walk(a)?;
                }
            }
            Node::Lambda { id, params, body } => {
                self.stack.push(Frame::default());
                for (name, pid) in params {
                    self.write(name, *pid);
                }
                let result = self.walk(body);
                let frame = self.stack.pop().expect("lambda frame");
                result?;
                self.close_frame(frame, Some(*id));
            }
            Node::ListLit(items) => {
                for i in items {
                    self.walk(i)?;
                }
            }
            Node::MapLit(pairs) => {
                for (k, v) in pairs {
                    self.walk(k)?;
                    self.walk(v)?;
                }
            }
            Node::Attribute { receiver, .. } => self.walk(receiver)?,
            Node::Import { .. } | Node::Definition { .. } | Node::ClassDefinition { .. } | Node::Has { .. } => {
                unreachable!("{node:?} should have been rewritten by the desugarer before scope analysis")
            }
        }
        Ok(())
    }
}

pub fn analyze(root: &Node) -> Result<Analysis> {
    Analyzer::new().analyze(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desugar::desugar_program;
    use crate::syntax::parse;

    fn analyze_src(src: &str) -> (Vec<Node>, Analysis) {
        let (program, mut ids) = parse(src).unwrap();
        let program = desugar_program(program, &mut ids);
        let block = Node::Block(program.clone());
        let analysis = analyze(&block).unwrap_or_else(|e| panic!("analysis of `{src}` failed: {e}"));
        (program, analysis)
    }

    fn variable_id(node: &Node, name: &str) -> Option<NodeId> {
        match node {
            Node::Variable { id, name: n } if n == name => Some(*id),
            Node::Block(stmts) => stmts.iter().find_map(|s| variable_id(s, name)),
            Node::Assign { value, .. } => variable_id(value, name),
            Node::Call { receiver, args, .. } | Node::UpCall { receiver, args, .. } => {
                variable_id(receiver, name).or_else(|| args.iter().find_map(|a| variable_id(a, name)))
            }
            Node::Lambda { body, .. } => variable_id(body, name),
            Node::If { cond, then_branch, else_branch } => variable_id(cond, name)
                .or_else(|| variable_id(then_branch, name))
                .or_else(|| else_branch.as_ref().and_then(|e| variable_id(e, name))),
            Node::While { cond, body } => variable_id(cond, name).or_else(|| variable_id(body, name)),
            _ => None,
        }
    }

    #[test]
    fn unused_local_never_needs_a_ref() {
        let (program, analysis) = analyze_src("a = 1; a");
        let id = variable_id(&Node::Block(program), "a").unwrap();
        assert!(matches!(analysis.resolved.get(&id), Some(Resolved::Local(_))));
    }

    #[test]
    fn variable_captured_by_a_lambda_is_promoted_to_a_ref() {
        let (program, analysis) = analyze_src("a = 1; f = () => { a }; a");
        let block = Node::Block(program);
        let id = variable_id(&block, "a").expect("a read of `a` outside the lambda");
        assert!(
            matches!(analysis.resolved.get(&id), Some(Resolved::OwnRef(_))),
            "a read of `a` that lexically precedes the capturing lambda must still be a ref"
        );
    }

    #[test]
    fn nested_lambda_chains_captures_through_its_parent() {
        let (program, _ids) = parse("outer = () => { a = 1; inner = () => { a }; inner }").unwrap();
        let block = Node::Block(program);
        let analysis = analyze(&block).unwrap();
        // Two lambda layouts: `outer` and the nested `inner`.
        assert_eq!(analysis.lambdas.len(), 2);
        let inner = analysis
            .lambdas
            .values()
            .find(|l| l.num_own_refs == 0 && !l.captures.is_empty())
            .expect("inner lambda should have exactly one capture and no own refs");
        assert_eq!(inner.captures.len(), 1);
        assert!(matches!(inner.captures[0], CaptureSource::FromParentOwnRef(_)));
    }

    #[test]
    fn read_of_a_name_with_no_prior_write_anywhere_is_a_panic() {
        let (program, mut ids) = parse("foo").unwrap();
        let program = desugar_program(program, &mut ids);
        let block = Node::Block(program);
        let err = analyze(&block).unwrap_err();
        assert!(err.is_panic(), "expected a Panic error, got {err}");
    }

    #[test]
    fn read_of_a_name_written_earlier_in_the_same_scope_is_fine() {
        let (_program, analysis) = analyze_src("foo = 1; foo");
        assert!(!analysis.resolved.is_empty());
    }

    #[test]
    fn read_of_a_sibling_lambdas_local_is_a_panic() {
        let (program, mut ids) = parse("f = () => { b = 1 }; g = () => { b }").unwrap();
        let program = desugar_program(program, &mut ids);
        let block = Node::Block(program);
        let err = analyze(&block).unwrap_err();
        assert!(err.is_panic());
    }
}
