//! The tree shape produced by the front end and consumed by the desugarer,
//! scope analyzer and code generator. Grammar and precedence are
//! deliberately thin here — the interesting work downstream only cares
//! about the shape of the tree, not how it was parsed.

pub type NodeId = u32;

#[derive(Default)]
pub struct NodeIdGen(NodeId);

impl NodeIdGen {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> NodeId {
        let id = self.0;
        self.0 += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),

    Variable {
        id: NodeId,
        name: String,
    },
    Assign {
        id: NodeId,
        name: String,
        value: Box<Node>,
    },

    /// Dynamic, process-wide scoped lookup (distinct namespace from
    /// lexically-resolved locals/refs).
    GetScoped(String),
    SetScoped(String, Box<Node>),

    /// `@name` / `@name = value` — instance-variable access on the current
    /// frame's `self`. Resolved by name against the receiver's class's
    /// ivar table at runtime (see `vm::Op::GetIvar`/`SetIvar`), not by a
    /// compile-time slot: ivars are declared dynamically via `has`/
    /// `add_ivar` while a class body runs, so no fixed index is knowable
    /// when this node is compiled.
    GetIvar(String),
    SetIvar(String, Box<Node>),

    Block(Vec<Node>),
    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },

    SelfExpr,

    Call {
        receiver: Box<Node>,
        method: String,
        args: Vec<Node>,
        kwargs: Vec<(String, Node)>,
    },
    /// `receiver.^method(...)` — dispatches against `mirror_of(receiver)`
    /// rather than `receiver` directly; see `vm::Op::UpCallN`.
    UpCall {
        receiver: Box<Node>,
        method: String,
        args: Vec<Node>,
        kwargs: Vec<(String, Node)>,
    },

    /// `callee(args)` where `callee` is a plain expression expected to hold
    /// a `Lambda` value at runtime (as opposed to `Call`, which dispatches
    /// a named method against a receiver). Compiles to `vm::Op::Invoke`.
    Invoke {
        callee: Box<Node>,
        args: Vec<Node>,
    },

    Lambda {
        id: NodeId,
        /// `(name, synthetic node id)` — the id lets the scope analyzer
        /// treat a parameter's binding as a write at function entry, so
        /// it resolves to a register like any other local (or gets
        /// promoted to a ref if a nested lambda captures it).
        params: Vec<(String, NodeId)>,
        body: Box<Node>,
    },

    ListLit(Vec<Node>),
    MapLit(Vec<(Node, Node)>),

    /// `recv.name` with no call syntax — desugars to a zero-arg `Call`.
    Attribute {
        receiver: Box<Node>,
        name: String,
    },

    Import {
        path: String,
    },
    /// A method definition inside a class body. `alias` is the operator
    /// symbol named by a trailing `is "<op>"` clause, if any.
    Definition {
        id: NodeId,
        name: String,
        params: Vec<(String, NodeId)>,
        alias: Option<String>,
        body: Box<Node>,
    },
    ClassDefinition {
        name: String,
        superclass: Option<String>,
        body: Vec<Node>,
    },
    /// `has @ivar_name is trait1 is trait2` instance-variable declaration
    /// inside a class body.
    Has {
        name: String,
        traits: Vec<String>,
    },
}

impl Node {
    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block(_))
    }
}
