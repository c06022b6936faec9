//! Rewrites high-level surface forms into the primitives the scope
//! analyzer and code generator actually understand.
//!
//! `Import`, `Definition`, `ClassDefinition` and `Has` never reach scope
//! analysis or codegen directly — each compiles down to an ordinary
//! assignment, up-call or lambda against the runtime's mirror objects,
//! so classes and methods come into being the same way any other
//! method call would, through `$LOADER`/`self.^add_method`/`add_class`/
//! `add_ivar` rather than a dedicated compile-time pass. `recv.name`
//! without call syntax is the other sugar handled here, folding into a
//! zero-argument `Call`.

use crate::ast::{Node, NodeIdGen};

pub fn desugar(node: Node, ids: &mut NodeIdGen) -> Node {
    match node {
        Node::Attribute { receiver, name } => Node::Call {
            receiver: Box::new(desugar(*receiver, ids)),
            method: name,
            args: Vec::new(),
            kwargs: Vec::new(),
        },
        Node::Block(stmts) => Node::Block(stmts.into_iter().map(|n| desugar(n, ids)).collect()),
        Node::If {
            cond,
            then_branch,
            else_branch,
        } => Node::If {
            cond: Box::new(desugar(*cond, ids)),
            then_branch: Box::new(desugar(*then_branch, ids)),
            else_branch: else_branch.map(|e| Box::new(desugar(*e, ids))),
        },
        Node::While { cond, body } => Node::While {
            cond: Box::new(desugar(*cond, ids)),
            body: Box::new(desugar(*body, ids)),
        },
        Node::Assign { id, name, value } => Node::Assign {
            id,
            name,
            value: Box::new(desugar(*value, ids)),
        },
        Node::SetScoped(name, value) => Node::SetScoped(name, Box::new(desugar(*value, ids))),
        Node::SetIvar(name, value) => Node::SetIvar(name, Box::new(desugar(*value, ids))),
        Node::Call {
            receiver,
            method,
            args,
            kwargs,
        } => Node::Call {
            receiver: Box::new(desugar(*receiver, ids)),
            method,
            args: args.into_iter().map(|n| desugar(n, ids)).collect(),
            kwargs: kwargs.into_iter().map(|(k, v)| (k, desugar(v, ids))).collect(),
        },
        Node::UpCall {
            receiver,
            method,
            args,
            kwargs,
        } => Node::UpCall {
            receiver: Box::new(desugar(*receiver, ids)),
            method,
            args: args.into_iter().map(|n| desugar(n, ids)).collect(),
            kwargs: kwargs.into_iter().map(|(k, v)| (k, desugar(v, ids))).collect(),
        },
        Node::Invoke { callee, args } => Node::Invoke {
            callee: Box::new(desugar(*callee, ids)),
            args: args.into_iter().map(|n| desugar(n, ids)).collect(),
        },
        Node::Lambda { id, params, body } => Node::Lambda {
            id,
            params,
            body: Box::new(desugar(*body, ids)),
        },
        Node::ListLit(items) => Node::ListLit(items.into_iter().map(|n| desugar(n, ids)).collect()),
        Node::MapLit(pairs) => {
            Node::MapLit(pairs.into_iter().map(|(k, v)| (desugar(k, ids), desugar(v, ids))).collect())
        }
        Node::Import { path } => desugar_import(&path, ids),
        Node::Definition { id, name, params, alias, body } => {
            desugar_definition(id, name, params, alias, *body, ids)
        }
        Node::ClassDefinition {
            name,
            superclass,
            body,
        } => desugar_class_definition(name, superclass, body, ids),
        Node::Has { name, traits } => desugar_has(name, traits),
        other => other,
    }
}

pub fn desugar_program(program: Vec<Node>, ids: &mut NodeIdGen) -> Vec<Node> {
    program.into_iter().map(|n| desugar(n, ids)).collect()
}

/// `Import a.b.c` -> `c = $LOADER.import("a.b.c")`.
/// `Import .a.b.c` -> `c = $LOADER.import_relative("a.b.c")`, the leading
/// dot marking a path relative to the importing package.
fn desugar_import(path: &str, ids: &mut NodeIdGen) -> Node {
    let (relative, body) = match path.strip_prefix('.') {
        Some(rest) => (true, rest),
        None => (false, path),
    };
    let binding_name = body.rsplit('.').next().unwrap_or(body).to_string();
    let method = if relative { "import_relative" } else { "import" };
    let call = Node::Call {
        receiver: Box::new(Node::GetScoped("LOADER".to_string())),
        method: method.to_string(),
        args: vec![Node::Str(body.to_string())],
        kwargs: Vec::new(),
    };
    Node::Assign {
        id: ids.next(),
        name: binding_name,
        value: Box::new(call),
    }
}

/// `name(args) { body }` inside a class body -> `self.^add_method("name",
/// lambda(args){body})`. The definition's own node id becomes the
/// lambda's id, so the frame the scope analyzer already built for it
/// (params pre-seeded as writes) carries straight over. A trailing
/// `is "<op>"` clause additionally desugars to `self.^alias_method("name",
/// "<op>")`, run right after the method is registered.
fn desugar_definition(
    id: crate::ast::NodeId,
    name: String,
    params: Vec<(String, crate::ast::NodeId)>,
    alias: Option<String>,
    body: Node,
    ids: &mut NodeIdGen,
) -> Node {
    let body = desugar(body, ids);
    let add_method = Node::UpCall {
        receiver: Box::new(Node::SelfExpr),
        method: "add_method".to_string(),
        args: vec![Node::Str(name.clone()), Node::Lambda { id, params, body: Box::new(body) }],
        kwargs: Vec::new(),
    };
    match alias {
        None => add_method,
        Some(op) => {
            let alias_method = Node::UpCall {
                receiver: Box::new(Node::SelfExpr),
                method: "alias_method".to_string(),
                args: vec![Node::Str(name), Node::Str(op)],
                kwargs: Vec::new(),
            };
            Node::Block(vec![add_method, alias_method])
        }
    }
}

/// `Name : Super { body }` -> `Name = self.^add_class("Name", "Super",
/// lambda(){body})`. The superclass name rides along as an extra
/// argument (rather than being dropped, as a literal reading of the
/// primitive form would have it) since otherwise inheritance would have
/// no way to reach the runtime at all.
fn desugar_class_definition(name: String, superclass: Option<String>, body: Vec<Node>, ids: &mut NodeIdGen) -> Node {
    let desugared_body: Vec<Node> = body.into_iter().map(|n| desugar(n, ids)).collect();
    let superclass_node = match superclass {
        Some(s) => Node::Str(s),
        None => Node::Nil,
    };
    let lambda_id = ids.next();
    let call = Node::UpCall {
        receiver: Box::new(Node::SelfExpr),
        method: "add_class".to_string(),
        args: vec![
            Node::Str(name.clone()),
            superclass_node,
            Node::Lambda {
                id: lambda_id,
                params: Vec::new(),
                body: Box::new(Node::Block(desugared_body)),
            },
        ],
        kwargs: Vec::new(),
    };
    Node::Assign {
        id: ids.next(),
        name,
        value: Box::new(call),
    }
}

/// `has @var is trait1 is trait2` -> `self.^add_ivar("var", [...traits])`.
fn desugar_has(name: String, traits: Vec<String>) -> Node {
    Node::UpCall {
        receiver: Box::new(Node::SelfExpr),
        method: "add_ivar".to_string(),
        args: vec![Node::Str(name), Node::ListLit(traits.into_iter().map(Node::Str).collect())],
        kwargs: Vec::new(),
    }
}
