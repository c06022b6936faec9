use super::parser::parse;
use crate::ast::Node;

fn parse_one(src: &str) -> Node {
    let (mut program, _ids) = parse(src).unwrap_or_else(|e| panic!("failed to parse `{src}`: {e}"));
    assert_eq!(program.len(), 1, "expected exactly one top-level statement in `{src}`");
    program.remove(0)
}

#[test]
fn integer_and_string_literals() {
    assert!(matches!(parse_one("3"), Node::Int(3)));
    assert!(matches!(parse_one(r#""hi""#), Node::Str(s) if s == "hi"));
}

#[test]
fn binary_operators_desugar_to_method_calls() {
    let node = parse_one("1 + 2");
    match node {
        Node::Call { method, args, .. } => {
            assert_eq!(method, "add");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected a Call node, got {other:?}"),
    }
}

#[test]
fn postfix_increment_desugars_to_self_add_assign() {
    let node = parse_one("a++");
    match node {
        Node::Assign { name, value, .. } => {
            assert_eq!(name, "a");
            assert!(matches!(*value, Node::Call { .. }));
        }
        other => panic!("expected an Assign node, got {other:?}"),
    }
}

#[test]
fn postfix_increment_rejects_non_variable_targets() {
    assert!(parse("3++").is_err());
}

#[test]
fn bare_call_is_invoke_not_implicit_self_dispatch() {
    let node = parse_one("a(1, 2)");
    match node {
        Node::Invoke { callee, args } => {
            assert!(matches!(*callee, Node::Variable { name, .. } if name == "a"));
            assert_eq!(args.len(), 2);
        }
        other => panic!("expected an Invoke node, got {other:?}"),
    }
}

#[test]
fn dotted_call_is_a_method_call_on_the_receiver() {
    let node = parse_one("recv.name(1)");
    match node {
        Node::Call { receiver, method, args, .. } => {
            assert!(matches!(*receiver, Node::Variable { name, .. } if name == "recv"));
            assert_eq!(method, "name");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected a Call node, got {other:?}"),
    }
}

#[test]
fn attribute_without_parens_is_a_zero_arg_call() {
    let node = parse_one("recv.name");
    assert!(matches!(node, Node::Attribute { .. }));
}

#[test]
fn up_call_is_caret_then_dot() {
    let node = parse_one("recv^.method(1)");
    match node {
        Node::UpCall { receiver, method, args, .. } => {
            assert!(matches!(*receiver, Node::Variable { name, .. } if name == "recv"));
            assert_eq!(method, "method");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected an UpCall node, got {other:?}"),
    }
}

#[test]
fn scoped_variable_read_and_write() {
    assert!(matches!(parse_one("$x"), Node::GetScoped(name) if name == "x"));
    assert!(matches!(parse_one("$x = 1"), Node::SetScoped(name, _) if name == "x"));
}

#[test]
fn ivar_read_and_write() {
    assert!(matches!(parse_one("@x"), Node::GetIvar(name) if name == "x"));
    assert!(matches!(parse_one("@x = 1"), Node::SetIvar(name, _) if name == "x"));
}

#[test]
fn map_literal_uses_percent_brace_not_mod_then_block() {
    assert!(matches!(parse_one("%{a: 1}"), Node::MapLit(pairs) if pairs.len() == 1));
}

#[test]
fn list_literal() {
    assert!(matches!(parse_one("[1, 2, 3]"), Node::ListLit(items) if items.len() == 3));
}

#[test]
fn lambda_literal_with_parenthesized_params() {
    let node = parse_one("(x, y) => { x }");
    assert!(matches!(node, Node::Lambda { params, .. } if params.len() == 2));
}

#[test]
fn lambda_literal_with_bare_single_param() {
    let node = parse_one("x => x + 3");
    match node {
        Node::Lambda { params, body, .. } => {
            assert_eq!(params.len(), 1);
            assert_eq!(params[0].0, "x");
            assert!(matches!(*body, Node::Call { .. }), "arrow body need not be a block");
        }
        other => panic!("expected a Lambda node, got {other:?}"),
    }
}

#[test]
fn lambda_literal_with_empty_parenthesized_params() {
    let node = parse_one("() => { x = 1; x }");
    assert!(matches!(node, Node::Lambda { params, .. } if params.is_empty()));
}

#[test]
fn parenthesized_expression_is_not_mistaken_for_a_lambda() {
    let node = parse_one("(1 + 2)");
    assert!(matches!(node, Node::Call { .. }));
}

#[test]
fn has_with_no_trait_clauses_has_an_empty_trait_list() {
    let node = parse_one("has @n");
    assert!(matches!(node, Node::Has { name, traits } if name == "n" && traits.is_empty()));
}

#[test]
fn has_parses_one_is_clause_per_trait() {
    let node = parse_one("has @n is Comparable is Hashable");
    match node {
        Node::Has { name, traits } => {
            assert_eq!(name, "n");
            assert_eq!(traits, vec!["Comparable".to_string(), "Hashable".to_string()]);
        }
        other => panic!("expected a Has node, got {other:?}"),
    }
}

#[test]
fn def_with_no_alias_clause_has_no_alias() {
    let node = parse_one("def add(other) { other }");
    assert!(matches!(node, Node::Definition { alias: None, .. }));
}

#[test]
fn def_parses_a_trailing_operator_alias_clause() {
    let node = parse_one(r#"def add(other) is "+" { other }"#);
    match node {
        Node::Definition { name, alias, .. } => {
            assert_eq!(name, "add");
            assert_eq!(alias, Some("+".to_string()));
        }
        other => panic!("expected a Definition node, got {other:?}"),
    }
}

#[test]
fn unterminated_string_is_a_syntax_error() {
    assert!(parse(r#""unterminated"#).is_err());
}

#[test]
fn unbalanced_braces_is_a_syntax_error() {
    assert!(parse("if true { 1").is_err());
}
