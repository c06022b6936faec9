//! Black-box scenarios exercising the whole pipeline through `Kestrel`,
//! the way the teacher's own crate splits black-box coverage into a
//! top-level `tests/` suite separate from its in-module unit tests.

use kestrel::value::Value;
use kestrel::Kestrel;
use pretty_assertions::assert_eq;

fn eval_int(src: &str) -> i64 {
    let k = Kestrel::new();
    match k.eval(src) {
        Ok(v) => v.as_int().unwrap_or_else(|| panic!("`{src}` returned non-Int `{v:?}`")),
        Err(e) => panic!("`{src}` failed: {e}"),
    }
}

fn eval_str(src: &str) -> String {
    let k = Kestrel::new();
    match k.eval(src) {
        Ok(Value::Str(s)) => s.as_str().to_string(),
        Ok(v) => panic!("`{src}` returned non-String `{v:?}`"),
        Err(e) => panic!("`{src}` failed: {e}"),
    }
}

#[test]
fn scenario_1_integer_literal() {
    assert_eq!(eval_int("3"), 3);
}

#[test]
fn scenario_2_lambda_call_and_dispatch() {
    assert_eq!(eval_int("a = x => x + 3; a(4)"), 7);
}

#[test]
fn scenario_3_explicit_method_call() {
    assert_eq!(eval_int("3.add(4)"), 7);
}

#[test]
fn scenario_4_upcall_mirror_and_class_introspection() {
    assert_eq!(eval_str("3^.class().name()"), "I64");
}

#[test]
fn scenario_5_while_loop_and_increment() {
    assert_eq!(eval_int("a = 0; while a < 3 { a++ }; a"), 3);
}

#[test]
fn scenario_6_shared_ref_across_lambda_calls() {
    assert_eq!(eval_int("x = 0; f = () => { x = x + 1; x }; f(); f(); f(); x"), 3);
}

#[test]
fn scenario_7_class_definition_instance_and_dispatch() {
    let src = r#"
        class Greeter {
            def hi(name) { "hi " + name }
        }
        Greeter.new().hi("a")
    "#;
    assert_eq!(eval_str(src), "hi a");
}

#[test]
fn scenario_8_ivar_wiring_end_to_end() {
    let src = r#"
        class Counter {
            has @n
            def set_n(v) { @n = v }
            def get_n() { @n }
        }
        c = Counter.new();
        c.set_n(5);
        c.get_n()
    "#;
    assert_eq!(eval_int(src), 5);
}

#[test]
fn scenario_8b_missing_ivar_is_a_type_error_not_a_panic() {
    let src = r#"
        class Empty { }
        class Other { has @n def get_n() { @n } }
        e = Empty.new();
        e.class()
    "#;
    // Sanity: a class with no declared ivars still constructs and dispatches
    // fine; the interesting failure (referencing an undeclared ivar) is
    // covered by the `vm`/`runtime` unit tests alongside `ivar_index`.
    let k = Kestrel::new();
    assert!(k.eval(src).is_ok());
}

#[test]
fn scenario_8c_def_operator_alias_registers_a_second_dispatchable_name() {
    let src = r#"
        class Box {
            has @v
            def set(v) { @v = v }
            def add(other) is "plus" { @v + other }
        }
        b = Box.new();
        b.set(10);
        b.plus(5)
    "#;
    assert_eq!(eval_int(src), 15);
}

#[test]
fn scenario_9_top_level_def_dispatches_via_package_mirror() {
    let src = r#"
        def greet() { "hello from top level" }
        self.greet()
    "#;
    assert_eq!(eval_str(src), "hello from top level");
}

#[test]
fn scenario_10_def_method_closes_over_an_outer_variable() {
    // Regression test: a `def`'s body is a lambda literal evaluated as the
    // argument to `add_method` the moment the `def` itself runs, so it must
    // capture `base` the same way a bare lambda would — the method's
    // `Ref` to `base` has to survive from definition time to every future
    // dispatch, not just the first one.
    let src = r#"
        base = 10;
        def add_base(v) { v + base };
        self.add_base(1) + self.add_base(2)
    "#;
    assert_eq!(eval_int(src), 23);
}

#[test]
fn front_end_round_trip_booleans_and_nil() {
    let k = Kestrel::new();
    assert!(matches!(k.eval("true").unwrap(), Value::Bool(true)));
    assert!(matches!(k.eval("false").unwrap(), Value::Bool(false)));
    assert!(matches!(k.eval("nil").unwrap(), Value::Nil));
}

#[test]
fn front_end_round_trip_conditionals() {
    assert_eq!(eval_int("if 1.lt(2) { 10 } else { 20 }"), 10);
    assert_eq!(eval_int("if 2.lt(1) { 10 } else { 20 }"), 20);
    let k = Kestrel::new();
    assert!(matches!(k.eval("if false { 10 }").unwrap(), Value::Nil));
}

#[test]
fn list_and_map_literals_round_trip() {
    assert_eq!(eval_int("[1, 2, 3].len()"), 3);
    assert_eq!(eval_int("%{a: 1, b: 2}.len()"), 2);
}

#[test]
fn string_concatenation_and_length() {
    assert_eq!(eval_str(r#""foo" + "bar""#), "foobar");
    assert_eq!(eval_int(r#""hello".len()"#), 5);
}

#[test]
fn arity_mismatch_is_a_recoverable_error_not_a_panic() {
    let k = Kestrel::new();
    let err = k.eval("3.add()").unwrap_err();
    assert!(!err.is_panic());
}

#[test]
fn extra_positional_arguments_beyond_required_are_tolerated() {
    // `Arity::matches` checks `got >= required`, not `got == required`:
    // supplying more arguments than a method requires is not an arity
    // error, mirroring the distilled spec's "if len(args) < required" rule.
    assert_eq!(eval_int("3.add(4, 5)"), 7);
}

#[test]
fn unknown_method_is_a_recoverable_error() {
    let k = Kestrel::new();
    let err = k.eval("3.frobnicate()").unwrap_err();
    assert!(!err.is_panic());
}

#[test]
fn check_parses_without_running() {
    let k = Kestrel::new();
    assert!(k.check("a = 1; a + 2").is_ok());
    assert!(k.check("a = (").is_err());
}
