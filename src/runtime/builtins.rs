//! Installs the native method tables for every built-in class, the last
//! step of the boot sequence.

use super::Runtime;
use crate::error::Error;
use crate::value::code::Arity;
use crate::value::list::to_index;
use crate::value::{Class, ClassMirror, Lambda, List, Map, PackageMirror, Ptr, Str, Value};

fn recv(args: &[Value]) -> &Value {
    &args[0]
}

fn want_int(v: &Value) -> crate::error::Result<i64> {
    v.as_int()
        .ok_or_else(|| Error::type_error(format!("`{v}` is not an Int")))
}

fn want_str(v: &Value) -> crate::error::Result<Ptr<Str>> {
    v.as_str()
        .cloned()
        .ok_or_else(|| Error::type_error(format!("`{v}` is not a String")))
}

fn want_lambda(v: &Value) -> crate::error::Result<Ptr<Lambda>> {
    v.downcast::<Lambda>()
        .ok_or_else(|| Error::type_error(format!("`{v}` is not a Lambda")))
}

pub fn install(rt: &Runtime) {
    install_object(rt);
    install_bool(rt);
    install_nil(rt);
    install_integer(rt);
    install_string(rt);
    install_list(rt);
    install_map(rt);
    install_io(rt);
    install_class(rt);
    install_lambda(rt);
    install_object_mirror(rt);
    install_class_mirror(rt);
    install_package_mirror(rt);
    install_loader(rt);
}

fn install_object(rt: &Runtime) {
    let object = rt.class("Object");
    object.define_native("==", Arity::fixed(1), |_interp, args| {
        Ok(Value::Bool(crate::value::map::values_equal(recv(args), &args[1])))
    });
    object.define_native("!=", Arity::fixed(1), |_interp, args| {
        Ok(Value::Bool(!crate::value::map::values_equal(recv(args), &args[1])))
    });
    object.define_native("class", Arity::fixed(0), |interp, args| {
        Ok(Value::object(interp.rt.class_of(recv(args))))
    });
    object.define_native("inspect", Arity::fixed(0), |_interp, args| {
        Ok(Value::object(Ptr::new(Str::owned(format!("{:?}", recv(args))))))
    });
    object.define_native("to_s", Arity::fixed(0), |_interp, args| {
        Ok(Value::object(Ptr::new(Str::owned(recv(args).to_string()))))
    });
}

fn install_bool(rt: &Runtime) {
    let bool_class = rt.class("Bool");
    bool_class.define_native("!", Arity::fixed(0), |_interp, args| Ok(Value::Bool(!recv(args).is_truthy())));
    bool_class.define_native("&&", Arity::fixed(1), |_interp, args| {
        Ok(Value::Bool(recv(args).is_truthy() && args[1].is_truthy()))
    });
    bool_class.define_native("||", Arity::fixed(1), |_interp, args| {
        Ok(Value::Bool(recv(args).is_truthy() || args[1].is_truthy()))
    });
}

fn install_nil(rt: &Runtime) {
    let nil_class = rt.class("Nil");
    nil_class.define_native("to_s", Arity::fixed(0), |_interp, _args| Ok(Value::object(Ptr::new(Str::owned("nil")))));
}

macro_rules! int_binop {
    ($class:expr, $name:expr, |$a:ident, $b:ident| $body:expr) => {
        $class.define_native($name, Arity::fixed(1), |_interp, args| {
            let $a = want_int(recv(args))?;
            let $b = want_int(&args[1])?;
            $body
        });
    };
}

fn install_integer(rt: &Runtime) {
    let i64_class = rt.class("I64");
    // Overflow-checked arithmetic: promote to `BigInt` rather than wrap.
    i64_class.define_native("add", Arity::fixed(1), |_interp, args| {
        let a = want_int(recv(args))?;
        let b = want_int(&args[1])?;
        Ok(match a.checked_add(b) {
            Some(v) => Value::Int(v),
            None => Value::BigInt(a as i128 + b as i128),
        })
    });
    i64_class.define_native("sub", Arity::fixed(1), |_interp, args| {
        let a = want_int(recv(args))?;
        let b = want_int(&args[1])?;
        Ok(match a.checked_sub(b) {
            Some(v) => Value::Int(v),
            None => Value::BigInt(a as i128 - b as i128),
        })
    });
    i64_class.define_native("mul", Arity::fixed(1), |_interp, args| {
        let a = want_int(recv(args))?;
        let b = want_int(&args[1])?;
        Ok(match a.checked_mul(b) {
            Some(v) => Value::Int(v),
            None => Value::BigInt(a as i128 * b as i128),
        })
    });
    i64_class.define_native("div", Arity::fixed(1), |_interp, args| {
        let a = want_int(recv(args))?;
        let b = want_int(&args[1])?;
        if b == 0 {
            return Err(Error::type_error("division by zero"));
        }
        Ok(Value::Int(a / b))
    });
    i64_class.define_native("mod", Arity::fixed(1), |_interp, args| {
        let a = want_int(recv(args))?;
        let b = want_int(&args[1])?;
        if b == 0 {
            return Err(Error::type_error("division by zero"));
        }
        Ok(Value::Int(a % b))
    });
    int_binop!(i64_class, "lt", |a, b| Ok(Value::Bool(a < b)));
    int_binop!(i64_class, "gt", |a, b| Ok(Value::Bool(a > b)));
    int_binop!(i64_class, "lte", |a, b| Ok(Value::Bool(a <= b)));
    int_binop!(i64_class, "gte", |a, b| Ok(Value::Bool(a >= b)));
    i64_class.define_native("to_s", Arity::fixed(0), |_interp, args| {
        Ok(Value::object(Ptr::new(Str::owned(recv(args).to_string()))))
    });
    i64_class.define_native("neg", Arity::fixed(0), |_interp, args| Ok(Value::Int(-want_int(recv(args))?)));
}

fn install_string(rt: &Runtime) {
    let string_class = rt.class("String");
    string_class.define_native("add", Arity::fixed(1), |_interp, args| {
        let a = want_str(recv(args))?;
        let b = want_str(&args[1])?;
        Ok(Value::object(Ptr::new(Str::owned(format!("{}{}", a.as_str(), b.as_str())))))
    });
    string_class.define_native("len", Arity::fixed(0), |_interp, args| {
        let s = want_str(recv(args))?;
        Ok(Value::Int(s.as_str().chars().count() as i64))
    });
    string_class.define_native("to_s", Arity::fixed(0), |_interp, args| Ok(recv(args).clone()));
}

fn install_list(rt: &Runtime) {
    let list_class = rt.class("List");
    list_class.define_native("len", Arity::fixed(0), |_interp, args| {
        let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
        Ok(Value::Int(l.len() as i64))
    });
    list_class.define_native("is_empty", Arity::fixed(0), |_interp, args| {
        let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
        Ok(Value::Bool(l.is_empty()))
    });
    for alias in ["push", "append", "<<"] {
        list_class.define_native(alias, Arity::fixed(1), |_interp, args| {
            let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
            l.push(args[1].clone());
            Ok(recv(args).clone())
        });
    }
    list_class.define_native("pop", Arity::fixed(0), |_interp, args| {
        let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
        Ok(l.pop().unwrap_or(Value::Nil))
    });
    list_class.define_native("get", Arity::fixed(1), |_interp, args| {
        let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
        let idx = to_index(&args[1], l.len())?;
        Ok(l.get(idx).unwrap_or(Value::Nil))
    });
    list_class.define_native("set", Arity::fixed(2), |_interp, args| {
        let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
        let idx = to_index(&args[1], l.len())?;
        if !l.set(idx, args[2].clone()) {
            return Err(Error::type_error(format!("index `{idx}` out of bounds")));
        }
        Ok(Value::Nil)
    });
    list_class.define_native("join", Arity::fixed(1), |_interp, args| {
        let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
        let sep = want_str(&args[1])?;
        Ok(Value::object(Ptr::new(Str::owned(
            l.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(sep.as_str()),
        ))))
    });
    list_class.define_native("each", Arity::fixed(1), |interp, args| {
        let l = recv(args).downcast::<List>().ok_or_else(|| Error::type_error("not a List"))?;
        let f = want_lambda(&args[1])?;
        for item in l.iter() {
            crate::value::class::arity_check("<each block>", f.code.arity, 1)?;
            let recv_value = f.receiver.clone().unwrap_or(Value::Nil);
            crate::vm::call_code(interp, &f.code, recv_value, f.refs.clone(), &[item])?;
        }
        Ok(Value::Nil)
    });
}

fn install_map(rt: &Runtime) {
    let map_class = rt.class("Map");
    map_class.define_native("len", Arity::fixed(0), |_interp, args| {
        let m = recv(args).downcast::<Map>().ok_or_else(|| Error::type_error("not a Map"))?;
        Ok(Value::Int(m.len() as i64))
    });
    map_class.define_native("get", Arity::fixed(1), |_interp, args| {
        let m = recv(args).downcast::<Map>().ok_or_else(|| Error::type_error("not a Map"))?;
        Ok(m.get(&args[1]).unwrap_or(Value::Nil))
    });
    map_class.define_native("set", Arity::fixed(2), |_interp, args| {
        let m = recv(args).downcast::<Map>().ok_or_else(|| Error::type_error("not a Map"))?;
        m.set(args[1].clone(), args[2].clone());
        Ok(Value::Nil)
    });
    map_class.define_native("del", Arity::fixed(1), |_interp, args| {
        let m = recv(args).downcast::<Map>().ok_or_else(|| Error::type_error("not a Map"))?;
        Ok(m.remove(&args[1]).unwrap_or(Value::Nil))
    });
}

fn install_io(rt: &Runtime) {
    let io_class = rt.class("IO");
    io_class.define_native("print", Arity::VARIADIC, |_interp, args| {
        let parts: Vec<String> = args[1..].iter().map(|v| v.to_string()).collect();
        print!("{}", parts.join(" "));
        Ok(Value::Nil)
    });
    io_class.define_native("puts", Arity::VARIADIC, |_interp, args| {
        let parts: Vec<String> = args[1..].iter().map(|v| v.to_string()).collect();
        println!("{}", parts.join(" "));
        Ok(Value::Nil)
    });
}

fn install_class(rt: &Runtime) {
    let class_class = rt.class("Class");
    class_class.define_native("name", Arity::fixed(0), |_interp, args| {
        let c = recv(args).downcast::<Class>().ok_or_else(|| Error::type_error("not a Class"))?;
        Ok(Value::object(Ptr::new(Str::owned(c.name.clone()))))
    });
    class_class.define_native("new", Arity::VARIADIC, |_interp, args| {
        let c = recv(args).downcast::<Class>().ok_or_else(|| Error::type_error("not a Class"))?;
        Ok(Value::object(Ptr::new(crate::value::Native::new(c))))
    });
}

fn install_lambda(rt: &Runtime) {
    let lambda_class = rt.class("Lambda");
    lambda_class.define_native("arity", Arity::fixed(0), |_interp, args| {
        let f = want_lambda(recv(args))?;
        Ok(Value::Int(f.code.num_params as i64))
    });
}

fn install_object_mirror(rt: &Runtime) {
    let m = rt.class("ObjectMirror");
    m.define_native("class", Arity::fixed(0), |interp, args| {
        let om = recv(args)
            .downcast::<crate::value::ObjectMirror>()
            .ok_or_else(|| Error::type_error("not an ObjectMirror"))?;
        Ok(Value::object(interp.rt.class_of(&om.target)))
    });
}

/// `self.^add_method`/`add_class`/`add_ivar`/`alias_method` land here: the
/// desugared forms of `def`, `class`, and `has` inside a class body.
fn install_class_mirror(rt: &Runtime) {
    let m = rt.class("ClassMirror");
    m.define_native("add_method", Arity::fixed(2), |_interp, args| {
        let cm = recv(args).downcast::<ClassMirror>().ok_or_else(|| Error::type_error("not a ClassMirror"))?;
        let name = want_str(&args[1])?;
        let f = want_lambda(&args[2])?;
        tracing::debug!(class = cm.target.name.as_str(), method = name.as_str(), "add_method");
        cm.target.define_bytecode(name.as_str(), Arity::fixed(f.code.num_params), f.clone());
        Ok(Value::Nil)
    });
    m.define_native("add_ivar", Arity::fixed(2), |_interp, args| {
        let cm = recv(args).downcast::<ClassMirror>().ok_or_else(|| Error::type_error("not a ClassMirror"))?;
        let name = want_str(&args[1])?;
        // `args[2]` carries the `is trait1 is trait2` list; traits have no
        // runtime effect of their own here, so the list is accepted and
        // not stored.
        tracing::debug!(class = cm.target.name.as_str(), ivar = name.as_str(), "add_ivar");
        cm.target.declare_ivar(name.as_str());
        Ok(Value::Nil)
    });
    m.define_native("alias_method", Arity::fixed(2), |_interp, args| {
        let cm = recv(args).downcast::<ClassMirror>().ok_or_else(|| Error::type_error("not a ClassMirror"))?;
        let existing = want_str(&args[1])?;
        let alias = want_str(&args[2])?;
        let method = cm
            .target
            .methods
            .borrow()
            .get(existing.as_str())
            .cloned()
            .ok_or_else(|| Error::unknown_method(cm.target.name.clone(), existing.to_string()))?;
        cm.target.methods.borrow_mut().insert(alias.to_string(), method);
        Ok(Value::Nil)
    });
}

fn install_package_mirror(rt: &Runtime) {
    let m = rt.class("PackageMirror");
    m.define_native("add_method", Arity::fixed(2), |_interp, args| {
        let pm = recv(args).downcast::<PackageMirror>().ok_or_else(|| Error::type_error("not a PackageMirror"))?;
        let name = want_str(&args[1])?;
        let f = want_lambda(&args[2])?;
        pm.target
            .singleton_class
            .define_bytecode(name.as_str(), Arity::fixed(f.code.num_params), f.clone());
        Ok(Value::Nil)
    });
    m.define_native("add_class", Arity::fixed(3), |interp, args| {
        // Downcast only to confirm the receiver kind; the new class is
        // registered globally and reached afterward via the desugared
        // assignment (`Name = self.^add_class(...)`), not through the
        // package struct itself.
        let _pm = recv(args).downcast::<PackageMirror>().ok_or_else(|| Error::type_error("not a PackageMirror"))?;
        let name = want_str(&args[1])?;
        let superclass = match &args[2] {
            Value::Nil => interp.rt.class("Object"),
            Value::Str(s) => interp
                .rt
                .try_class(s.as_str())
                .ok_or_else(|| Error::type_error(format!("unknown superclass `{s}`")))?,
            other => return Err(Error::type_error(format!("`{other}` is not a superclass name"))),
        };
        let f = want_lambda(&args[3])?;
        let class = interp.rt.define_class(name.as_str(), Some(superclass));
        crate::vm::call_code(interp, &f.code, Value::object(class.clone()), f.refs.clone(), &[])?;
        Ok(Value::object(class))
    });
}

fn install_loader(rt: &Runtime) {
    let loader = rt.class("Loader");
    loader.define_native("import", Arity::fixed(1), |interp, args| {
        let path = want_str(&args[1])?;
        let pkg = interp
            .rt
            .packages
            .borrow()
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| Error::type_error(format!("unknown package `{path}`")))?;
        Ok(Value::object(pkg))
    });
    loader.define_native("import_relative", Arity::fixed(1), |interp, args| {
        // No on-disk package tree is modeled; relative imports resolve
        // against the same flat package table as absolute ones.
        let path = want_str(&args[1])?;
        let pkg = interp
            .rt
            .packages
            .borrow()
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| Error::type_error(format!("unknown package `{path}`")))?;
        Ok(Value::object(pkg))
    });
}
