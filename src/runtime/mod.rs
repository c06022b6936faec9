//! The runtime ontology: the fixed set of built-in classes, and the boot
//! sequence that wires them together before any user code runs.
//!
//! Boot order matters because later classes reference earlier ones
//! (`Integer`'s superclass is `Object`, `I64`'s superclass is `Integer`,
//! and so on) and because a class object needs `Class` itself to exist
//! before it can be considered an instance of anything:
//!
//! `Object -> Class -> Bool/Nil/Integer/I64/BigInt -> String/ObjectMirror/
//! ClassMirror/PackageMirror/Package/Lambda/List/IO/Map -> built-in
//! methods -> fallback resolve`.

pub mod builtins;
pub mod io;
pub mod loader;

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::scoped_env::ScopedEnv;
use crate::value::mirror::{build_mirror_dispatcher, CondDispatcher};
use crate::value::{Class, Code, Lambda, List, Map, Native, Package, Ptr, Str, Value};

pub struct Runtime {
    pub interner: Str_interner,
    pub classes: RefCell<IndexMap<String, Ptr<Class>>>,
    pub packages: RefCell<IndexMap<String, Ptr<Package>>>,
    mirror_dispatcher: CondDispatcher<Value>,
}

/// Just a named alias so `Runtime.interner`'s type shows up clearly in
/// stack traces / debug output without importing `value::str::Interner`
/// under two different names.
pub type Str_interner = crate::value::str::Interner;

impl Runtime {
    pub fn class(&self, name: &str) -> Ptr<Class> {
        self.classes
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("boot invariant violated: class `{name}` missing"))
    }

    pub fn try_class(&self, name: &str) -> Option<Ptr<Class>> {
        self.classes.borrow().get(name).cloned()
    }

    pub fn define_class(&self, name: &str, superclass: Option<Ptr<Class>>) -> Ptr<Class> {
        let class = Class::new(name, superclass);
        self.classes.borrow_mut().insert(name.to_string(), class.clone());
        class
    }

    pub fn intern(&self, s: &str) -> Ptr<Str> {
        self.interner.intern(s)
    }

    pub fn mirror_of(&self, v: &Value) -> Value {
        self.mirror_dispatcher.dispatch(v)
    }

    /// Every value carries a class, computed structurally for the scalar
    /// kinds and read off the object for heap values.
    pub fn class_of(&self, v: &Value) -> Ptr<Class> {
        match v {
            Value::Nil => self.class("Nil"),
            Value::Bool(_) => self.class("Bool"),
            Value::Int(_) => self.class("I64"),
            Value::BigInt(_) => self.class("BigInt"),
            Value::Str(_) => self.class("String"),
            Value::Object(obj) => {
                if let Some(class) = v.downcast::<Class>() {
                    return class.metaclass_or_self();
                }
                if let Some(native) = v.downcast::<Native>() {
                    return native.class.clone();
                }
                if v.downcast::<List>().is_some() {
                    return self.class("List");
                }
                if v.downcast::<Map>().is_some() {
                    return self.class("Map");
                }
                if v.downcast::<Lambda>().is_some() {
                    return self.class("Lambda");
                }
                if v.downcast::<Code>().is_some() {
                    return self.class("Code");
                }
                if let Some(pkg) = v.downcast::<Package>() {
                    return pkg.singleton_class.clone();
                }
                if v.downcast::<crate::value::ObjectMirror>().is_some() {
                    return self.class("ObjectMirror");
                }
                if v.downcast::<crate::value::ClassMirror>().is_some() {
                    return self.class("ClassMirror");
                }
                if v.downcast::<crate::value::PackageMirror>().is_some() {
                    return self.class("PackageMirror");
                }
                if v.downcast::<io::Io>().is_some() {
                    return self.class("IO");
                }
                let _ = obj;
                self.class("Object")
            }
        }
    }

    pub fn resolve_method(&self, v: &Value, name: &str) -> Option<(Ptr<Class>, Ptr<crate::value::class::Method>)> {
        let class = self.class_of(v);
        if let Some(found) = class.resolve(name) {
            return Some(found);
        }
        // Fallback resolve: every class ultimately answers `Object`'s
        // catch-all, e.g. for reflective `respond_to`/`inspect`-style
        // probing; kept last in boot order deliberately.
        self.class("Object").resolve(name)
    }
}

impl Class {
    /// Lazily builds and splices in this class's metaclass the first time
    /// it's needed, per the boot-order note in `boot()`: a fresh anonymous
    /// class flagged `is_metaclass`, parented to the superclass's metaclass
    /// (or plain `Class` for a root). `Object` and `Class` get theirs wired
    /// explicitly at boot, so this only ever fires for user/library classes.
    pub fn metaclass_or_self(self: &Ptr<Class>) -> Ptr<Class> {
        if let Some(m) = self.metaclass.borrow().clone() {
            return m;
        }
        let parent_meta = match self.superclass.borrow().clone() {
            Some(sup) => sup.metaclass_or_self(),
            None => self.clone(),
        };
        let m = Class::new_metaclass(format!("#<Class:{}>", self.name), Some(parent_meta));
        *self.metaclass.borrow_mut() = Some(m.clone());
        m
    }
}

pub fn boot() -> Runtime {
    let rt = Runtime {
        interner: Str_interner::new(),
        classes: RefCell::new(IndexMap::new()),
        packages: RefCell::new(IndexMap::new()),
        mirror_dispatcher: build_mirror_dispatcher(),
    };

    let object = rt.define_class("Object", None);
    let class_class = rt.define_class("Class", Some(object.clone()));

    // Every class's metaclass chains up to Class's own metaclass, which is
    // a metaclass of Class itself — this is the one designed cycle in the
    // ontology and is never walked by `resolve`, only by `metaclass_or_self`.
    let class_meta = Class::new_metaclass("#<Class:Class>", Some(class_class.clone()));
    *class_class.metaclass.borrow_mut() = Some(class_meta.clone());
    *object.metaclass.borrow_mut() = Some(Class::new_metaclass("#<Class:Object>", Some(class_meta)));

    let bool_class = rt.define_class("Bool", Some(object.clone()));
    let nil_class = rt.define_class("Nil", Some(object.clone()));
    let integer_class = rt.define_class("Integer", Some(object.clone()));
    let i64_class = rt.define_class("I64", Some(integer_class.clone()));
    let bigint_class = rt.define_class("BigInt", Some(integer_class));

    let string_class = rt.define_class("String", Some(object.clone()));
    rt.define_class("ObjectMirror", Some(object.clone()));
    rt.define_class("ClassMirror", Some(object.clone()));
    rt.define_class("PackageMirror", Some(object.clone()));
    let package_class = rt.define_class("Package", Some(object.clone()));
    let lambda_class = rt.define_class("Lambda", Some(object.clone()));
    let list_class = rt.define_class("List", Some(object.clone()));
    let io_class = rt.define_class("IO", Some(object.clone()));
    let map_class = rt.define_class("Map", Some(object.clone()));
    rt.define_class("Code", Some(object.clone()));
    rt.define_class("Loader", Some(object));

    builtins::install(&rt);

    let io_pkg = Package::new("io", package_class.clone());
    io_pkg.export("stdout", Value::object(Ptr::new(io::Io)));
    rt.packages.borrow_mut().insert("io".to_string(), Ptr::new(io_pkg));

    let _ = (bool_class, nil_class, i64_class, bigint_class, string_class, lambda_class, list_class, io_class, map_class);
    tracing::debug!(classes = rt.classes.borrow().len(), packages = rt.packages.borrow().len(), "runtime booted");
    rt
}

pub struct Interpreter {
    pub rt: Runtime,
    pub scoped: RefCell<ScopedEnv>,
}

impl Interpreter {
    pub fn new() -> Self {
        let rt = boot();
        let scoped = ScopedEnv::Empty.set("LOADER", Value::object(Ptr::new(loader::Loader)));
        Interpreter {
            rt,
            scoped: RefCell::new(scoped),
        }
    }

    pub fn get_scoped(&self, name: &str) -> Result<Value> {
        self.scoped
            .borrow()
            .get(name)
            .ok_or_else(|| Error::UnknownScopedVariable(name.to_string()))
    }

    pub fn set_scoped(&self, name: &str, value: Value) {
        let new_env = self.scoped.borrow().set(name, value);
        *self.scoped.borrow_mut() = new_env;
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

pub type Classes = HashMap<String, Ptr<Class>>;
