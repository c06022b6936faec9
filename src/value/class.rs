//! Classes, methods and the metaclass machinery.
//!
//! Every class has a metaclass (its "singleton class"), allocated lazily the
//! first time a class-level method needs somewhere to live. A metaclass's
//! own class is the metaclass of its class's superclass, terminating at
//! `Class`'s metaclass, whose class is `Class` itself. `TrueClass`'s
//! ancestor walk simply skips any class flagged as a metaclass, so normal
//! method resolution never has to know metaclasses exist.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;

use super::code::Arity;
use super::{Lambda, Object, Ptr, Str, Value};
use crate::error::Result;
use crate::vm::NativeFn;

pub enum MethodImpl {
    Native(NativeFn),
    /// A method defined by `def`: the whole `Lambda` is kept, not just its
    /// `Code`, so that a method body capturing a variable from the scope
    /// the `def`/`add_method` call itself ran in (a class body, a
    /// top-level program) keeps that capture's `Ref` cells alive across
    /// every future dispatch of the method.
    Bytecode(Ptr<Lambda>),
}

pub struct Method {
    pub name: Ptr<Str>,
    pub arity: Arity,
    pub imp: MethodImpl,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({})", self.name)
    }
}

pub struct Class {
    pub name: String,
    pub superclass: RefCell<Option<Ptr<Class>>>,
    pub methods: RefCell<IndexMap<String, Ptr<Method>>>,
    pub ivars: RefCell<Vec<String>>,
    pub metaclass: RefCell<Option<Ptr<Class>>>,
    pub is_metaclass: bool,
}

impl Class {
    pub fn new(name: impl Into<String>, superclass: Option<Ptr<Class>>) -> Ptr<Class> {
        Ptr::new(Class {
            name: name.into(),
            superclass: RefCell::new(superclass),
            methods: RefCell::new(IndexMap::new()),
            ivars: RefCell::new(Vec::new()),
            metaclass: RefCell::new(None),
            is_metaclass: false,
        })
    }

    pub fn new_metaclass(name: impl Into<String>, superclass: Option<Ptr<Class>>) -> Ptr<Class> {
        Ptr::new(Class {
            name: name.into(),
            superclass: RefCell::new(superclass),
            methods: RefCell::new(IndexMap::new()),
            ivars: RefCell::new(Vec::new()),
            metaclass: RefCell::new(None),
            is_metaclass: true,
        })
    }

    pub fn define_native(&self, name: &str, arity: Arity, f: NativeFn) {
        self.methods.borrow_mut().insert(
            name.to_string(),
            Ptr::new(Method {
                name: Ptr::new(Str::owned(name.to_string())),
                arity,
                imp: MethodImpl::Native(f),
            }),
        );
    }

    pub fn define_bytecode(&self, name: &str, arity: Arity, lambda: Ptr<Lambda>) {
        self.methods.borrow_mut().insert(
            name.to_string(),
            Ptr::new(Method {
                name: Ptr::new(Str::owned(name.to_string())),
                arity,
                imp: MethodImpl::Bytecode(lambda),
            }),
        );
    }

    pub fn declare_ivar(&self, name: impl Into<String>) {
        self.ivars.borrow_mut().push(name.into());
    }

    /// Walk `self` and its ancestors looking for `name`, returning the
    /// defining class alongside the method. The `is_metaclass` flag only
    /// affects how `class_of` presents a value's user-visible class, not
    /// method resolution order — a metaclass's own method table (where
    /// class-level methods like `new` live) must still be searched.
    pub fn resolve(self: &Ptr<Class>, name: &str) -> Option<(Ptr<Class>, Ptr<Method>)> {
        let mut cur = Some(self.clone());
        while let Some(c) = cur {
            if let Some(m) = c.methods.borrow().get(name) {
                return Some((c.clone(), m.clone()));
            }
            cur = c.superclass.borrow().clone();
        }
        None
    }

    pub fn is_subclass_of(self: &Ptr<Class>, other: &Ptr<Class>) -> bool {
        let mut cur = Some(self.clone());
        while let Some(c) = cur {
            if Ptr::ptr_eq(&c, other) {
                return true;
            }
            cur = c.superclass.borrow().clone();
        }
        false
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.name)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Object for Class {
    fn type_name(&self) -> &'static str {
        "Class"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn arity_check(method_name: &str, arity: Arity, got: usize) -> Result<()> {
    if arity.matches(got) {
        Ok(())
    } else {
        Err(crate::error::Error::arity(
            method_name,
            if arity.required < 0 {
                "any".to_string()
            } else {
                arity.required.to_string()
            },
            got,
        ))
    }
}

pub type ArgSlice<'a> = &'a [Value];
