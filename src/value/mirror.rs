//! Mirrors and the open-method dispatcher that picks which kind of mirror
//! a value gets.
//!
//! `CondDispatcher` is the same small "ordered predicate, ordered impl,
//! final fallback" pattern the reference runtime uses for up-call
//! resolution: rather than a closed `match`, mirror construction is a list
//! of `(predicate, constructor)` pairs tried in order, falling back to a
//! plain object mirror. This keeps `GetMirror` open to new receiver kinds
//! (class, package, ...) without touching the VM's dispatch loop.

use std::any::Any;
use std::fmt;

use super::{Class, Object, Package, Ptr, Value};

pub struct CondDispatcher<T> {
    conditions: Vec<(Box<dyn Fn(&Value) -> bool>, Box<dyn Fn(&Value) -> T>)>,
    fallback: Box<dyn Fn(&Value) -> T>,
}

impl<T> CondDispatcher<T> {
    pub fn new(fallback: impl Fn(&Value) -> T + 'static) -> Self {
        CondDispatcher {
            conditions: Vec::new(),
            fallback: Box::new(fallback),
        }
    }

    pub fn add(
        &mut self,
        cond: impl Fn(&Value) -> bool + 'static,
        ctor: impl Fn(&Value) -> T + 'static,
    ) {
        self.conditions.push((Box::new(cond), Box::new(ctor)));
    }

    pub fn dispatch(&self, v: &Value) -> T {
        for (cond, ctor) in &self.conditions {
            if cond(v) {
                return ctor(v);
            }
        }
        (self.fallback)(v)
    }
}

pub struct ObjectMirror {
    pub target: Value,
}

impl fmt::Debug for ObjectMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectMirror({:?})", self.target)
    }
}
impl fmt::Display for ObjectMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<mirror {}>", self.target.type_name())
    }
}
impl Object for ObjectMirror {
    fn type_name(&self) -> &'static str {
        "ObjectMirror"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct ClassMirror {
    pub target: Ptr<Class>,
}

impl fmt::Debug for ClassMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassMirror({})", self.target.name)
    }
}
impl fmt::Display for ClassMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<mirror class {}>", self.target.name)
    }
}
impl Object for ClassMirror {
    fn type_name(&self) -> &'static str {
        "ClassMirror"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct PackageMirror {
    pub target: Ptr<Package>,
}

impl fmt::Debug for PackageMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageMirror({})", self.target.name)
    }
}
impl fmt::Display for PackageMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<mirror package {}>", self.target.name)
    }
}
impl Object for PackageMirror {
    fn type_name(&self) -> &'static str {
        "PackageMirror"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds the dispatcher used by `GetMirror`: classes get a `ClassMirror`,
/// packages get a `PackageMirror`, everything else an `ObjectMirror`.
pub fn build_mirror_dispatcher() -> CondDispatcher<Value> {
    let mut d = CondDispatcher::new(|v| Value::object(Ptr::new(ObjectMirror { target: v.clone() })));
    d.add(
        |v| v.downcast::<Class>().is_some(),
        |v| Value::object(Ptr::new(ClassMirror { target: v.downcast::<Class>().unwrap() })),
    );
    d.add(
        |v| v.downcast::<Package>().is_some(),
        |v| Value::object(Ptr::new(PackageMirror { target: v.downcast::<Package>().unwrap() })),
    );
    d
}
