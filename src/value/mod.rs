//! The value representation shared by the VM, the runtime ontology and the
//! built-in method table.
//!
//! There's no garbage collector beyond the host's: heap objects are
//! reference-counted (`Ptr<T> = Rc<T>`), with interior mutability (`RefCell`)
//! where a kind is mutable (lists, maps, instance variables, refs). Cyclic
//! references (a class pointing at its metaclass, which points back at the
//! class) simply leak, same tradeoff the teacher's object graph makes.

pub mod class;
pub mod code;
pub mod lambda;
pub mod list;
pub mod map;
pub mod mirror;
pub mod native;
pub mod package;
pub mod str;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

pub use class::Class;
pub use code::{CallSite, Code, Instruction, Op};
pub use lambda::{Lambda, Ref};
pub use list::List;
pub use map::Map;
pub use mirror::{ClassMirror, ObjectMirror, PackageMirror};
pub use native::Native;
pub use package::Package;
pub use str::Str;

/// Shared, reference-counted heap pointer. No weak variant is used anywhere
/// in the ontology; cycles (class <-> metaclass) are accepted and never
/// collected, matching the single-threaded, host-managed memory model.
pub type Ptr<T> = Rc<T>;

/// Implemented by every heap-allocated object kind. `named_field` backs
/// attribute/method lookup (`recv.name`), `keyed_field`/`set_keyed_field`
/// back indexing (`recv[key]`).
pub trait Object: fmt::Debug + fmt::Display {
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    /// Only ever constructed on i64 overflow; see `runtime::builtins::int`.
    BigInt(i128),
    Str(Ptr<Str>),
    Object(Ptr<dyn Object>),
}

impl Value {
    pub fn object<T: Object + 'static>(obj: Ptr<T>) -> Value {
        Value::Object(obj as Ptr<dyn Object>)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&Ptr<Str>> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn downcast<T: Object + 'static>(&self) -> Option<Ptr<T>> {
        match self {
            Value::Object(obj) => {
                if obj.as_any().is::<T>() {
                    // SAFETY: downcasting an `Rc<dyn Object>` whose inner
                    // value is checked to be `T` via `Any`; the layout of
                    // `Rc` is the same regardless of the trait object we
                    // hold it as.
                    let raw = Rc::into_raw(obj.clone());
                    let typed = unsafe { Rc::from_raw(raw as *const T) };
                    Some(typed)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::BigInt(_) => "BigInt",
            Value::Str(_) => "String",
            Value::Object(obj) => obj.type_name(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(obj) => write!(f, "{obj:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{}", s.as_str()),
            Value::Object(obj) => write!(f, "{obj}"),
        }
    }
}
