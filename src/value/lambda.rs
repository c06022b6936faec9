use std::any::Any;
use std::cell::RefCell;
use std::fmt;

use super::{Code, Object, Ptr, Value};

/// A single mutable heap slot, the unit of variable capture. Plain locals
/// live directly in a frame's register file; the moment the scope analyzer
/// sees a variable read or written across a lambda boundary, every access
/// to it — including ones that precede the lambda syntactically — goes
/// through a `Ref` instead.
#[derive(Debug, Default)]
pub struct Ref {
    pub slot: RefCell<Value>,
}

impl Ref {
    pub fn new(value: Value) -> Ptr<Ref> {
        Ptr::new(Ref {
            slot: RefCell::new(value),
        })
    }

    pub fn get(&self) -> Value {
        self.slot.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.slot.borrow_mut() = value;
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

/// A closure: a `Code` paired with the `Ref` cells it captured at creation
/// time, in the order its `Code::num_refs` expects them.
pub struct Lambda {
    pub code: Ptr<Code>,
    pub refs: Vec<Ptr<Ref>>,
    pub receiver: Option<Value>,
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lambda({})", self.code.name)
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<lambda {}>", self.code.name)
    }
}

impl Object for Lambda {
    fn type_name(&self) -> &'static str {
        "Lambda"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
