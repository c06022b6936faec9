use std::any::Any;
use std::cell::RefCell;
use std::fmt;

use super::{Class, Object, Ptr, Value};

/// An instance of a user-defined class: a class pointer plus one slot per
/// declared instance variable, in declaration order.
pub struct Native {
    pub class: Ptr<Class>,
    pub ivars: RefCell<Vec<Value>>,
}

impl Native {
    pub fn new(class: Ptr<Class>) -> Self {
        let n = class.ivars.borrow().len();
        Native {
            class,
            ivars: RefCell::new(vec![Value::Nil; n]),
        }
    }

    pub fn ivar_index(&self, name: &str) -> Option<usize> {
        self.class.ivars.borrow().iter().position(|n| n == name)
    }

    pub fn get_ivar(&self, index: usize) -> Value {
        self.ivars.borrow()[index].clone()
    }

    pub fn set_ivar(&self, index: usize, value: Value) {
        self.ivars.borrow_mut()[index] = value;
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.class.name)?;
        for (i, v) in self.ivars.borrow().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:?}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}>", self.class.name)
    }
}

impl Object for Native {
    fn type_name(&self) -> &'static str {
        // Leaked once per class name the first time it's instantiated;
        // classes live for the process lifetime so this is fine.
        Box::leak(self.class.name.clone().into_boxed_str())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
