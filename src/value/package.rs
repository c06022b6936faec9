use std::any::Any;
use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;

use super::{Class, Object, Ptr, Value};

/// A loaded module: a name, the bindings it exports, and a singleton class
/// that receives any methods added to the package itself (`self.^add_method`
/// at top level, the desugared form of a bare `def`).
pub struct Package {
    pub name: String,
    pub exports: RefCell<IndexMap<String, Value>>,
    pub singleton_class: Ptr<Class>,
}

impl Package {
    /// `base` is the generic built-in `Package` class; the new singleton
    /// chains up to it so package-level dispatch still finds inherited
    /// methods like the ones installed at boot.
    pub fn new(name: impl Into<String>, base: Ptr<Class>) -> Self {
        let name = name.into();
        let singleton_class = Class::new(format!("#<Package:{name}>"), Some(base));
        Package {
            name,
            exports: RefCell::new(IndexMap::new()),
            singleton_class,
        }
    }

    pub fn export(&self, name: impl Into<String>, value: Value) {
        self.exports.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.exports.borrow().get(name).cloned()
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Package({})", self.name)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<package {}>", self.name)
    }
}

impl Object for Package {
    fn type_name(&self) -> &'static str {
        "Package"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
