//! The dynamic scoped-variable environment (`GetScoped`/`SetScoped`).
//!
//! This is a separate namespace from lexical locals/refs: a persistent,
//! immutable chained map. `set` never mutates in place, it returns a new
//! chain with one more link; existing handles to the old chain (in
//! particular, ones already captured by a `Lambda` at creation time)
//! keep seeing the bindings as they were when captured, even after a
//! caller further down the stack shadows a name.

use std::rc::Rc;

use super::value::Value;

#[derive(Clone, Default)]
pub enum ScopedEnv {
    #[default]
    Empty,
    Cons(Rc<Link>),
}

struct Link {
    name: String,
    value: Value,
    parent: ScopedEnv,
}

impl ScopedEnv {
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut cur = self;
        loop {
            match cur {
                ScopedEnv::Empty => return None,
                ScopedEnv::Cons(link) => {
                    if link.name == name {
                        return Some(link.value.clone());
                    }
                    cur = &link.parent;
                }
            }
        }
    }

    #[must_use = "`set` returns a new environment; it does not mutate in place"]
    pub fn set(&self, name: impl Into<String>, value: Value) -> ScopedEnv {
        ScopedEnv::Cons(Rc::new(Link {
            name: name.into(),
            value,
            parent: self.clone(),
        }))
    }
}
