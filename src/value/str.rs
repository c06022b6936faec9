//! Process-wide string interning table.
//!
//! Identity equality is checked first (pointer compare on the `Rc`), falling
//! back to content compare only when the two handles came from different
//! interning calls (e.g. one literal loaded from two different `Code`
//! objects before either was interned against the other).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::Ptr;

pub struct Str {
    data: beef::lean::Cow<'static, str>,
}

impl Str {
    pub fn owned(s: impl Into<String>) -> Self {
        Str {
            data: beef::lean::Cow::owned(s.into()),
        }
    }

    pub fn borrowed(s: &'static str) -> Self {
        Str {
            data: beef::lean::Cow::borrowed(s),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }
}

impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}
impl Eq for Str {}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.data.as_ref())
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

/// A single table keyed by raw string content; every call to `intern` with
/// equal contents returns the same `Ptr<Str>`, so later equality checks can
/// short-circuit on `Rc::ptr_eq`.
#[derive(Default)]
pub struct Interner {
    table: RefCell<HashMap<String, Ptr<Str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, s: &str) -> Ptr<Str> {
        if let Some(existing) = self.table.borrow().get(s) {
            return existing.clone();
        }
        let interned = Rc::new(Str::owned(s.to_string()));
        self.table
            .borrow_mut()
            .insert(s.to_string(), interned.clone());
        interned
    }
}

/// Identity-first, contents-second equality, matching the interning
/// contract: two interned handles referring to equal text are `Rc::ptr_eq`
/// after going through the same `Interner`, but values built without going
/// through it (e.g. freshly allocated result strings) still compare equal
/// by content.
pub fn str_eq(a: &Ptr<Str>, b: &Ptr<Str>) -> bool {
    Rc::ptr_eq(a, b) || a.as_str() == b.as_str()
}
