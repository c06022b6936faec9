//! Open-addressed hash map with Python-style perturbed probing.
//!
//! The probe sequence and fill factor mirror the reference implementation
//! exactly: grow once `(fill + 1) * 3 > capacity * 2`, and step with
//! `idx = (idx << 2) + idx + perturb + 1; perturb >>= 5`. Deleted slots are
//! tombstoned so that probe chains past them stay intact.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::{Object, Str, Value};
use crate::error::Result;

#[derive(Clone)]
enum Slot {
    Empty,
    Tombstone,
    Entry { hash: u64, key: Value, value: Value },
}

struct Table {
    slots: Vec<Slot>,
    used: usize,
    fill: usize,
}

impl Table {
    fn with_capacity(n: usize) -> Self {
        Table {
            slots: vec![Slot::Empty; n.next_power_of_two().max(8)],
            used: 0,
            fill: 0,
        }
    }

    fn mask(&self) -> u64 {
        (self.slots.len() - 1) as u64
    }

    fn find(&self, key: &Value, hash: u64) -> (usize, bool) {
        let mask = self.mask();
        let mut idx = hash & mask;
        let mut perturb = hash;
        loop {
            match &self.slots[idx as usize] {
                Slot::Empty => return (idx as usize, false),
                Slot::Entry {
                    hash: h,
                    key: k,
                    ..
                } if *h == hash && values_equal(key, k) => return (idx as usize, true),
                _ => {
                    let next = (idx << 2) + idx + perturb + 1;
                    perturb >>= 5;
                    idx = next & mask;
                }
            }
        }
    }

    fn needs_grow(&self) -> bool {
        (self.fill + 1) * 3 > self.slots.len() * 2
    }

    fn raw_insert(&mut self, hash: u64, key: Value, value: Value) {
        let mask = self.mask();
        let mut idx = hash & mask;
        let mut perturb = hash;
        loop {
            match &self.slots[idx as usize] {
                Slot::Empty => {
                    self.fill += 1;
                    self.used += 1;
                    self.slots[idx as usize] = Slot::Entry { hash, key, value };
                    return;
                }
                _ => {
                    let next = (idx << 2) + idx + perturb + 1;
                    perturb >>= 5;
                    idx = next & mask;
                }
            }
        }
    }
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        match self {
            Slot::Empty => Slot::Empty,
            Slot::Tombstone => Slot::Tombstone,
            Slot::Entry { hash, key, value } => Slot::Entry {
                hash: *hash,
                key: key.clone(),
                value: value.clone(),
            },
        }
    }
}

pub struct Map {
    table: RefCell<Table>,
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl Map {
    pub fn new() -> Self {
        Map {
            table: RefCell::new(Table::with_capacity(8)),
        }
    }

    pub fn len(&self) -> usize {
        self.table.borrow().used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        let table = self.table.borrow();
        let hash = hash_value(key);
        let (idx, found) = table.find(key, hash);
        if !found {
            return None;
        }
        match &table.slots[idx] {
            Slot::Entry { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn set(&self, key: Value, value: Value) {
        let hash = hash_value(&key);
        let mut table = self.table.borrow_mut();
        let (idx, found) = table.find(&key, hash);
        if found {
            table.slots[idx] = Slot::Entry { hash, key, value };
            return;
        }

        if !table.needs_grow() {
            table.fill += 1;
            table.used += 1;
            table.slots[idx] = Slot::Entry { hash, key, value };
            return;
        }

        let new_cap = (table.used * 2).max(8);
        let mut grown = Table::with_capacity(new_cap);
        for slot in table.slots.drain(..) {
            if let Slot::Entry { hash, key, value } = slot {
                grown.raw_insert(hash, key, value);
            }
        }
        grown.raw_insert(hash, key, value);
        *table = grown;
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        let hash = hash_value(key);
        let mut table = self.table.borrow_mut();
        let (idx, found) = table.find(key, hash);
        if !found {
            return None;
        }
        table.used -= 1;
        match std::mem::replace(&mut table.slots[idx], Slot::Tombstone) {
            Slot::Entry { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.table
            .borrow()
            .slots
            .iter()
            .filter_map(|s| match s {
                Slot::Entry { key, value, .. } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Structural hash used for map keys. Integers and strings hash by value;
/// every other kind hashes by identity, matching `Compare` below.
pub fn hash_value(v: &Value) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    match v {
        Value::Nil => 0u8.hash(&mut hasher),
        Value::Bool(b) => {
            1u8.hash(&mut hasher);
            b.hash(&mut hasher);
        }
        Value::Int(n) => {
            2u8.hash(&mut hasher);
            n.hash(&mut hasher);
        }
        Value::BigInt(n) => {
            2u8.hash(&mut hasher);
            n.hash(&mut hasher);
        }
        Value::Str(s) => {
            3u8.hash(&mut hasher);
            s.as_str().hash(&mut hasher);
        }
        Value::Object(obj) => {
            4u8.hash(&mut hasher);
            (Rc::as_ptr(obj) as *const () as usize).hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// `Compare` from the reference implementation: value equality for the
/// immutable scalar kinds, identity equality for everything else.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::BigInt(a), Value::BigInt(b)) => a == b,
        (Value::Int(a), Value::BigInt(b)) | (Value::BigInt(b), Value::Int(a)) => *a as i128 == *b,
        (Value::Str(a), Value::Str(b)) => super::str::str_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.entries().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl Object for Map {
    fn type_name(&self) -> &'static str {
        "Map"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn key_to_str(v: &Value) -> Result<Rc<Str>> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        other => Err(crate::error::Error::type_error(format!(
            "`{other}` is not a string key"
        ))),
    }
}
