use std::any::Any;
use std::fmt;

use crate::value::Object;

/// The single stdout handle installed as the `IO` class's sole instance,
/// bound into every script's top-level scope as `stdout`.
pub struct Io;

impl fmt::Debug for Io {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IO(stdout)")
    }
}

impl fmt::Display for Io {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<io stdout>")
    }
}

impl Object for Io {
    fn type_name(&self) -> &'static str {
        "IO"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
