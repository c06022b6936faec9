use std::any::Any;
use std::fmt;

use crate::value::Object;

/// Bound to the `$LOADER` scoped variable every top-level program sees;
/// the desugared form of `Import` calls `import`/`import_relative` on it.
/// Package discovery itself (reading files, resolving relative paths
/// against a source tree) is a host concern this core only consumes
/// through this narrow interface — it resolves against whatever the
/// embedder already registered in `Runtime.packages`.
pub struct Loader;

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loader")
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<loader>")
    }
}

impl Object for Loader {
    fn type_name(&self) -> &'static str {
        "Loader"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
