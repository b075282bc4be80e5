//! Native callback type (spec §4.5, Ambient/supplemented): a boxed `Fn`
//! trait object, matching the teacher's native-function registration style
//! in `move-vm-runtime`.

use scriptvm_types::{ErrorValue, Value};
use std::fmt;
use std::sync::Arc;

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, ErrorValue> + Send + Sync;

#[derive(Clone)]
pub struct NativeCallback(pub Arc<NativeFn>);

impl NativeCallback {
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, ErrorValue> + Send + Sync + 'static) -> Self {
        NativeCallback(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ErrorValue> {
        (self.0)(args)
    }
}

impl fmt::Debug for NativeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeCallback(..)")
    }
}
