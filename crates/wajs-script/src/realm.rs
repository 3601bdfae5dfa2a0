//! The interface between the interpreter and host-owned objects.

use crate::error::{EvalError, EvalResult};
use crate::interp::Interpreter;
use crate::value::{HostRef, Value};

/// Resolves property access and calls on [`HostRef`] values.
///
/// The interpreter never inspects a host reference itself. Every read, write
/// and call is forwarded here together with the interpreter, so a realm may
/// call back into script code.
pub trait Realm {
    fn get(&mut self, interp: &Interpreter, target: HostRef, key: &Value) -> EvalResult<Value>;

    fn set(
        &mut self,
        interp: &Interpreter,
        target: HostRef,
        key: &Value,
        value: Value,
    ) -> EvalResult<()>;

    fn call(&mut self, interp: &Interpreter, target: HostRef, args: Vec<Value>)
        -> EvalResult<Value>;

    /// Result of `typeof` on a host value.
    fn type_of(&self, _target: HostRef) -> &'static str {
        "object"
    }
}

/// A realm without host objects. Any host reference is a type error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRealm;

impl Realm for NoRealm {
    fn get(&mut self, _: &Interpreter, _: HostRef, key: &Value) -> EvalResult<Value> {
        Err(EvalError::type_error(format!(
            "cannot read '{}' of a host object without a realm",
            key.to_display_string()
        )))
    }

    fn set(&mut self, _: &Interpreter, _: HostRef, key: &Value, _: Value) -> EvalResult<()> {
        Err(EvalError::type_error(format!(
            "cannot set '{}' on a host object without a realm",
            key.to_display_string()
        )))
    }

    fn call(&mut self, _: &Interpreter, _: HostRef, _: Vec<Value>) -> EvalResult<Value> {
        Err(EvalError::type_error("host object is not callable without a realm"))
    }
}
