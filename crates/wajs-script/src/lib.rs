//! Host script engine: a lexer, parser and tree-walking interpreter for the
//! JavaScript subset that bridge snippets are written in.
//!
//! The same snippet text is embedded verbatim in the generated JavaScript
//! loader, so anything accepted here must mean the same thing to a real
//! JavaScript engine.

pub mod ast;
mod builtins;
mod env;
pub mod error;
mod interp;
pub mod lexer;
mod parse_expr;
mod parse_stmt;
mod parser;
mod realm;
pub mod token;
mod value;

pub use builtins::Builtin;
pub use env::Scope;
pub use error::{EvalError, EvalResult, Span, SyntaxError, SyntaxErrors};
pub use interp::{error_value, Interpreter, DEFAULT_STEP_LIMIT, MAX_CALL_DEPTH};
pub use parser::{parse_function, parse_program};
pub use realm::{NoRealm, Realm};
pub use value::{
    number_to_string, string_to_number, to_int32, BuiltinFn, Closure, HostRef, Object, Value,
};
