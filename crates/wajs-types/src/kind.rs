use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a value passed as an argument across the bridge.
///
/// The set is closed: anything a declaration names outside of it is
/// rejected at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    /// 32-bit two's complement integer (`i32`, `u32`).
    Int32,
    /// IEEE-754 single precision float.
    Float32,
    /// IEEE-754 double precision float.
    Float64,
    /// Unsigned byte offset into linear memory.
    Pointer,
}

impl ArgKind {
    pub const ALL: [ArgKind; 4] = [
        ArgKind::Int32,
        ArgKind::Float32,
        ArgKind::Float64,
        ArgKind::Pointer,
    ];

    /// One-letter wire code used in metadata.
    pub fn code(self) -> char {
        match self {
            Self::Int32 => 'i',
            Self::Float32 => 'f',
            Self::Float64 => 'd',
            Self::Pointer => 'p',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(Self::Int32),
            'f' => Some(Self::Float32),
            'd' => Some(Self::Float64),
            'p' => Some(Self::Pointer),
            _ => None,
        }
    }

    /// Spelling used in signatures and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int32 => "i32",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Pointer => "ptr",
        }
    }

    /// The zero value of this kind.
    pub fn zero(self) -> Value {
        match self {
            Self::Int32 => Value::I32(0),
            Self::Float32 => Value::F32(0.0),
            Self::Float64 => Value::F64(0.0),
            Self::Pointer => Value::Ptr(0),
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of the single value a bridge function returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    Void,
    Int32,
    Float32,
    Float64,
    Pointer,
}

impl ReturnKind {
    pub fn code(self) -> char {
        match self.as_arg() {
            Some(kind) => kind.code(),
            None => 'v',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        if code == 'v' {
            return Some(Self::Void);
        }
        ArgKind::from_code(code).map(Self::from)
    }

    /// The argument kind carrying the returned value, or `None` for void.
    pub fn as_arg(self) -> Option<ArgKind> {
        match self {
            Self::Void => None,
            Self::Int32 => Some(ArgKind::Int32),
            Self::Float32 => Some(ArgKind::Float32),
            Self::Float64 => Some(ArgKind::Float64),
            Self::Pointer => Some(ArgKind::Pointer),
        }
    }

    pub fn name(self) -> &'static str {
        self.as_arg().map_or("void", ArgKind::name)
    }

    pub fn zero(self) -> Value {
        self.as_arg().map_or(Value::Void, ArgKind::zero)
    }
}

impl From<ArgKind> for ReturnKind {
    fn from(kind: ArgKind) -> Self {
        match kind {
            ArgKind::Int32 => Self::Int32,
            ArgKind::Float32 => Self::Float32,
            ArgKind::Float64 => Self::Float64,
            ArgKind::Pointer => Self::Pointer,
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value on the wire between native code and the host.
///
/// Conversions between variants follow the wasm calling convention:
/// integers and pointers share the same 32 bits, floats convert
/// numerically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Void,
    I32(i32),
    F32(f32),
    F64(f64),
    Ptr(u32),
}

impl Value {
    pub fn kind(self) -> ReturnKind {
        match self {
            Self::Void => ReturnKind::Void,
            Self::I32(_) => ReturnKind::Int32,
            Self::F32(_) => ReturnKind::Float32,
            Self::F64(_) => ReturnKind::Float64,
            Self::Ptr(_) => ReturnKind::Pointer,
        }
    }

    pub fn to_i32(self) -> i32 {
        match self {
            Self::Void => 0,
            Self::I32(v) => v,
            Self::Ptr(p) => p as i32,
            Self::F32(v) => v as i32,
            Self::F64(v) => v as i32,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::Ptr(p) => p,
            other => other.to_i32() as u32,
        }
    }

    pub fn to_f32(self) -> f32 {
        match self {
            Self::F32(v) => v,
            Self::F64(v) => v as f32,
            Self::I32(v) => v as f32,
            Self::Ptr(p) => p as f32,
            Self::Void => 0.0,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Self::F64(v) => v,
            Self::F32(v) => f64::from(v),
            Self::I32(v) => f64::from(v),
            Self::Ptr(p) => f64::from(p),
            Self::Void => 0.0,
        }
    }

    /// Convert to the representation of `kind`.
    pub fn coerce(self, kind: ReturnKind) -> Value {
        match kind {
            ReturnKind::Void => Value::Void,
            ReturnKind::Int32 => Value::I32(self.to_i32()),
            ReturnKind::Float32 => Value::F32(self.to_f32()),
            ReturnKind::Float64 => Value::F64(self.to_f64()),
            ReturnKind::Pointer => Value::Ptr(self.to_u32()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::I32(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}f32"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Ptr(p) => write!(f, "0x{p:08x}"),
        }
    }
}

/// Native argument types that marshal into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Native return types that unmarshal from a [`Value`].
pub trait FromValue {
    fn from_value(value: Value) -> Self;
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Void
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::I32(self)
    }
}

impl IntoValue for u32 {
    fn into_value(self) -> Value {
        Value::I32(self as i32)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::F32(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::F64(self)
    }
}

// Off wasm32 a pointer is only an opaque token: the address is truncated to
// the 32-bit offset space the host understands.
impl<T> IntoValue for *const T {
    fn into_value(self) -> Value {
        Value::Ptr(self as usize as u32)
    }
}

impl<T> IntoValue for *mut T {
    fn into_value(self) -> Value {
        Value::Ptr(self as usize as u32)
    }
}

impl FromValue for () {
    fn from_value(_: Value) -> Self {}
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Self {
        value.to_i32()
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Self {
        value.to_u32()
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Self {
        value.to_f32()
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Self {
        value.to_f64()
    }
}

impl<T> FromValue for *const T {
    fn from_value(value: Value) -> Self {
        value.to_u32() as usize as *const T
    }
}

impl<T> FromValue for *mut T {
    fn from_value(value: Value) -> Self {
        value.to_u32() as usize as *mut T
    }
}
