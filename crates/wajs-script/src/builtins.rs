//! Native functions and the global objects that expose them.

use std::rc::Rc;

use crate::env::Scope;
use crate::error::{EvalError, EvalResult};
use crate::interp::Interpreter;
use crate::realm::Realm;
use crate::value::{number_to_string, BuiltinFn, Object, Value};

macro_rules! builtins {
    ($($id:ident => $name:literal,)*) => {
        /// Identifies a native function.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($id,)*
        }

        impl Builtin {
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$id => $name,)*
                }
            }
        }
    };
}

builtins! {
    MathFloor => "floor",
    MathCeil => "ceil",
    MathRound => "round",
    MathTrunc => "trunc",
    MathAbs => "abs",
    MathSign => "sign",
    MathMin => "min",
    MathMax => "max",
    MathSqrt => "sqrt",
    MathPow => "pow",
    MathSin => "sin",
    MathCos => "cos",
    MathTan => "tan",
    MathAtan2 => "atan2",
    MathLog => "log",
    MathExp => "exp",
    MathFround => "fround",
    MathImul => "imul",
    StringCtor => "String",
    NumberCtor => "Number",
    BooleanCtor => "Boolean",
    ArrayCtor => "Array",
    ObjectCtor => "Object",
    ErrorCtor => "Error",
    TypeErrorCtor => "TypeError",
    RangeErrorCtor => "RangeError",
    ParseInt => "parseInt",
    ParseFloat => "parseFloat",
    IsNaN => "isNaN",
    IsFinite => "isFinite",
    StringFromCharCode => "fromCharCode",
    ArrayIsArray => "isArray",
    ObjectKeys => "keys",
    NumberIsInteger => "isInteger",
    StrCharCodeAt => "charCodeAt",
    StrCharAt => "charAt",
    StrIndexOf => "indexOf",
    StrSlice => "slice",
    StrSubstring => "substring",
    StrToUpperCase => "toUpperCase",
    StrToLowerCase => "toLowerCase",
    StrSplit => "split",
    StrTrim => "trim",
    StrStartsWith => "startsWith",
    StrEndsWith => "endsWith",
    StrIncludes => "includes",
    StrRepeat => "repeat",
    StrPadStart => "padStart",
    ArrPush => "push",
    ArrPop => "pop",
    ArrShift => "shift",
    ArrJoin => "join",
    ArrIndexOf => "indexOf",
    ArrIncludes => "includes",
    ArrSlice => "slice",
    ArrConcat => "concat",
    ArrMap => "map",
    ArrForEach => "forEach",
    ArrFilter => "filter",
    ArrReduce => "reduce",
    NumToString => "toString",
    NumToFixed => "toFixed",
}

impl Builtin {
    /// Usable with `new`.
    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            Self::ArrayCtor
                | Self::ObjectCtor
                | Self::ErrorCtor
                | Self::TypeErrorCtor
                | Self::RangeErrorCtor
        )
    }

    /// Properties of constructor functions, such as `String.fromCharCode`.
    pub fn static_member(self, name: &str) -> Option<Builtin> {
        match (self, name) {
            (Self::StringCtor, "fromCharCode") => Some(Self::StringFromCharCode),
            (Self::ArrayCtor, "isArray") => Some(Self::ArrayIsArray),
            (Self::ObjectCtor, "keys") => Some(Self::ObjectKeys),
            (Self::NumberCtor, "isInteger") => Some(Self::NumberIsInteger),
            _ => None,
        }
    }
}

pub(crate) fn string_method(name: &str) -> Option<Builtin> {
    use Builtin::*;
    Some(match name {
        "charCodeAt" => StrCharCodeAt,
        "charAt" => StrCharAt,
        "indexOf" => StrIndexOf,
        "slice" => StrSlice,
        "substring" => StrSubstring,
        "toUpperCase" => StrToUpperCase,
        "toLowerCase" => StrToLowerCase,
        "split" => StrSplit,
        "trim" => StrTrim,
        "startsWith" => StrStartsWith,
        "endsWith" => StrEndsWith,
        "includes" => StrIncludes,
        "repeat" => StrRepeat,
        "padStart" => StrPadStart,
        _ => return None,
    })
}

pub(crate) fn array_method(name: &str) -> Option<Builtin> {
    use Builtin::*;
    Some(match name {
        "push" => ArrPush,
        "pop" => ArrPop,
        "shift" => ArrShift,
        "join" => ArrJoin,
        "indexOf" => ArrIndexOf,
        "includes" => ArrIncludes,
        "slice" => ArrSlice,
        "concat" => ArrConcat,
        "map" => ArrMap,
        "forEach" => ArrForEach,
        "filter" => ArrFilter,
        "reduce" => ArrReduce,
        _ => return None,
    })
}

pub(crate) fn number_method(name: &str) -> Option<Builtin> {
    match name {
        "toString" => Some(Builtin::NumToString),
        "toFixed" => Some(Builtin::NumToFixed),
        _ => None,
    }
}

/// Install the global objects into `globals`.
pub(crate) fn install(globals: &Rc<Scope>) {
    use Builtin::*;
    let mut math = Object::new();
    for id in [
        MathFloor, MathCeil, MathRound, MathTrunc, MathAbs, MathSign, MathMin, MathMax, MathSqrt,
        MathPow, MathSin, MathCos, MathTan, MathAtan2, MathLog, MathExp, MathFround, MathImul,
    ] {
        math.set(id.name(), Value::builtin(id));
    }
    math.set("PI", Value::Number(std::f64::consts::PI));
    math.set("E", Value::Number(std::f64::consts::E));
    globals.declare("Math", Value::object(math), true);

    for id in [
        StringCtor,
        NumberCtor,
        BooleanCtor,
        ArrayCtor,
        ObjectCtor,
        ErrorCtor,
        TypeErrorCtor,
        RangeErrorCtor,
        ParseInt,
        ParseFloat,
        IsNaN,
        IsFinite,
    ] {
        globals.declare(id.name(), Value::builtin(id), true);
    }
    globals.declare("NaN", Value::Number(f64::NAN), false);
    globals.declare("Infinity", Value::Number(f64::INFINITY), false);
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn num_arg(args: &[Value], i: usize) -> f64 {
    args.get(i).map(Value::to_number).unwrap_or(f64::NAN)
}

/// Relative index argument as used by `slice`: negative counts from the end.
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(value) = value.filter(|v| !v.is_undefined()) else {
        return default;
    };
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn clamp_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    match value.filter(|v| !v.is_undefined()) {
        Some(v) => {
            let n = v.to_number();
            if n.is_nan() {
                0
            } else {
                n.trunc().clamp(0.0, len as f64) as usize
            }
        }
        None => default,
    }
}

/// Position argument of `charAt`/`charCodeAt`, if it is in range.
fn char_position(args: &[Value], len: usize) -> Option<usize> {
    let n = args.first().map_or(0.0, Value::to_number);
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    (n >= 0.0 && n < len as f64).then_some(n as usize)
}

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> Value {
    Value::from(String::from_utf16_lossy(units))
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    (from..haystack.len().saturating_sub(needle.len() - 1))
        .find(|&i| haystack[i..].starts_with(needle))
}

/// `parseInt` over the longest valid prefix.
fn parse_int(text: &str, radix: Option<f64>) -> f64 {
    let s = text.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut radix = match radix {
        Some(r) if !r.is_nan() && r != 0.0 => r.trunc() as u32,
        Some(_) | None => 0,
    };
    let mut digits = s;
    if (radix == 0 || radix == 16) && (s.starts_with("0x") || s.starts_with("0X")) {
        radix = 16;
        digits = &s[2..];
    } else if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value: f64 = 0.0;
    let mut any = false;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * f64::from(radix) + f64::from(d);
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return f64::NAN;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// `parseFloat` over the longest valid prefix.
fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    for word in ["Infinity", "+Infinity", "-Infinity"] {
        if s.starts_with(word) {
            return if word.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }
    }
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut best = None;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'0'..=b'9' => {
                end += 1;
                if s[..end].parse::<f64>().is_ok() {
                    best = Some(end);
                }
                continue;
            }
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if !seen_exp && best.is_some() => {
                seen_exp = true;
                if matches!(bytes.get(end + 1), Some(b'+' | b'-')) {
                    end += 1;
                }
            }
            _ => break,
        }
        end += 1;
    }
    best.and_then(|end| s[..end].parse().ok()).unwrap_or(f64::NAN)
}

fn js_round(x: f64) -> f64 {
    let r = x.round();
    if x - r == 0.5 {
        r + 1.0
    } else {
        r
    }
}

fn to_fixed(n: f64, digits: f64) -> EvalResult<Value> {
    if !(0.0..=100.0).contains(&digits) {
        return Err(EvalError::type_error("toFixed() digits must be between 0 and 100"));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(Value::from(number_to_string(n)));
    }
    Ok(Value::from(format!("{:.*}", digits as usize, n)))
}

fn to_radix_string(n: f64, radix: u32) -> EvalResult<Value> {
    if !(2..=36).contains(&radix) {
        return Err(EvalError::type_error("toString() radix must be between 2 and 36"));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(Value::from(number_to_string(n)));
    }
    let mut value = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let d = (value % u64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        value /= u64::from(radix);
        if value == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(Value::from(digits.into_iter().rev().collect::<String>()))
}

impl Interpreter {
    pub(crate) fn call_builtin(
        &self,
        realm: &mut dyn Realm,
        f: &BuiltinFn,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        use Builtin::*;
        let this = f.this.as_deref().cloned().unwrap_or_default();
        let math1 = |op: fn(f64) -> f64| Ok(Value::Number(op(num_arg(&args, 0))));
        match f.id {
            MathFloor => math1(f64::floor),
            MathCeil => math1(f64::ceil),
            MathRound => math1(js_round),
            MathTrunc => math1(f64::trunc),
            MathAbs => math1(f64::abs),
            MathSign => math1(|x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
            MathSqrt => math1(f64::sqrt),
            MathSin => math1(f64::sin),
            MathCos => math1(f64::cos),
            MathTan => math1(f64::tan),
            MathLog => math1(f64::ln),
            MathExp => math1(f64::exp),
            MathFround => math1(|x| f64::from(x as f32)),
            MathPow => Ok(crate::interp::binary(
                crate::ast::BinaryOp::Exp,
                &arg(&args, 0),
                &arg(&args, 1),
            )),
            MathAtan2 => Ok(Value::Number(num_arg(&args, 0).atan2(num_arg(&args, 1)))),
            MathImul => Ok(Value::from(arg(&args, 0).to_int32().wrapping_mul(arg(&args, 1).to_int32()))),
            MathMin | MathMax => {
                let mut acc = if f.id == MathMin { f64::INFINITY } else { f64::NEG_INFINITY };
                for v in &args {
                    let n = v.to_number();
                    if n.is_nan() {
                        return Ok(Value::Number(f64::NAN));
                    }
                    acc = if f.id == MathMin { acc.min(n) } else { acc.max(n) };
                }
                Ok(Value::Number(acc))
            }
            StringCtor => Ok(Value::from(match args.first() {
                Some(v) => v.to_display_string(),
                None => String::new(),
            })),
            NumberCtor => Ok(Value::Number(args.first().map_or(0.0, Value::to_number))),
            BooleanCtor => Ok(Value::Bool(arg(&args, 0).truthy())),
            ArrayCtor => {
                if let [Value::Number(n)] = args.as_slice() {
                    let n = *n;
                    if n < 0.0 || n.fract() != 0.0 || n > f64::from(1u32 << 24) {
                        return Err(EvalError::type_error("invalid array length"));
                    }
                    return Ok(Value::array(vec![Value::Undefined; n as usize]));
                }
                Ok(Value::array(args))
            }
            ObjectCtor => Ok(Value::object(Object::new())),
            ErrorCtor | TypeErrorCtor | RangeErrorCtor => {
                let message = match args.first() {
                    Some(v) if !v.is_undefined() => v.to_display_string(),
                    _ => String::new(),
                };
                Ok(Value::object(Object::error(f.id.name(), &message)))
            }
            ParseInt => {
                let radix = args.get(1).filter(|v| !v.is_undefined()).map(Value::to_number);
                Ok(Value::Number(parse_int(&arg(&args, 0).to_display_string(), radix)))
            }
            ParseFloat => Ok(Value::Number(parse_float(&arg(&args, 0).to_display_string()))),
            IsNaN => Ok(Value::Bool(num_arg(&args, 0).is_nan())),
            IsFinite => Ok(Value::Bool(num_arg(&args, 0).is_finite())),
            StringFromCharCode => {
                let units: Vec<u16> = args.iter().map(|v| v.to_uint32() as u16).collect();
                Ok(from_units(&units))
            }
            ArrayIsArray => Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_)))),
            ObjectKeys => match arg(&args, 0) {
                Value::Object(obj) => Ok(Value::array(
                    obj.borrow().keys().map(|k| Value::Str(Rc::clone(k))).collect(),
                )),
                Value::Array(items) => Ok(Value::array(
                    (0..items.borrow().len())
                        .map(|i| Value::from(i.to_string()))
                        .collect(),
                )),
                _ => Ok(Value::array(Vec::new())),
            },
            NumberIsInteger => Ok(Value::Bool(matches!(
                arg(&args, 0),
                Value::Number(n) if n.is_finite() && n.fract() == 0.0
            ))),
            NumToString => {
                let radix = args.first().filter(|v| !v.is_undefined()).map_or(10.0, Value::to_number);
                to_radix_string(this.to_number(), radix as u32)
            }
            NumToFixed => to_fixed(this.to_number(), args.first().map_or(0.0, Value::to_number)),
            id if string_method(id.name()) == Some(id) => {
                self.call_string_method(id, &this.to_display_string(), &args)
            }
            id => match this {
                Value::Array(items) => self.call_array_method(realm, id, &items, args),
                _ => Err(EvalError::type_error(format!("{}() called on a non-array", id.name()))),
            },
        }
    }

    fn call_string_method(&self, id: Builtin, s: &str, args: &[Value]) -> EvalResult<Value> {
        use Builtin::*;
        let text = units(s);
        let len = text.len();
        Ok(match id {
            StrCharCodeAt => match char_position(args, len) {
                Some(i) => Value::from(u32::from(text[i])),
                None => Value::Number(f64::NAN),
            },
            StrCharAt => match char_position(args, len) {
                Some(i) => from_units(&text[i..=i]),
                None => Value::from(""),
            },
            StrIndexOf => {
                let needle = units(&arg(args, 0).to_display_string());
                let from = clamp_index(args.get(1), len, 0);
                Value::Number(find_units(&text, &needle, from).map_or(-1.0, |i| i as f64))
            }
            StrIncludes => {
                let needle = units(&arg(args, 0).to_display_string());
                Value::Bool(find_units(&text, &needle, 0).is_some())
            }
            StrStartsWith => {
                let needle = units(&arg(args, 0).to_display_string());
                Value::Bool(text.starts_with(&needle))
            }
            StrEndsWith => {
                let needle = units(&arg(args, 0).to_display_string());
                Value::Bool(text.ends_with(&needle))
            }
            StrSlice => {
                let start = relative_index(args.first(), len, 0);
                let end = relative_index(args.get(1), len, len);
                from_units(if start < end { &text[start..end] } else { &[] })
            }
            StrSubstring => {
                let a = clamp_index(args.first(), len, 0);
                let b = clamp_index(args.get(1), len, len);
                from_units(&text[a.min(b)..a.max(b)])
            }
            StrToUpperCase => Value::from(s.to_uppercase()),
            StrToLowerCase => Value::from(s.to_lowercase()),
            StrTrim => Value::from(s.trim()),
            StrSplit => {
                let parts = match args.first().filter(|v| !v.is_undefined()) {
                    None => vec![Value::from(s)],
                    Some(sep) => {
                        let sep = sep.to_display_string();
                        if sep.is_empty() {
                            text.iter().map(|u| from_units(&[*u])).collect()
                        } else {
                            s.split(sep.as_str()).map(Value::from).collect()
                        }
                    }
                };
                Value::array(parts)
            }
            StrRepeat => {
                let n = num_arg(args, 0);
                if !(0.0..=1e6).contains(&n) {
                    return Err(EvalError::type_error("invalid repeat count"));
                }
                Value::from(s.repeat(n as usize))
            }
            StrPadStart => {
                let target = num_arg(args, 0);
                let fill = match args.get(1).filter(|v| !v.is_undefined()) {
                    Some(v) => units(&v.to_display_string()),
                    None => vec![u16::from(b' ')],
                };
                if target.is_nan() || target <= len as f64 || fill.is_empty() || target > 1e6 {
                    return Ok(Value::from(s));
                }
                let pad_len = target as usize - len;
                let mut out: Vec<u16> = fill.iter().cycle().take(pad_len).copied().collect();
                out.extend_from_slice(&text);
                from_units(&out)
            }
            other => {
                return Err(EvalError::type_error(format!(
                    "{}() is not a string method",
                    other.name()
                )))
            }
        })
    }

    fn call_array_method(
        &self,
        realm: &mut dyn Realm,
        id: Builtin,
        items: &Rc<std::cell::RefCell<Vec<Value>>>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        use Builtin::*;
        match id {
            ArrPush => {
                let mut items = items.borrow_mut();
                items.extend(args);
                Ok(Value::Number(items.len() as f64))
            }
            ArrPop => Ok(items.borrow_mut().pop().unwrap_or_default()),
            ArrShift => {
                let mut items = items.borrow_mut();
                if items.is_empty() {
                    Ok(Value::Undefined)
                } else {
                    Ok(items.remove(0))
                }
            }
            ArrJoin => {
                let sep = match args.first().filter(|v| !v.is_undefined()) {
                    Some(v) => v.to_display_string(),
                    None => ",".into(),
                };
                let parts: Vec<String> = items
                    .borrow()
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                    .collect();
                Ok(Value::from(parts.join(&sep)))
            }
            ArrIndexOf | ArrIncludes => {
                let needle = arg(&args, 0);
                let found = items.borrow().iter().position(|v| v.strict_equals(&needle));
                Ok(if id == ArrIndexOf {
                    Value::Number(found.map_or(-1.0, |i| i as f64))
                } else {
                    Value::Bool(found.is_some())
                })
            }
            ArrSlice => {
                let items = items.borrow();
                let len = items.len();
                let start = relative_index(args.first(), len, 0);
                let end = relative_index(args.get(1), len, len);
                let slice = if start < end { items[start..end].to_vec() } else { Vec::new() };
                Ok(Value::array(slice))
            }
            ArrConcat => {
                let mut out = items.borrow().clone();
                for v in args {
                    match v {
                        Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                        other => out.push(other),
                    }
                }
                Ok(Value::array(out))
            }
            ArrMap | ArrForEach | ArrFilter => {
                let callback = arg(&args, 0);
                let snapshot = items.borrow().clone();
                let mut out = Vec::new();
                for (i, item) in snapshot.into_iter().enumerate() {
                    let result = self.call_value(
                        realm,
                        &callback,
                        vec![item.clone(), Value::Number(i as f64)],
                    )?;
                    match id {
                        ArrMap => out.push(result),
                        ArrFilter if result.truthy() => out.push(item),
                        _ => {}
                    }
                }
                Ok(if id == ArrForEach {
                    Value::Undefined
                } else {
                    Value::array(out)
                })
            }
            ArrReduce => {
                let callback = arg(&args, 0);
                let snapshot = items.borrow().clone();
                let mut iter = snapshot.into_iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(init) => init.clone(),
                    None => match iter.next() {
                        Some((_, first)) => first,
                        None => {
                            return Err(EvalError::type_error(
                                "reduce of empty array with no initial value",
                            ))
                        }
                    },
                };
                for (i, item) in iter {
                    acc = self.call_value(
                        realm,
                        &callback,
                        vec![acc, item, Value::Number(i as f64)],
                    )?;
                }
                Ok(acc)
            }
            other => Err(EvalError::type_error(format!(
                "{}() is not an array method",
                other.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_prefixes() {
        assert_eq!(parse_int("  42px", None), 42.0);
        assert_eq!(parse_int("-0x1F", None), -31.0);
        assert_eq!(parse_int("ff", Some(16.0)), 255.0);
        assert!(parse_int("px", None).is_nan());
        assert_eq!(parse_int("101", Some(2.0)), 5.0);
    }

    #[test]
    fn test_parse_float_prefixes() {
        assert_eq!(parse_float("3.25abc"), 3.25);
        assert_eq!(parse_float("-1e3x"), -1000.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
        assert_eq!(js_round(-2.6), -3.0);
    }

    #[test]
    fn test_radix_strings() {
        assert_eq!(to_radix_string(255.0, 16).unwrap().to_string(), "ff");
        assert_eq!(to_radix_string(-5.0, 2).unwrap().to_string(), "-101");
        assert_eq!(to_fixed(1.005, 1.0).unwrap().to_string(), "1.0");
    }
}
