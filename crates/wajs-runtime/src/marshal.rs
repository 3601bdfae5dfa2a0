//! Conversions between wire values, script values and wasm values, and the
//! C string helpers behind `MStrGet`/`MStrPut`.

use wajs_script::Value as ScriptValue;
use wajs_types::{ArgKind, ReturnKind, Value};

/// Error raised by a helper that would touch bytes outside the buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access of {len} byte(s) at offset {ptr} is outside linear memory ({size} bytes)")]
pub struct OutOfBounds {
    pub ptr: u32,
    pub len: usize,
    pub size: usize,
}

/// Read a NUL-terminated string starting at `ptr`, stopping after `max`
/// bytes when given. Invalid UTF-8 is replaced, a null pointer reads as
/// the empty string.
pub fn read_cstr(bytes: &[u8], ptr: u32, max: Option<usize>) -> String {
    let start = ptr as usize;
    if ptr == 0 || start >= bytes.len() {
        return String::new();
    }
    let limit = match max {
        Some(max) => bytes.len().min(start.saturating_add(max)),
        None => bytes.len(),
    };
    let window = &bytes[start..limit];
    let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
    String::from_utf8_lossy(&window[..end]).into_owned()
}

/// Copy `text` into the `cap`-byte buffer at `ptr` and terminate it.
///
/// At most `cap` bytes are written, terminator included. Returns the
/// number of content bytes copied, `min(len, cap - 1)`, or 0 for an empty
/// buffer. A truncated copy may end inside a multi-byte character.
pub fn write_cstr(bytes: &mut [u8], ptr: u32, cap: u32, text: &str) -> Result<usize, OutOfBounds> {
    if cap == 0 {
        return Ok(0);
    }
    let content = text.len().min(cap as usize - 1);
    let size = bytes.len();
    let start = ptr as usize;
    let slot = bytes.get_mut(start..start + content + 1).ok_or(OutOfBounds {
        ptr,
        len: content + 1,
        size,
    })?;
    slot[..content].copy_from_slice(&text.as_bytes()[..content]);
    slot[content] = 0;
    Ok(content)
}

/// Copy `data` to `ptr`.
pub fn write_bytes(bytes: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), OutOfBounds> {
    let size = bytes.len();
    let start = ptr as usize;
    let slot = bytes.get_mut(start..start + data.len()).ok_or(OutOfBounds {
        ptr,
        len: data.len(),
        size,
    })?;
    slot.copy_from_slice(data);
    Ok(())
}

/// A wire value as a script value. Every kind is exact in a double.
pub fn to_script(value: Value) -> ScriptValue {
    match value {
        Value::Void => ScriptValue::Undefined,
        Value::I32(v) => ScriptValue::from(v),
        Value::F32(v) => ScriptValue::Number(f64::from(v)),
        Value::F64(v) => ScriptValue::Number(v),
        Value::Ptr(p) => ScriptValue::from(p),
    }
}

/// A script value as `kind`, with the conversions a wasm import applies
/// to a JavaScript return value.
pub fn from_script(value: &ScriptValue, kind: ReturnKind) -> Value {
    match kind {
        ReturnKind::Void => Value::Void,
        ReturnKind::Int32 => Value::I32(value.to_int32()),
        ReturnKind::Pointer => Value::Ptr(value.to_uint32()),
        ReturnKind::Float32 => Value::F32(value.to_number() as f32),
        ReturnKind::Float64 => Value::F64(value.to_number()),
    }
}

/// A script argument as `kind`; a missing argument is `undefined`.
pub fn arg_from_script(value: Option<&ScriptValue>, kind: ArgKind) -> Value {
    from_script(value.unwrap_or(&ScriptValue::Undefined), ReturnKind::from(kind))
}

pub fn to_wasm(value: Value) -> wasmi::Val {
    match value {
        Value::I32(v) => wasmi::Val::I32(v),
        Value::Ptr(p) => wasmi::Val::I32(p as i32),
        Value::F32(v) => wasmi::Val::F32(v.into()),
        Value::F64(v) => wasmi::Val::F64(v.into()),
        Value::Void => wasmi::Val::I32(0),
    }
}

/// Read a wasm value as `kind`. Mismatched wasm types read as zero.
pub fn from_wasm(value: &wasmi::Val, kind: ReturnKind) -> Value {
    match (kind, value) {
        (ReturnKind::Void, _) => Value::Void,
        (ReturnKind::Int32, wasmi::Val::I32(v)) => Value::I32(*v),
        (ReturnKind::Pointer, wasmi::Val::I32(v)) => Value::Ptr(*v as u32),
        (ReturnKind::Float32, wasmi::Val::F32(v)) => Value::F32(v.to_float()),
        (ReturnKind::Float64, wasmi::Val::F64(v)) => Value::F64(v.to_float()),
        (kind, _) => kind.zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(text: &[u8], at: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes[at..at + text.len()].copy_from_slice(text);
        bytes
    }

    #[test]
    fn test_read_until_terminator() {
        let bytes = memory_with(b"hello\0world", 8);
        assert_eq!(read_cstr(&bytes, 8, None), "hello");
        assert_eq!(read_cstr(&bytes, 8, Some(3)), "hel");
        assert_eq!(read_cstr(&bytes, 0, None), "");
    }

    #[test]
    fn test_read_stops_at_buffer_end() {
        let mut bytes = vec![b'x'; 16];
        bytes[0] = 0;
        assert_eq!(read_cstr(&bytes, 12, None), "xxxx");
        assert_eq!(read_cstr(&bytes, 99, None), "");
    }

    #[test]
    fn test_write_round_trip_with_room() {
        let mut bytes = vec![0xaau8; 32];
        assert_eq!(write_cstr(&mut bytes, 4, 6, "hello"), Ok(5));
        assert_eq!(read_cstr(&bytes, 4, None), "hello");
        assert_eq!(bytes[10], 0xaa);
    }

    #[test]
    fn test_write_truncates_within_capacity() {
        for cap in 1..6u32 {
            let mut bytes = vec![0xaau8; 32];
            let n = write_cstr(&mut bytes, 4, cap, "hello").unwrap();
            assert_eq!(n, cap as usize - 1);
            assert_eq!(read_cstr(&bytes, 4, None), &"hello"[..n]);
            assert_eq!(bytes[4 + cap as usize - 1], 0);
            assert!(bytes[4 + cap as usize..].iter().all(|&b| b == 0xaa));
        }
        let mut bytes = vec![0xaau8; 8];
        assert_eq!(write_cstr(&mut bytes, 4, 0, "hello"), Ok(0));
        assert!(bytes.iter().all(|&b| b == 0xaa));
    }

    #[test]
    fn test_write_outside_memory() {
        let mut bytes = vec![0u8; 8];
        assert!(write_cstr(&mut bytes, 6, 16, "hello").is_err());
        assert!(write_bytes(&mut bytes, 7, &[1, 2]).is_err());
        assert_eq!(bytes, [0u8; 8]);
    }

    #[test]
    fn test_scalars_exact_through_script() {
        let cases = [
            Value::I32(i32::MIN),
            Value::I32(-1),
            Value::Ptr(u32::MAX),
            Value::F32(f32::MIN_POSITIVE),
            Value::F32(-0.1),
            Value::F64(std::f64::consts::PI),
            Value::F64(f64::MAX),
        ];
        for value in cases {
            let back = from_script(&to_script(value), value.kind());
            match (value, back) {
                (Value::F32(a), Value::F32(b)) => assert_eq!(a.to_bits(), b.to_bits()),
                (Value::F64(a), Value::F64(b)) => assert_eq!(a.to_bits(), b.to_bits()),
                (a, b) => assert_eq!(a, b),
            }
        }
    }

    #[test]
    fn test_wasm_values_exact() {
        let value = Value::F32(1.0e-40);
        let back = from_wasm(&to_wasm(value), ReturnKind::Float32);
        assert_eq!(back, value);
        let value = Value::F64(0.1);
        assert_eq!(from_wasm(&to_wasm(value), ReturnKind::Float64), value);
        assert_eq!(
            from_wasm(&to_wasm(Value::Ptr(0xffff_fff0)), ReturnKind::Pointer),
            Value::Ptr(0xffff_fff0)
        );
    }
}
