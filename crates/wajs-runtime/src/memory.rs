//! Linear memory and the typed views host code reads it through.
//!
//! Views never hold the buffer itself. A view handle records the
//! generation of the memory it was created for; growing memory bumps the
//! generation, so every access through an older handle fails instead of
//! reading a buffer that no longer exists.

use std::fmt;

/// Size of one wasm page.
pub const PAGE_SIZE: usize = 0x1_0000;

/// Element type of a typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    U8,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ViewKind {
    pub const ALL: [ViewKind; 6] = [
        ViewKind::U8,
        ViewKind::U16,
        ViewKind::I32,
        ViewKind::U32,
        ViewKind::F32,
        ViewKind::F64,
    ];

    /// Name of the global the view is bound to in host code.
    pub fn global(self) -> &'static str {
        match self {
            Self::U8 => "MU8",
            Self::U16 => "MU16",
            Self::I32 => "MI32",
            Self::U32 => "MU32",
            Self::F32 => "MF32",
            Self::F64 => "MF64",
        }
    }

    /// Bytes per element.
    pub fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Read element `index` of a view over `bytes`. Out of range reads
    /// yield `None`, like a typed array yields `undefined`.
    pub fn load(self, bytes: &[u8], index: usize) -> Option<f64> {
        let start = index.checked_mul(self.width())?;
        let raw = bytes.get(start..start.checked_add(self.width())?)?;
        Some(match self {
            Self::U8 => f64::from(raw[0]),
            Self::U16 => f64::from(u16::from_le_bytes([raw[0], raw[1]])),
            Self::I32 => f64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            Self::U32 => f64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            Self::F32 => f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            Self::F64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(raw);
                f64::from_le_bytes(b)
            }
        })
    }

    /// Write element `index` with typed array conversion rules. Out of
    /// range writes are ignored and report `false`.
    pub fn store(self, bytes: &mut [u8], index: usize, value: f64) -> bool {
        let Some(start) = index.checked_mul(self.width()) else {
            return false;
        };
        let Some(slot) = start
            .checked_add(self.width())
            .and_then(|end| bytes.get_mut(start..end))
        else {
            return false;
        };
        match self {
            Self::U8 => slot[0] = wajs_script::to_int32(value) as u8,
            Self::U16 => slot.copy_from_slice(&(wajs_script::to_int32(value) as u16).to_le_bytes()),
            Self::I32 => slot.copy_from_slice(&wajs_script::to_int32(value).to_le_bytes()),
            Self::U32 => slot.copy_from_slice(&(wajs_script::to_int32(value) as u32).to_le_bytes()),
            Self::F32 => slot.copy_from_slice(&(value as f32).to_le_bytes()),
            Self::F64 => slot.copy_from_slice(&value.to_le_bytes()),
        }
        true
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.global())
    }
}

/// A view as handed to host code: its element type and the memory
/// generation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewHandle {
    pub kind: ViewKind,
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} view from memory generation {held} used after growth (current generation {current})")]
pub struct StaleView {
    pub kind: ViewKind,
    pub held: u32,
    pub current: u32,
}

/// Tracks the memory size last observed and the generation counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryViews {
    generation: u32,
    len: usize,
}

impl MemoryViews {
    pub fn new(len: usize) -> Self {
        Self { generation: 0, len }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Byte length of the buffer the current views cover.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Record the current buffer length. Returns true when it changed, in
    /// which case every existing handle is now stale.
    pub fn observe(&mut self, len: usize) -> bool {
        if len == self.len {
            return false;
        }
        self.len = len;
        self.generation += 1;
        true
    }

    pub fn handle(&self, kind: ViewKind) -> ViewHandle {
        ViewHandle {
            kind,
            generation: self.generation,
        }
    }

    pub fn check(&self, handle: ViewHandle) -> Result<(), StaleView> {
        if handle.generation == self.generation {
            Ok(())
        } else {
            Err(StaleView {
                kind: handle.kind,
                held: handle.generation,
                current: self.generation,
            })
        }
    }
}

/// Linear memory owned by the host, for running bridge code without a
/// wasm instance. Allocation is a bump pointer that grows the buffer a
/// page at a time.
#[derive(Debug, Clone)]
pub struct OwnedMemory {
    bytes: Vec<u8>,
    heap: usize,
    max_pages: Option<usize>,
}

impl OwnedMemory {
    /// Memory of `pages` pages. Offset 0 is never handed out, so a null
    /// pointer stays distinguishable.
    pub fn new(pages: usize) -> Self {
        Self {
            bytes: vec![0; pages * PAGE_SIZE],
            heap: 8,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max: usize) -> Self {
        self.max_pages = Some(max);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn pages(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    /// Grow by `delta` pages, returning the previous size in pages, or
    /// `None` when the limit would be exceeded.
    pub fn grow(&mut self, delta: usize) -> Option<usize> {
        let old = self.pages();
        let new = old.checked_add(delta)?;
        if self.max_pages.is_some_and(|max| new > max) || new > 0x1_0000 {
            return None;
        }
        self.bytes.resize(new * PAGE_SIZE, 0);
        log::debug!("owned memory grew from {old} to {new} page(s)");
        Some(old)
    }

    /// Reserve `size` bytes, 8-byte aligned, growing as needed.
    pub fn alloc(&mut self, size: usize) -> Option<u32> {
        let start = self.heap;
        let end = start.checked_add(size)?.checked_add(7)? & !7;
        if end > self.bytes.len() {
            let missing = (end - self.bytes.len()).div_ceil(PAGE_SIZE);
            self.grow(missing)?;
        }
        self.heap = end;
        u32::try_from(start).ok()
    }
}

impl Default for OwnedMemory {
    fn default() -> Self {
        Self::new(1)
    }
}
