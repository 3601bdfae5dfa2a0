//! In-process host for wajs artifacts.
//!
//! Two hosts share one realm of host objects (`WA`, `ASM`, the memory
//! views, the string intrinsics and the timer functions):
//!
//! - [`Runtime`] loads a synthesized module into `wasmi`, checks its
//!   dispatch record against the manifest and links every slot to its
//!   compiled snippet.
//! - [`ScriptHost`] runs bridge functions for native builds, compiling
//!   each snippet on first call.
//!
//! Time is virtual. Timers fire only when the caller advances the clock
//! or drains the loop, in due-time order with ties broken by scheduling
//! order.

pub mod error;
pub mod event_loop;
pub mod marshal;
pub mod memory;
mod native;
mod options;
mod realm;
mod runtime;

pub use error::{LoadError, LoadResult, RuntimeError, RuntimeResult};
pub use event_loop::{EventLoop, Fired, TimerId};
pub use memory::{MemoryViews, OwnedMemory, StaleView, ViewHandle, ViewKind, PAGE_SIZE};
pub use native::ScriptHost;
pub use options::RuntimeOptions;
pub use realm::{Backend, ExportSlot, HostRealm, HostState, Slot, Task};
pub use runtime::{Runtime, WasmState};
