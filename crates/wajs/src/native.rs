//! Bridge calls on targets other than wasm32.
//!
//! Stubs run on the host installed for the current thread. Exports are
//! collected with `inventory` and served by [`export_table`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::{BridgeHost, ExportError, ExportTable, NativeExport};

thread_local! {
    static HOST: RefCell<Option<Rc<dyn BridgeHost>>> = RefCell::new(None);
}

/// An export as registered by `#[wajs::export]`.
#[doc(hidden)]
pub struct RegisteredExport(pub NativeExport);

inventory::collect!(RegisteredExport);

/// Install `host` for bridge calls made on this thread, returning the host
/// it replaces.
pub fn install(host: Rc<dyn BridgeHost>) -> Option<Rc<dyn BridgeHost>> {
    HOST.with(|slot| slot.borrow_mut().replace(host))
}

pub fn uninstall() -> Option<Rc<dyn BridgeHost>> {
    HOST.with(|slot| slot.borrow_mut().take())
}

// The host is cloned out so an export it calls may reach a bridge function.
pub(crate) fn current() -> Option<Rc<dyn BridgeHost>> {
    HOST.with(|slot| slot.borrow().clone())
}

/// Every export registered in the program, one entry per name.
pub fn exports() -> Vec<&'static NativeExport> {
    let mut all: Vec<&'static NativeExport> = inventory::iter::<RegisteredExport>
        .into_iter()
        .map(|r| &r.0)
        .collect();
    all.sort_by_key(|e| e.name);
    all
}

/// The lookup table over [`exports`]; a name registered twice is an error.
pub fn export_table() -> Result<ExportTable<&'static NativeExport>, ExportError> {
    ExportTable::from_entries(exports().into_iter().map(|e| (e.name, e)))
}
