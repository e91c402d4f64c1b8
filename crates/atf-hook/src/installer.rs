use atf_reflect::FuncInfo;

use crate::structs::{HookRequestRecord, HookResultRecord};

/// External collaborator that physically installs a single trampoline between a
/// function's original entry point and the gate address this crate hands it. Expected
/// to be synchronous and idempotent-safe to call once per function.
pub trait HookInstaller: Send + Sync {
    fn install(&self, request: HookRequestRecord) -> HookResultRecord;
}

/// Resolves the dispatch gate a given function should be detoured to — the address that,
/// at runtime, walks that function's `HandlerGroup` lists.
pub trait EntryPointResolver: Send + Sync {
    fn entry_point(&self, internal_id: i64) -> u64;
}

/// Resolves function descriptors by internal ID — the root's window onto the reflection
/// catalogue (kept as a trait so `atf-hook` does not need to know about the catalogue's
/// lifetime-parameterised blob representation).
pub trait FuncInfoResolver: Send + Sync {
    fn func_info(&self, internal_id: i64) -> FuncInfo;
}
