use atf_reflect::FuncInfo;

use crate::constants::{EnumHookMode, EnumHookState, EnumHookType};

/// Non-empty name segments collected while walking from a view up to the root, joined
/// with `/` for display (`HookView::info_text`, `TInformRecord::name_path`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePath(pub Vec<String>);

impl NamePath {
    pub fn push_front(&mut self, name: &str) {
        if !name.is_empty() {
            self.0.insert(0, name.to_string());
        }
    }

    pub fn build(&self) -> String {
        self.0.join("/")
    }
}

/// What the installer is asked to do: wire a single physical detour between the
/// function's original entry point and a gate address that will walk the handler lists.
#[derive(Debug, Clone, Copy)]
pub struct HookRequestRecord {
    pub orig_addr: u64,
    pub gate_addr: u64,
}

/// What the installer reports back. `detour_addr` is only meaningful when `valid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookResultRecord {
    pub valid: bool,
    pub orig_addr: u64,
    pub gate_addr: u64,
    pub detour_addr: u64,
}

/// One entry in a view's attach list: enough to reconstruct and later detach the
/// handler, and to describe it in `info_text`.
#[derive(Debug, Clone)]
pub struct AttachRecord {
    pub hook_type: EnumHookType,
    pub handler_addr: u64,
    pub func_info: FuncInfo,
    pub name_path: NamePath,
}

/// Fan-out record delivered to every `inform` callback on the chain from a view up to
/// the root, after an attempt that resolved to a valid `FuncInfo`.
#[derive(Debug, Clone)]
pub struct InformRecord {
    pub mode: EnumHookMode,
    pub handler_addr: u64,
    pub name_path: NamePath,
    pub func_info: FuncInfo,
    pub result: EnumHookState,
    pub hook_type: EnumHookType,
}
