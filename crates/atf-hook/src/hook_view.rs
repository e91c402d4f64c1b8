use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use atf_reflect::Version;
use parking_lot::{Mutex, ReentrantMutex};

use crate::constants::{EnumHookAccessFlags, EnumHookMode, EnumHookState, EnumHookType};
use crate::handler_group::HandlerGroup;
use crate::installer::{EntryPointResolver, FuncInfoResolver, HookInstaller};
use crate::structs::{AttachRecord, HookRequestRecord, InformRecord, NamePath};

/// Identifies the ATF build this view was created against. Two views with differing
/// signatures never cooperate; a mismatch during `process` yields
/// `ErrorDifferentATFSignature` rather than silently operating on the wrong function
/// table.
pub type AtfSignature = u64;

type InformCallback = dyn Fn(&InformRecord) + Send + Sync;

struct ViewState {
    attach_list: Vec<AttachRecord>,
    inform: Option<Box<InformCallback>>,
}

/// Collaborators only the root view needs: the external trampoline installer, the
/// function-table lookup, the entry-point (dispatch gate) resolver, and the lazily
/// populated per-function `HandlerGroup` table.
struct RootTerminal {
    installer: Arc<dyn HookInstaller>,
    entry_points: Arc<dyn EntryPointResolver>,
    func_infos: Arc<dyn FuncInfoResolver>,
    groups: Mutex<HashMap<i64, Arc<HandlerGroup>>>,
}

impl RootTerminal {
    fn group_for(&self, internal_id: i64) -> Arc<HandlerGroup> {
        let mut groups = self.groups.lock();
        groups
            .entry(internal_id)
            .or_insert_with(|| Arc::new(HandlerGroup::new()))
            .clone()
    }
}

/// A node in the hook-attach tree. Every attach/detach/detach_all call on a non-root view
/// bubbles up to its parent and ultimately to the root, which is the only node that
/// touches a function's `HandlerGroup` directly.
pub struct HookView {
    name: String,
    access_flags: EnumHookAccessFlags,
    atf_signature: AtfSignature,
    hook_version: Version,
    parent: Option<Arc<HookView>>,
    terminal: Option<RootTerminal>,
    state: ReentrantMutex<RefCell<ViewState>>,
}

impl HookView {
    /// Constructs the root of a hook tree, bound to its collaborators.
    pub fn new_root(
        name: impl Into<String>,
        access_flags: EnumHookAccessFlags,
        atf_signature: AtfSignature,
        hook_version: Version,
        installer: Arc<dyn HookInstaller>,
        entry_points: Arc<dyn EntryPointResolver>,
        func_infos: Arc<dyn FuncInfoResolver>,
    ) -> Arc<HookView> {
        Arc::new(HookView {
            name: name.into(),
            access_flags,
            atf_signature,
            hook_version,
            parent: None,
            terminal: Some(RootTerminal {
                installer,
                entry_points,
                func_infos,
                groups: Mutex::new(HashMap::new()),
            }),
            state: ReentrantMutex::new(RefCell::new(ViewState {
                attach_list: Vec::new(),
                inform: None,
            })),
        })
    }

    /// Creates a child view delegating attach/detach up to `self`.
    pub fn create_view(self: &Arc<Self>, name: impl Into<String>, access_flags: EnumHookAccessFlags) -> Arc<HookView> {
        Arc::new(HookView {
            name: name.into(),
            access_flags,
            atf_signature: self.atf_signature,
            hook_version: self.hook_version,
            parent: Some(self.clone()),
            terminal: None,
            state: ReentrantMutex::new(RefCell::new(ViewState {
                attach_list: Vec::new(),
                inform: None,
            })),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access_flags(&self) -> EnumHookAccessFlags {
        self.access_flags
    }

    pub fn on_inform(&self, callback: impl Fn(&InformRecord) + Send + Sync + 'static) {
        let guard = self.state.lock();
        guard.borrow_mut().inform = Some(Box::new(callback));
    }

    fn root(&self) -> &HookView {
        match &self.parent {
            Some(p) => p.root(),
            None => self,
        }
    }

    fn name_path(&self) -> NamePath {
        let mut path = match &self.parent {
            Some(p) => p.name_path(),
            None => NamePath::default(),
        };
        path.0.push(self.name.clone());
        path
    }

    pub fn set_hook(&self, internal_id: i64, handler_addr: u64) -> EnumHookState {
        self.process(EnumHookMode::Attach, EnumHookType::Hook, internal_id, handler_addr)
    }

    pub fn set_observer_before(&self, internal_id: i64, handler_addr: u64) -> EnumHookState {
        self.process(EnumHookMode::Attach, EnumHookType::ObsBfr, internal_id, handler_addr)
    }

    pub fn set_observer_after(&self, internal_id: i64, handler_addr: u64) -> EnumHookState {
        self.process(EnumHookMode::Attach, EnumHookType::ObsAfr, internal_id, handler_addr)
    }

    pub fn detach(&self, internal_id: i64, handler_addr: u64) -> EnumHookState {
        // hook_type is irrelevant for Detach — HandlerGroup::detach searches all three.
        self.process(EnumHookMode::Detach, EnumHookType::Hook, internal_id, handler_addr)
    }

    /// Detaches every handler this view has attached, stopping at the first failure.
    /// Implemented as a loop over `Detach` requests rather than a dispatched `HookMode`
    /// variant — see DESIGN.md OQ2.
    pub fn detach_all(&self) -> EnumHookState {
        let snapshot: Vec<AttachRecord> = {
            let guard = self.state.lock();
            guard.borrow().attach_list.clone()
        };
        for record in snapshot {
            let result = self.process(
                EnumHookMode::Detach,
                record.hook_type,
                record.func_info.internal_id,
                record.handler_addr,
            );
            if !result.is_done() {
                return result;
            }
        }
        EnumHookState::Done
    }

    /// Entry point for the public attach/detach/detach_all methods: runs the (recursive,
    /// per-view) common processing, then fires the inform fan-out exactly once, from the
    /// originating view up to the root.
    fn process(
        &self,
        mode: EnumHookMode,
        kind: EnumHookType,
        internal_id: i64,
        handler_addr: u64,
    ) -> EnumHookState {
        if handler_addr == 0 {
            return EnumHookState::ErrorInvalidHookAddr;
        }

        let root = self.root();
        if self.atf_signature != root.atf_signature {
            return EnumHookState::ErrorDifferentATFSignature;
        }
        if !self.hook_version.is_compatible(&root.hook_version) {
            return EnumHookState::ErrorDifferentHookVersion;
        }

        let terminal = root.terminal.as_ref().expect("root view always carries a terminal");
        let func_info = terminal.func_infos.func_info(internal_id);
        if !func_info.valid {
            return EnumHookState::ErrorInternal;
        }

        let result = self.process_common(mode, kind, internal_id, handler_addr, &func_info);

        self.inform_chain(&InformRecord {
            mode,
            handler_addr,
            name_path: self.name_path(),
            func_info,
            result,
            hook_type: kind,
        });

        result
    }

    /// Per-view bookkeeping (access check + own attach-list record) that re-runs at
    /// every level of the tree, delegating to the parent until the root installs or
    /// removes the physical handler via its `HandlerGroup`. Mirrors the original's
    /// `attachHandlerFinal`/`detachHandlerFinal` delegating to `parent.processHandler`.
    fn process_common(
        &self,
        mode: EnumHookMode,
        kind: EnumHookType,
        internal_id: i64,
        handler_addr: u64,
        func_info: &atf_reflect::FuncInfo,
    ) -> EnumHookState {
        let guard = self.state.lock();

        match mode {
            EnumHookMode::Attach => {
                if !self.access_flags.allows(kind) {
                    return EnumHookState::ErrorAccess;
                }
                if guard.borrow().attach_list.iter().any(|r| r.handler_addr == handler_addr) {
                    return EnumHookState::ErrorAlreadyExists;
                }
                let delegated = self.delegate(mode, kind, internal_id, handler_addr);
                if delegated.is_done() {
                    let record = AttachRecord {
                        hook_type: kind,
                        handler_addr,
                        func_info: func_info.clone(),
                        name_path: self.name_path(),
                    };
                    guard.borrow_mut().attach_list.push(record);
                }
                delegated
            }
            EnumHookMode::Detach => {
                let had = guard.borrow().attach_list.iter().any(|r| r.handler_addr == handler_addr);
                if !had {
                    return EnumHookState::ErrorNotFound;
                }
                let delegated = self.delegate(mode, kind, internal_id, handler_addr);
                if delegated.is_done() {
                    guard.borrow_mut().attach_list.retain(|r| r.handler_addr != handler_addr);
                }
                delegated
            }
        }
    }

    /// If `self` is a delegating view, recurse into the parent's own `process_common`; if
    /// `self` is the root, touch the function's `HandlerGroup` directly.
    fn delegate(&self, mode: EnumHookMode, kind: EnumHookType, internal_id: i64, handler_addr: u64) -> EnumHookState {
        match (&self.parent, &self.terminal) {
            (Some(parent), None) => {
                let func_info = parent.root().terminal.as_ref().unwrap().func_infos.func_info(internal_id);
                parent.process_common(mode, kind, internal_id, handler_addr, &func_info)
            }
            (None, Some(terminal)) => {
                let group = terminal.group_for(internal_id);
                match mode {
                    EnumHookMode::Attach => {
                        let gate_addr = terminal.entry_points.entry_point(internal_id);
                        let func_addr = terminal.func_infos.func_info(internal_id).address;
                        let req = HookRequestRecord {
                            orig_addr: func_addr,
                            gate_addr,
                        };
                        group.attach(req, terminal.installer.as_ref(), kind, handler_addr)
                    }
                    EnumHookMode::Detach => group.detach(handler_addr),
                }
            }
            _ => unreachable!("a view is either a delegating child or the terminal root, never both/neither"),
        }
    }

    fn inform_chain(&self, record: &InformRecord) {
        if !record.func_info.valid {
            return;
        }
        if let Some(parent) = &self.parent {
            parent.inform_chain(record);
        }
        let guard = self.state.lock();
        let cb = guard.borrow();
        if let Some(f) = &cb.inform {
            f(record);
        }
    }

    /// Human-readable dump of every handler this view has attached, grouped by hook
    /// type, for interactive inspection (`info` REPL command).
    pub fn info_text(&self) -> String {
        let guard = self.state.lock();
        let list = guard.borrow();
        let mut out = String::new();
        out.push_str(&format!("view '{}' ({} attached)\n", self.name, list.attach_list.len()));
        for kind in [EnumHookType::Hook, EnumHookType::ObsBfr, EnumHookType::ObsAfr] {
            let matching: Vec<&AttachRecord> = list
                .attach_list
                .iter()
                .filter(|r| r.hook_type == kind)
                .collect();
            if matching.is_empty() {
                continue;
            }
            out.push_str(&format!("  {}:\n", kind.as_str()));
            for record in matching {
                out.push_str(&format!(
                    "    0x{:x} -> {} [{}]\n",
                    record.handler_addr,
                    record.func_info.name,
                    record.name_path.build()
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atf_reflect::{FuncInfo, HOOK_VERSION};

    struct FixedInstaller {
        valid: bool,
    }
    impl HookInstaller for FixedInstaller {
        fn install(&self, request: HookRequestRecord) -> crate::structs::HookResultRecord {
            crate::structs::HookResultRecord {
                valid: self.valid,
                orig_addr: request.orig_addr,
                gate_addr: request.gate_addr,
                detour_addr: 0xABCD,
            }
        }
    }
    struct FixedEntryPoints;
    impl EntryPointResolver for FixedEntryPoints {
        fn entry_point(&self, internal_id: i64) -> u64 {
            0x9000 + internal_id as u64
        }
    }
    struct FixedFuncInfos {
        count: i64,
    }
    impl FuncInfoResolver for FixedFuncInfos {
        fn func_info(&self, internal_id: i64) -> FuncInfo {
            if internal_id < 0 || internal_id >= self.count {
                return FuncInfo::invalid();
            }
            FuncInfo {
                valid: true,
                internal_id,
                is_static: false,
                is_method: true,
                address: 0x1000 + internal_id as u64,
                name: format!("func{internal_id}"),
            }
        }
    }

    fn make_root(installer_valid: bool, func_count: i64) -> Arc<HookView> {
        HookView::new_root(
            "root",
            EnumHookAccessFlags::ALL_ACCESS,
            1,
            HOOK_VERSION,
            Arc::new(FixedInstaller { valid: installer_valid }),
            Arc::new(FixedEntryPoints),
            Arc::new(FixedFuncInfos { count: func_count }),
        )
    }

    #[test]
    fn set_hook_twice_is_already_exists() {
        let root = make_root(true, 4);
        assert_eq!(root.set_hook(0, 0x100), EnumHookState::Done);
        assert_eq!(root.set_hook(0, 0x100), EnumHookState::ErrorAlreadyExists);
    }

    #[test]
    fn attach_then_detach_clears_handler_list() {
        let root = make_root(true, 4);
        assert_eq!(root.set_hook(0, 0x100), EnumHookState::Done);
        assert_eq!(root.detach(0, 0x100), EnumHookState::Done);
    }

    #[test]
    fn access_denied_when_flags_missing() {
        let root = make_root(true, 4);
        let child = root.create_view("child", EnumHookAccessFlags::empty());
        assert_eq!(child.set_observer_before(0, 0x200), EnumHookState::ErrorAccess);
    }

    #[test]
    fn out_of_range_internal_id_is_internal_error() {
        let root = make_root(true, 1);
        assert_eq!(root.set_hook(99, 0x200), EnumHookState::ErrorInternal);
    }

    #[test]
    fn detach_all_stops_on_first_failure_and_removes_done_ones() {
        let root = make_root(true, 4);
        assert_eq!(root.set_hook(0, 0x100), EnumHookState::Done);
        assert_eq!(root.set_hook(1, 0x200), EnumHookState::Done);
        assert_eq!(root.detach_all(), EnumHookState::Done);
        assert_eq!(root.detach(0, 0x100), EnumHookState::ErrorNotFound);
    }

    #[test]
    fn inform_fires_with_name_path() {
        let root = make_root(true, 4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        root.on_inform(move |rec| seen2.lock().push(rec.name_path.build()));
        let child = root.create_view("child", EnumHookAccessFlags::ALL_ACCESS);
        child.set_hook(0, 0x100);
        assert_eq!(seen.lock().as_slice(), ["root/child".to_string()]);
    }
}
