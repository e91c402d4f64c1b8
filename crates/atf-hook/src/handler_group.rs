use parking_lot::Mutex;

use crate::constants::{EnumHookState, EnumHookType};
use crate::handler_list::HandlerList;
use crate::installer::HookInstaller;
use crate::structs::{HookRequestRecord, HookResultRecord};

/// Per-function state: the three handler lists plus the (lazily installed) physical
/// detour. All mutation happens under `mutex`; the `HandlerList`s themselves allow
/// lock-free reads for the dispatch path.
pub struct HandlerGroup {
    mutex: Mutex<GroupState>,
    pub hook: HandlerList,
    pub obs_bfr: HandlerList,
    pub obs_afr: HandlerList,
}

struct GroupState {
    detour: Option<HookResultRecord>,
}

impl HandlerGroup {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(GroupState { detour: None }),
            hook: HandlerList::new(),
            obs_bfr: HandlerList::new(),
            obs_afr: HandlerList::new(),
        }
    }

    fn list_for(&self, kind: EnumHookType) -> &HandlerList {
        match kind {
            EnumHookType::Hook => &self.hook,
            EnumHookType::ObsBfr => &self.obs_bfr,
            EnumHookType::ObsAfr => &self.obs_afr,
        }
    }

    /// Attaches `handler_addr` under `kind`, installing the physical detour first if this
    /// is the function's first attach.
    ///
    /// Ordering fix (see DESIGN.md OQ1): the installer is invoked *before* any list is
    /// mutated, and the resulting `detour_addr` is only recorded once the installer
    /// reports success. On installer failure, or if `handler_addr` is already attached
    /// under any of the three lists, no list is touched.
    pub fn attach(
        &self,
        req: HookRequestRecord,
        installer: &dyn HookInstaller,
        kind: EnumHookType,
        handler_addr: u64,
    ) -> EnumHookState {
        let mut state = self.mutex.lock();

        if self.hook.has(handler_addr) || self.obs_bfr.has(handler_addr) || self.obs_afr.has(handler_addr) {
            return EnumHookState::ErrorAlreadyExists;
        }

        if state.detour.is_none() {
            let result = installer.install(req);
            if !result.valid {
                return EnumHookState::ErrorInvalidHookAddr;
            }
            state.detour = Some(result);
        }

        let list = self.list_for(kind);
        list.push_front(handler_addr);
        EnumHookState::Done
    }

    pub fn detach(&self, handler_addr: u64) -> EnumHookState {
        let _state = self.mutex.lock();
        for kind in [EnumHookType::Hook, EnumHookType::ObsBfr, EnumHookType::ObsAfr] {
            if self.list_for(kind).remove(handler_addr) {
                return EnumHookState::Done;
            }
        }
        EnumHookState::ErrorNotFound
    }

    pub fn is_installed(&self) -> bool {
        self.mutex.lock().detour.is_some()
    }
}

impl Default for HandlerGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeInstaller {
        valid: bool,
    }

    impl HookInstaller for FakeInstaller {
        fn install(&self, request: HookRequestRecord) -> HookResultRecord {
            HookResultRecord {
                valid: self.valid,
                orig_addr: request.orig_addr,
                gate_addr: request.gate_addr,
                detour_addr: if self.valid { 0xDEAD_BEEF } else { 0 },
            }
        }
    }

    fn req() -> HookRequestRecord {
        HookRequestRecord {
            orig_addr: 0x1000,
            gate_addr: 0x2000,
        }
    }

    #[test]
    fn attach_then_detach_round_trips() {
        let group = HandlerGroup::new();
        let installer = FakeInstaller { valid: true };

        let r = group.attach(req(), &installer, EnumHookType::Hook, 0x3000);
        assert_eq!(r, EnumHookState::Done);
        assert!(group.hook.has(0x3000));
        assert!(group.is_installed());

        assert_eq!(group.detach(0x3000), EnumHookState::Done);
        assert!(group.hook.is_empty());
    }

    #[test]
    fn duplicate_handler_rejected_without_touching_lists() {
        let group = HandlerGroup::new();
        let installer = FakeInstaller { valid: true };
        assert_eq!(
            group.attach(req(), &installer, EnumHookType::Hook, 0x3000),
            EnumHookState::Done
        );
        assert_eq!(
            group.attach(req(), &installer, EnumHookType::ObsBfr, 0x3000),
            EnumHookState::ErrorAlreadyExists
        );
        assert!(!group.obs_bfr.has(0x3000));
    }

    #[test]
    fn failed_installer_leaves_no_entry_anywhere() {
        let group = HandlerGroup::new();
        let installer = FakeInstaller { valid: false };
        let r = group.attach(req(), &installer, EnumHookType::Hook, 0x3000);
        assert_eq!(r, EnumHookState::ErrorInvalidHookAddr);
        assert!(group.hook.is_empty());
        assert!(!group.is_installed());
    }

    #[test]
    fn detach_unknown_returns_not_found() {
        let group = HandlerGroup::new();
        assert_eq!(group.detach(0x9999), EnumHookState::ErrorNotFound);
    }
}
