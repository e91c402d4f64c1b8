/// Result of a single attach/detach attempt. Note that the numeric value `2` is
/// deliberately unused, mirroring the reflection exporter's own `EnumHookState` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumHookState {
    Done = 0,
    ErrorInternal = 1,
    ErrorAlreadyExists = 3,
    ErrorNotFound = 4,
    ErrorInvalidHookAddr = 5,
    ErrorAccess = 6,
    ErrorDifferentATFSignature = 7,
    ErrorDifferentHookVersion = 8,
}

impl EnumHookState {
    pub fn is_done(self) -> bool {
        matches!(self, EnumHookState::Done)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnumHookState::Done => "Done",
            EnumHookState::ErrorInternal => "ErrorInternal",
            EnumHookState::ErrorAlreadyExists => "ErrorAlreadyExists",
            EnumHookState::ErrorNotFound => "ErrorNotFound",
            EnumHookState::ErrorInvalidHookAddr => "ErrorInvalidHookAddr",
            EnumHookState::ErrorAccess => "ErrorAccess",
            EnumHookState::ErrorDifferentATFSignature => "ErrorDifferentATFSignature",
            EnumHookState::ErrorDifferentHookVersion => "ErrorDifferentHookVersion",
        }
    }
}

/// Requested direction of a process request. `DetachAll` is intentionally absent here —
/// see `HookView::detach_all`, which loops over `Detach` requests rather than threading a
/// third mode through this processing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumHookMode {
    Attach,
    Detach,
}

/// Which of a function's three handler lists a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumHookType {
    Hook,
    ObsBfr,
    ObsAfr,
}

impl EnumHookType {
    pub fn as_str(self) -> &'static str {
        match self {
            EnumHookType::Hook => "Hook",
            EnumHookType::ObsBfr => "ObsBfr",
            EnumHookType::ObsAfr => "ObsAfr",
        }
    }
}

bitflags::bitflags! {
    /// Which hook types a view is permitted to attach. Child views may only narrow, never
    /// widen, what their parent allows — enforcement is the caller's responsibility when
    /// constructing the tree, `HookView::process` only checks its own flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnumHookAccessFlags: u32 {
        const ATTACH_HOOK    = 1 << 0;
        const ATTACH_OBS_BFR = 1 << 1;
        const ATTACH_OBS_AFR = 1 << 2;
        const ALL_ACCESS = Self::ATTACH_HOOK.bits() | Self::ATTACH_OBS_BFR.bits() | Self::ATTACH_OBS_AFR.bits();
    }
}

impl EnumHookAccessFlags {
    pub fn allows(self, kind: EnumHookType) -> bool {
        match kind {
            EnumHookType::Hook => self.contains(EnumHookAccessFlags::ATTACH_HOOK),
            EnumHookType::ObsBfr => self.contains(EnumHookAccessFlags::ATTACH_OBS_BFR),
            EnumHookType::ObsAfr => self.contains(EnumHookAccessFlags::ATTACH_OBS_AFR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_flags_gate_per_kind() {
        let flags = EnumHookAccessFlags::ATTACH_HOOK;
        assert!(flags.allows(EnumHookType::Hook));
        assert!(!flags.allows(EnumHookType::ObsBfr));
    }

    #[test]
    fn all_access_allows_everything() {
        let flags = EnumHookAccessFlags::ALL_ACCESS;
        assert!(flags.allows(EnumHookType::Hook));
        assert!(flags.allows(EnumHookType::ObsBfr));
        assert!(flags.allows(EnumHookType::ObsAfr));
    }
}
