use serde::{Deserialize, Serialize};

/// The hook-protocol version a view's terminal implementation understands.
///
/// Two versions are considered compatible when `major` and `minor` match; `build` is
/// informational only (mirrors the upstream reflection exporter's own versioning, which
/// never gates compatibility on patch/build numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, build: u16) -> Self {
        Self { major, minor, build }
    }

    pub fn is_compatible(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Hook-wire protocol version implemented by this crate's `atf-hook` companion.
pub const HOOK_VERSION: Version = Version::new(0, 1, 1);
