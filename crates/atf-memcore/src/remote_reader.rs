use crate::error::ExprError;

/// Reads raw bytes out of some process's address space. The wire server only ever needs
/// this much; how a given implementation locates the target (pid lookup, module base,
/// `ptrace` attach, ...) is its own business.
pub trait RemoteReader {
    fn read(&self, addr: u64, size: usize) -> Result<Vec<u8>, ExprError>;

    /// Base load address of the named module inside the target process, or `0` if the
    /// reader has no notion of modules (single flat address space).
    fn module_base(&self, module: &str) -> Result<u64, ExprError>;
}

#[cfg(target_os = "linux")]
pub mod linux {
    use std::fs;

    use nix::sys::uio::{RemoteIoVec, process_vm_readv};
    use nix::unistd::Pid;

    use super::RemoteReader;
    use crate::error::ExprError;

    /// Reads a target process's memory via `process_vm_readv`, the same syscall
    /// `ptrace`-based debuggers use to avoid `/proc/<pid>/mem` seek+read overhead.
    pub struct LinuxRemoteReader {
        pid: Pid,
    }

    impl LinuxRemoteReader {
        pub fn attach(pid: i32) -> Self {
            Self { pid: Pid::from_raw(pid) }
        }

        /// Finds a running process by exact `/proc/<pid>/comm` match. Returns the first
        /// match found while scanning `/proc` in directory-listing order.
        pub fn find_by_name(name: &str) -> Result<Self, ExprError> {
            let entries = fs::read_dir("/proc").map_err(|e| ExprError::Process(e.to_string()))?;
            for entry in entries.flatten() {
                let Ok(pid) = entry.file_name().to_string_lossy().parse::<i32>() else {
                    continue;
                };
                let comm_path = entry.path().join("comm");
                if let Ok(comm) = fs::read_to_string(&comm_path) {
                    if comm.trim_end() == name {
                        return Ok(Self::attach(pid));
                    }
                }
            }
            Err(ExprError::Process(format!("no process named '{name}' found")))
        }

        fn maps_base(&self, module: &str) -> Result<u64, ExprError> {
            let path = format!("/proc/{}/maps", self.pid.as_raw());
            let contents = fs::read_to_string(&path).map_err(|e| ExprError::Process(e.to_string()))?;
            for line in contents.lines() {
                if !line.ends_with(module) {
                    continue;
                }
                let range = line.split_whitespace().next().unwrap_or_default();
                let start = range.split('-').next().unwrap_or_default();
                let base = u64::from_str_radix(start, 16).map_err(|_| {
                    ExprError::Process(format!("unparsable maps line for '{module}'"))
                })?;
                return Ok(base);
            }
            Err(ExprError::Process(format!("module '{module}' not mapped in target process")))
        }
    }

    impl RemoteReader for LinuxRemoteReader {
        fn read(&self, addr: u64, size: usize) -> Result<Vec<u8>, ExprError> {
            let mut buf = vec![0u8; size];
            let local = [std::io::IoSliceMut::new(&mut buf)];
            let remote = [RemoteIoVec {
                base: addr as usize,
                len: size,
            }];
            let read = process_vm_readv(self.pid, &local, &remote).map_err(|e| {
                ExprError::Read {
                    addr,
                    size,
                    text: e.to_string(),
                }
            })?;
            if read != size {
                return Err(ExprError::Read {
                    addr,
                    size,
                    text: format!("short read: got {read} of {size} bytes"),
                });
            }
            Ok(buf)
        }

        fn module_base(&self, module: &str) -> Result<u64, ExprError> {
            self.maps_base(module)
        }
    }
}

/// An in-memory stand-in for [`RemoteReader`], used in tests and anywhere a live process
/// is unavailable (e.g. compiling expressions offline for `--dump-json` previews).
pub struct FixtureReader {
    pub base: u64,
    pub data: Vec<u8>,
}

impl RemoteReader for FixtureReader {
    fn read(&self, addr: u64, size: usize) -> Result<Vec<u8>, ExprError> {
        let Some(offset) = addr.checked_sub(self.base) else {
            return Err(ExprError::Read {
                addr,
                size,
                text: "address below fixture base".to_string(),
            });
        };
        let start = offset as usize;
        let end = start + size;
        self.data.get(start..end).map(|s| s.to_vec()).ok_or_else(|| ExprError::Read {
            addr,
            size,
            text: "address out of fixture bounds".to_string(),
        })
    }

    fn module_base(&self, _module: &str) -> Result<u64, ExprError> {
        Ok(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_reads_in_bounds_slice() {
        let reader = FixtureReader {
            base: 0x1000,
            data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        assert_eq!(reader.read(0x1002, 3).unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn fixture_read_out_of_bounds_errors() {
        let reader = FixtureReader {
            base: 0x1000,
            data: vec![1, 2, 3, 4],
        };
        let err = reader.read(0x1000, 100).unwrap_err();
        assert!(matches!(err, ExprError::Read { .. }));
    }
}
