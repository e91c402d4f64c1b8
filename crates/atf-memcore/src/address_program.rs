use crate::error::ExprError;

/// One step of an [`AddressProgram`], evaluated left-to-right over a running address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Abs(u64),
    AbsModule(u64),
    RelAdd(u64),
    RelSub(u64),
    DeRef,
}

/// An ordered recipe for computing a final address: an absolute or module-relative base
/// plus a sequence of offsets and pointer dereferences. Consecutive `RelAdd` (and
/// `RelSub`) steps are associative — folding `RelAdd(a)` then `RelAdd(b)` gives the same
/// final address as a single `RelAdd(a+b)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressProgram {
    steps: Vec<Step>,
}

impl AddressProgram {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Resets the program to a single absolute-address step.
    pub fn abs(&mut self, value: u64) {
        self.steps.clear();
        self.steps.push(Step::Abs(value));
    }

    /// Resets the program to a single module-relative step.
    pub fn abs_module(&mut self, value: u64) {
        self.steps.clear();
        self.steps.push(Step::AbsModule(value));
    }

    pub fn rel_add(&mut self, value: u64) {
        self.steps.push(Step::RelAdd(value));
    }

    pub fn rel_sub(&mut self, value: u64) {
        self.steps.push(Step::RelSub(value));
    }

    pub fn deref(&mut self) {
        self.steps.push(Step::DeRef);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn extend(&mut self, other: &AddressProgram) {
        self.steps.extend_from_slice(&other.steps);
    }

    /// Evaluates the program. `module_base` seeds `AbsModule` steps; `deref` is called
    /// with the current address for every `DeRef` step and must return the 8 bytes at
    /// that address reinterpreted as a little-endian `u64`.
    pub fn calc_address(
        &self,
        module_base: u64,
        mut deref: impl FnMut(u64) -> Result<u64, ExprError>,
    ) -> Result<u64, ExprError> {
        let mut addr: u64 = 0;
        for step in &self.steps {
            addr = match *step {
                Step::Abs(v) => v,
                Step::AbsModule(v) => module_base.wrapping_add(v),
                Step::RelAdd(v) => addr.wrapping_add(v),
                Step::RelSub(v) => addr.wrapping_sub(v),
                Step::DeRef => deref(addr)?,
            };
        }
        Ok(addr)
    }

    /// Human-readable reconstruction of how the address is built, e.g.
    /// `(ModuleBase + 0x10, + 0x8, deref)`.
    pub fn describe(&self, module_base: u64) -> String {
        let mut parts = Vec::new();
        for step in &self.steps {
            let part = match *step {
                Step::Abs(v) => format!("0x{v:x}"),
                Step::AbsModule(v) => format!("ModuleBase(0x{module_base:x}) + 0x{v:x}"),
                Step::RelAdd(v) => format!("+ 0x{v:x}"),
                Step::RelSub(v) => format!("- 0x{v:x}"),
                Step::DeRef => "deref".to_string(),
            };
            parts.push(part);
        }
        format!("({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_module_adds_base() {
        let mut p = AddressProgram::new();
        p.abs_module(0x10);
        let addr = p.calc_address(0x1000, |_| unreachable!()).unwrap();
        assert_eq!(addr, 0x1010);
    }

    #[test]
    fn consecutive_rel_add_is_associative() {
        let mut a = AddressProgram::new();
        a.abs(0x100);
        a.rel_add(0x10);
        a.rel_add(0x20);

        let mut b = AddressProgram::new();
        b.abs(0x100);
        b.rel_add(0x30);

        let addr_a = a.calc_address(0, |_| unreachable!()).unwrap();
        let addr_b = b.calc_address(0, |_| unreachable!()).unwrap();
        assert_eq!(addr_a, addr_b);
    }

    #[test]
    fn deref_invokes_callback() {
        let mut p = AddressProgram::new();
        p.abs(0x100);
        p.deref();
        p.rel_add(8);
        let addr = p.calc_address(0, |a| {
            assert_eq!(a, 0x100);
            Ok(0x5000)
        });
        assert_eq!(addr.unwrap(), 0x5008);
    }
}
