use atf_reflect::{NodeKind, ReflectionCatalogue, SYNTHETIC_ID_BASE, TypeNode};

use crate::address_program::AddressProgram;
use crate::error::ExprError;
use crate::parser::Op;

/// Whether a compiled expression denotes a readable location (`LValue`), a bare computed
/// address with no known storage (`Address`), or a type produced mid-cast (`Type`,
/// never a valid final result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    LValue,
    Address,
    Type,
}

#[derive(Debug, Clone)]
struct ExprState {
    kind: StateKind,
    node: TypeNode,
    program: AddressProgram,
}

/// Result of successfully compiling an expression: its type and the address recipe to
/// reach it. `kind` distinguishes a readable value (`LValue`) from a bare address
/// (`Address`, e.g. a literal number or `&expr`).
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub kind: StateKind,
    pub node: TypeNode,
    pub program: AddressProgram,
}

/// Parses a hex (`0x`/`0X` prefixed) or decimal numeric literal.
pub fn str_to_u64(s: &str) -> Result<u64, ExprError> {
    let lower = s.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("0x") {
        u64::from_str_radix(rest, 16).map_err(|_| ExprError::InvalidNumber(s.to_string()))
    } else {
        lower.parse::<u64>().map_err(|_| ExprError::InvalidNumber(s.to_string()))
    }
}

struct Builder<'a> {
    catalogue: &'a ReflectionCatalogue<'a>,
    base_address_expected: u64,
    next_synthetic_id: u64,
    stack: Vec<ExprState>,
}

impl<'a> Builder<'a> {
    fn new(catalogue: &'a ReflectionCatalogue<'a>, base_address_expected: u64) -> Self {
        Self {
            catalogue,
            base_address_expected,
            next_synthetic_id: SYNTHETIC_ID_BASE,
            stack: Vec::new(),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_synthetic_id;
        self.next_synthetic_id += 1;
        id
    }

    fn synth_pointer(&mut self, element: &TypeNode) -> TypeNode {
        let mut node = TypeNode::invalid();
        node.valid = true;
        node.id = self.next_id();
        node.kind = NodeKind::Pointer;
        node.size = 8;
        node.element_type_id = element.id;
        node
    }

    fn synth_array(&mut self, element: &TypeNode, count: u64) -> TypeNode {
        let mut node = TypeNode::invalid();
        node.valid = true;
        node.id = self.next_id();
        node.kind = NodeKind::Array;
        node.size = count * element.size;
        node.element_type_id = element.id;
        node
    }

    fn element_of(&self, node: &TypeNode) -> TypeNode {
        self.catalogue.node(node.element_type_id)
    }

    fn apply(&mut self, op: &Op) -> Result<(), ExprError> {
        match op {
            Op::GlobalIdent(name) => self.op_global_ident(name),
            Op::ConstNumber(raw) => self.op_const_number(raw),
            Op::FetchMember(name) => {
                let mut state = self.pop()?;
                self.fetch_member(&mut state, name)?;
                self.stack.push(state);
                Ok(())
            }
            Op::FetchMemberDeRef(name) => {
                let mut state = self.pop()?;
                self.fetch_member_deref(&mut state, name)?;
                self.stack.push(state);
                Ok(())
            }
            Op::FetchArray(raw) => {
                let mut state = self.pop()?;
                self.fetch_array(&mut state, raw)?;
                self.stack.push(state);
                Ok(())
            }
            Op::TypePointer => {
                let mut state = self.pop()?;
                if state.kind != StateKind::Type {
                    return Err(ExprError::InvalidCast);
                }
                let element = state.node.clone();
                state.node = self.synth_pointer(&element);
                self.stack.push(state);
                Ok(())
            }
            Op::GetRef => {
                let mut state = self.pop()?;
                if state.kind != StateKind::LValue {
                    return Err(ExprError::InvalidGetRef);
                }
                let element = state.node.clone();
                state.node = self.synth_pointer(&element);
                state.kind = StateKind::Address;
                self.stack.push(state);
                Ok(())
            }
            Op::DeRef => {
                let mut state = self.pop()?;
                if state.node.kind != NodeKind::Pointer {
                    return Err(ExprError::InvalidDeref);
                }
                if state.kind == StateKind::LValue {
                    state.program.deref();
                }
                state.node = self.element_of(&state.node);
                state.kind = StateKind::LValue;
                self.stack.push(state);
                Ok(())
            }
            Op::ReinterpretCast => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                if lhs.kind != StateKind::Type || lhs.node.kind != NodeKind::Pointer {
                    return Err(ExprError::InvalidCast);
                }
                if rhs.kind == StateKind::Type {
                    return Err(ExprError::InvalidCast);
                }
                let mut result = rhs;
                result.node = lhs.node;
                self.stack.push(result);
                Ok(())
            }
            Op::Decltype => {
                let mut state = self.pop()?;
                if state.kind == StateKind::Type {
                    return Err(ExprError::InvalidCast);
                }
                state.kind = StateKind::Type;
                self.stack.push(state);
                Ok(())
            }
        }
    }

    fn pop(&mut self) -> Result<ExprState, ExprError> {
        self.stack.pop().ok_or(ExprError::InvalidExprShape)
    }

    fn op_global_ident(&mut self, name: &str) -> Result<(), ExprError> {
        let node = self
            .catalogue
            .node_by_name(name)
            .ok_or_else(|| ExprError::IdentNotFound(name.to_string()))?;

        let mut state = ExprState {
            kind: StateKind::Type,
            node: node.clone(),
            program: AddressProgram::new(),
        };

        if matches!(node.kind, NodeKind::Var | NodeKind::StaticDataMemberField) {
            let element = self.element_of(&node);
            state.node = element;
            state.kind = StateKind::LValue;
            state
                .program
                .abs_module(node.address.wrapping_sub(self.base_address_expected));
        }

        self.stack.push(state);
        Ok(())
    }

    fn op_const_number(&mut self, raw: &str) -> Result<(), ExprError> {
        let value = str_to_u64(raw)?;
        let mut program = AddressProgram::new();
        program.abs(value);
        self.stack.push(ExprState {
            kind: StateKind::Address,
            node: TypeNode::invalid(),
            program,
        });
        Ok(())
    }

    fn find_field(&self, node: &TypeNode, name: &str) -> Option<TypeNode> {
        let mut found = None;
        self.catalogue.each_field(node, |f| {
            if found.is_none() && f.name == name {
                found = Some(f);
            }
        });
        found
    }

    fn fetch_member(&mut self, state: &mut ExprState, name: &str) -> Result<(), ExprError> {
        if state.kind != StateKind::LValue {
            return Err(ExprError::InvalidFetchMember);
        }
        if !state.node.kind.is_aggregate() {
            return Err(ExprError::InvalidFetchMember);
        }
        let field = self
            .find_field(&state.node, name)
            .ok_or_else(|| ExprError::FieldNotFound(name.to_string()))?;
        state.program.rel_add(field.offset);
        state.node = self.element_of(&field);
        Ok(())
    }

    fn fetch_member_deref(&mut self, state: &mut ExprState, name: &str) -> Result<(), ExprError> {
        if state.node.kind != NodeKind::Pointer {
            return Err(ExprError::InvalidFetchMemberDeref);
        }
        if state.kind == StateKind::LValue {
            state.program.deref();
        }
        state.node = self.element_of(&state.node);
        state.kind = StateKind::LValue;
        // Intentional fall-through into the FetchMember behaviour, matching the
        // original's un-`break`ed switch case.
        self.fetch_member(state, name)
    }

    fn fetch_array(&mut self, state: &mut ExprState, raw: &str) -> Result<(), ExprError> {
        if state.kind == StateKind::Type {
            let index = str_to_u64(raw)?;
            let element = state.node.clone();
            state.node = self.synth_array(&element, index);
            return Ok(());
        }

        match state.node.kind {
            NodeKind::Array => {
                let element = self.element_of(&state.node);
                let count = state.node.array_count(element.size.max(1));
                let index = str_to_u64(raw)?;
                if index >= count {
                    return Err(ExprError::InvalidFetchArrayIndex { index, count });
                }
                state.program.rel_add(index * element.size);
                state.node = element;
                Ok(())
            }
            NodeKind::Pointer => {
                let element = self.element_of(&state.node);
                let index = str_to_u64(raw)?;
                if state.kind == StateKind::LValue {
                    state.program.deref();
                }
                state.program.rel_add(index * element.size);
                state.node = element;
                state.kind = StateKind::LValue;
                Ok(())
            }
            _ => Err(ExprError::InvalidFetchArrayTarget),
        }
    }

    fn finish(mut self) -> Result<CompiledExpr, ExprError> {
        let state = self.stack.pop().ok_or(ExprError::InvalidExprShape)?;
        if !self.stack.is_empty() {
            return Err(ExprError::InvalidExprShape);
        }
        if state.kind == StateKind::Type {
            return Err(ExprError::FinalIsType);
        }
        Ok(CompiledExpr {
            kind: state.kind,
            node: state.node,
            program: state.program,
        })
    }
}

/// Folds a parsed opcode list into a [`CompiledExpr`] against `catalogue`.
/// `base_address_expected` is subtracted from `Var`/`StaticDataMemberField` addresses
/// before the target's actual module base is added back in at evaluation time.
pub fn build(
    catalogue: &ReflectionCatalogue,
    ops: &[Op],
    base_address_expected: u64,
) -> Result<CompiledExpr, ExprError> {
    let mut builder = Builder::new(catalogue, base_address_expected);
    for op in ops {
        builder.apply(op)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use atf_reflect::RawTables;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn push_u64(buf: &mut Vec<u8>, v: u64) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Builds a small catalogue: `struct Config { int32_t count; Item items[4]; }`,
    /// a global `Config gConfig` at address `BASE + 0x100`, where `BASE` is the
    /// test's `base_address_expected`.
    fn make_catalogue() -> (Vec<u32>, Vec<u8>, Vec<&'static str>) {
        let mut blob = Vec::new();
        let mut offsets = vec![0u32];
        let names = vec!["int32_t", "count", "Item", "items", "Config", "gConfig"];

        // id1: Scalar int32_t, size 4, name 0
        offsets.push(blob.len() as u32);
        blob.push(1);
        push_u32(&mut blob, 0);
        push_u64(&mut blob, 4);

        // id2: Struct Item, name 2, size 4, fieldStart=3, fieldCount=0 (no sub-fields needed)
        offsets.push(blob.len() as u32);
        blob.push(5);
        push_u32(&mut blob, 2);
        push_u64(&mut blob, 4);
        push_u64(&mut blob, 3);
        push_u64(&mut blob, 0);

        // id3: unused placeholder field slot (DataMemberField "count" of Config, element 1, offset 0) — placed here
        // so Config's fieldStart(=3) .. +2 covers ids 3 and 4.
        offsets.push(blob.len() as u32);
        blob.push(8);
        push_u32(&mut blob, 1);
        push_u64(&mut blob, 1);
        push_u64(&mut blob, 0);

        // id4: DataMemberField "items" of Config -> element = Array(id5), offset 4
        offsets.push(blob.len() as u32);
        blob.push(8);
        push_u32(&mut blob, 3);
        push_u64(&mut blob, 5);
        push_u64(&mut blob, 4);

        // id5: Array of Item(id2), size 16 (4 * 4)
        offsets.push(blob.len() as u32);
        blob.push(4);
        push_u64(&mut blob, 2);
        push_u64(&mut blob, 16);

        // id6: Struct Config, name 4, size 20, fieldStart=3, fieldCount=2 (ids 3,4)
        offsets.push(blob.len() as u32);
        blob.push(5);
        push_u32(&mut blob, 4);
        push_u64(&mut blob, 20);
        push_u64(&mut blob, 3);
        push_u64(&mut blob, 2);

        // id7: Var gConfig, name 5, element=Config(id6), address = BASE + 0x100, size 20
        offsets.push(blob.len() as u32);
        blob.push(10);
        push_u32(&mut blob, 5);
        push_u64(&mut blob, 6);
        push_u64(&mut blob, BASE + 0x100);
        push_u64(&mut blob, 20);

        (offsets, blob, names)
    }

    const BASE: u64 = 0x1400_0000_0;

    fn compile_str(code: &str) -> Result<CompiledExpr, ExprError> {
        let (offsets, blob, names) = make_catalogue();
        let tables = RawTables {
            func_address: &[],
            func_name: &[],
            func_is_static: &[],
            func_is_method: &[],
            node_offsets: &offsets,
            node_blob: &blob,
            node_names: &names,
        };
        let cat = ReflectionCatalogue::new(tables);
        let tokens = tokenize(code).unwrap();
        let ops = parse(&tokens).unwrap();
        build(&cat, &ops, BASE)
    }

    #[test]
    fn const_number_is_address_kind() {
        let result = compile_str("42").unwrap();
        assert_eq!(result.kind, StateKind::Address);
        let addr = result.program.calc_address(0, |_| unreachable!()).unwrap();
        assert_eq!(addr, 42);
    }

    #[test]
    fn global_member_resolves_offset() {
        let result = compile_str("gConfig.count").unwrap();
        assert_eq!(result.kind, StateKind::LValue);
        assert_eq!(result.node.name, "int32_t");
        let addr = result.program.calc_address(BASE, |_| unreachable!()).unwrap();
        assert_eq!(addr, BASE + 0x100);
    }

    #[test]
    fn array_out_of_range_matches_wire_error_format() {
        let err = compile_str("gConfig.items[5]").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid fetch array, invalid index [5], have array count 4."
        );
    }

    #[test]
    fn array_in_range_adds_offset() {
        let result = compile_str("gConfig.items[2]").unwrap();
        let addr = result.program.calc_address(BASE, |_| unreachable!()).unwrap();
        assert_eq!(addr, BASE + 0x100 + 4 /*items offset*/ + 2 * 4 /*element size*/);
    }

    #[test]
    fn address_of_global_is_address_kind_pointer() {
        let result = compile_str("&gConfig").unwrap();
        assert_eq!(result.kind, StateKind::Address);
        assert_eq!(result.node.kind, NodeKind::Pointer);

        let addr = result.program.calc_address(BASE, |_| unreachable!("no deref expected")).unwrap();
        assert_eq!(addr, BASE + 0x100);
    }

    #[test]
    fn decltype_alone_is_rejected() {
        let err = compile_str("decltype(gConfig)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid expr(final is type, expected l-value/address)."
        );
    }

    #[test]
    fn unknown_ident_errors() {
        let err = compile_str("gDoesNotExist").unwrap_err();
        assert_eq!(err.to_string(), "Global ident 'gDoesNotExist' not found");
    }
}
