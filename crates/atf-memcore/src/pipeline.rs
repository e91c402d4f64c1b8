use atf_reflect::ReflectionCatalogue;

use crate::builder::{self, StateKind};
use crate::dumper::{DumpOptions, StructDumper, dump_struct_type, ptr_to_hex};
use crate::error::ExprError;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::remote_reader::RemoteReader;

/// Outcome of evaluating an expression end to end: either the target holds no known
/// storage for it (a bare computed address), or it does and the bytes behind it were
/// read and rendered.
pub enum EvalResult {
    Address(u64),
    Value { addr: u64, rendered: String },
}

impl EvalResult {
    /// The wire/stdout string: a quoted hex address for `Address`, the dumped value
    /// otherwise.
    pub fn into_text(self, json: bool) -> String {
        match self {
            EvalResult::Address(addr) => ptr_to_hex(addr, json),
            EvalResult::Value { rendered, .. } => rendered,
        }
    }
}

/// Compiles `expr`, resolves its address against `module_base`/`reader`, and — for
/// `LValue` results — reads and dumps the target's bytes. Mirrors the original
/// `processStruct()` entry point: lex, parse, build, resolve, (optionally) dump.
pub fn evaluate(
    catalogue: &ReflectionCatalogue,
    reader: &dyn RemoteReader,
    expr: &str,
    module_base: u64,
    base_address_expected: u64,
    opts: DumpOptions,
) -> Result<EvalResult, ExprError> {
    let tokens = tokenize(expr)?;
    let ops = parse(&tokens)?;
    let compiled = builder::build(catalogue, &ops, base_address_expected)?;

    let mut deref_reader = |addr: u64| -> Result<u64, ExprError> {
        let bytes = reader.read(addr, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(buf))
    };
    let addr = compiled.program.calc_address(module_base, &mut deref_reader)?;

    if compiled.kind != StateKind::LValue {
        return Ok(EvalResult::Address(addr));
    }

    let size = compiled.node.size.max(1) as usize;
    let data = reader.read(addr, size)?;
    let dumper = StructDumper::new(catalogue, opts);
    let rendered = dumper.dump(&compiled.node, &data)?;
    Ok(EvalResult::Value { addr, rendered })
}

/// `decltype(expr)`-equivalent: compiles `expr` and reconstructs its type name without
/// touching any process memory.
pub fn describe_type(
    catalogue: &ReflectionCatalogue,
    expr: &str,
    base_address_expected: u64,
) -> Result<String, ExprError> {
    let tokens = tokenize(expr)?;
    let ops = parse(&tokens)?;
    let compiled = builder::build(catalogue, &ops, base_address_expected)?;
    Ok(dump_struct_type(catalogue, &compiled.node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atf_reflect::RawTables;

    const BASE: u64 = 0x1400_0000_0;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn push_u64(buf: &mut Vec<u8>, v: u64) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// `struct Config { int32_t count; }` plus a global `Config gConfig` at
    /// `BASE + 0x100`, backed by a [`crate::remote_reader::FixtureReader`] whose bytes
    /// hold `count == 7`.
    fn make_catalogue() -> (Vec<u32>, Vec<u8>, Vec<&'static str>) {
        let mut blob = Vec::new();
        let mut offsets = vec![0u32];
        let names = vec!["int32_t", "count", "Config", "gConfig"];

        offsets.push(blob.len() as u32);
        blob.push(1);
        push_u32(&mut blob, 0);
        push_u64(&mut blob, 4);

        // id2: DataMemberField "count" of Config -> element int32_t(id1), offset 0
        offsets.push(blob.len() as u32);
        blob.push(8);
        push_u32(&mut blob, 1);
        push_u64(&mut blob, 1);
        push_u64(&mut blob, 0);

        // id3: Struct Config, name 2, size 4, fieldStart=2, fieldCount=1
        offsets.push(blob.len() as u32);
        blob.push(5);
        push_u32(&mut blob, 2);
        push_u64(&mut blob, 4);
        push_u64(&mut blob, 2);
        push_u64(&mut blob, 1);

        // id4: Var gConfig, name 3, element=Config(id3), address = BASE + 0x100, size 4
        offsets.push(blob.len() as u32);
        blob.push(10);
        push_u32(&mut blob, 3);
        push_u64(&mut blob, 3);
        push_u64(&mut blob, BASE + 0x100);
        push_u64(&mut blob, 4);

        (offsets, blob, names)
    }

    #[test]
    fn evaluate_struct_dumps_json() {
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

        let mut data = vec![0u8; 0x104];
        data[0x100..0x104].copy_from_slice(&7i32.to_le_bytes());
        let reader = crate::remote_reader::FixtureReader { base: BASE, data };

        let result = evaluate(&cat, &reader, "gConfig", BASE, BASE, DumpOptions::default()).unwrap();
        let text = result.into_text(true);
        assert_eq!(text, "{\n  \"count\": 7\n}");
    }

    #[test]
    fn evaluate_const_number_is_bare_address() {
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
        let reader = crate::remote_reader::FixtureReader { base: BASE, data: vec![] };

        let result = evaluate(&cat, &reader, "0x2A", BASE, BASE, DumpOptions::default()).unwrap();
        assert_eq!(result.into_text(true), "\"0x000000000000002A\"");
    }
}
