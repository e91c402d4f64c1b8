use atf_reflect::{NodeKind, ReflectionCatalogue, TypeNode};

use crate::error::ExprError;

#[derive(Debug, Clone, Copy)]
enum ScalarRepr {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Char,
}

fn scalar_repr(name: &str) -> Option<(u64, ScalarRepr)> {
    Some(match name {
        "bool" => (1, ScalarRepr::Bool),
        "int8_t" => (1, ScalarRepr::I8),
        "uint8_t" => (1, ScalarRepr::U8),
        "int16_t" => (2, ScalarRepr::I16),
        "uint16_t" => (2, ScalarRepr::U16),
        "int32_t" => (4, ScalarRepr::I32),
        "uint32_t" => (4, ScalarRepr::U32),
        "int64_t" => (8, ScalarRepr::I64),
        "uint64_t" => (8, ScalarRepr::U64),
        "float32_t" => (4, ScalarRepr::F32),
        "float64_t" => (8, ScalarRepr::F64),
        "char" => (1, ScalarRepr::Char),
        "uchar16_t" => (2, ScalarRepr::U16),
        _ => return None,
    })
}

/// Scalar names rendered without quotes in JSON mode; everything else (including 64-bit
/// and 1/2-byte scalars) is quoted. See SPEC_FULL.md §4.4.
fn is_bare_in_json(name: &str) -> bool {
    matches!(name, "int32_t" | "float32_t" | "float64_t")
}

#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub json: bool,
    pub gap: String,
    pub start_level: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            json: true,
            gap: "  ".to_string(),
            start_level: 0,
        }
    }
}

fn json_char(c: u8) -> String {
    match c {
        0..=31 => format!("\\u{c:04x}"),
        b'"' => "\\\"".to_string(),
        b'\\' => "\\\\".to_string(),
        127..=255 => format!("\\u{c:04x}"),
        _ => (c as char).to_string(),
    }
}

fn json_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| json_char(b)).collect()
}

fn quotes_cond(s: &str, apply: bool) -> String {
    if apply { format!("\"{s}\"") } else { s.to_string() }
}

/// `"0x<16 hex digits>"` (quoted iff `json`), used for both pointer fields and a bare
/// address-only result.
pub fn ptr_to_hex(addr: u64, json: bool) -> String {
    quotes_cond(&format!("0x{addr:016X}"), json)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

fn scalar_value_to_string(repr: ScalarRepr, bytes: &[u8]) -> String {
    match repr {
        ScalarRepr::Bool => (bytes.first().copied().unwrap_or(0) != 0).to_string(),
        ScalarRepr::I8 => (bytes.first().copied().unwrap_or(0) as i8).to_string(),
        ScalarRepr::U8 => bytes.first().copied().unwrap_or(0).to_string(),
        ScalarRepr::I16 => i16::from_le_bytes(bytes[..2].try_into().unwrap()).to_string(),
        ScalarRepr::U16 => u16::from_le_bytes(bytes[..2].try_into().unwrap()).to_string(),
        ScalarRepr::I32 => i32::from_le_bytes(bytes[..4].try_into().unwrap()).to_string(),
        ScalarRepr::U32 => u32::from_le_bytes(bytes[..4].try_into().unwrap()).to_string(),
        ScalarRepr::I64 => i64::from_le_bytes(bytes[..8].try_into().unwrap()).to_string(),
        ScalarRepr::U64 => u64::from_le_bytes(bytes[..8].try_into().unwrap()).to_string(),
        ScalarRepr::F32 => f32::from_le_bytes(bytes[..4].try_into().unwrap()).to_string(),
        ScalarRepr::F64 => f64::from_le_bytes(bytes[..8].try_into().unwrap()).to_string(),
        ScalarRepr::Char => (bytes.first().copied().unwrap_or(0) as i8).to_string(),
    }
}

pub struct StructDumper<'a> {
    catalogue: &'a ReflectionCatalogue<'a>,
    opts: DumpOptions,
}

impl<'a> StructDumper<'a> {
    pub fn new(catalogue: &'a ReflectionCatalogue<'a>, opts: DumpOptions) -> Self {
        Self { catalogue, opts }
    }

    fn gap(&self, level: usize) -> String {
        self.opts.gap.repeat(self.opts.start_level + level)
    }

    pub fn dump(&self, node: &TypeNode, data: &[u8]) -> Result<String, ExprError> {
        self.dump_at(node, data, 0)
    }

    fn dump_at(&self, node: &TypeNode, data: &[u8], level: usize) -> Result<String, ExprError> {
        match node.kind {
            NodeKind::Struct | NodeKind::Class | NodeKind::Union => self.dump_aggregate(node, data, level),
            NodeKind::Scalar => self.dump_scalar(node, data),
            NodeKind::Bitfield => self.dump_bitfield(node, data),
            NodeKind::Pointer => Ok(ptr_to_hex(read_u64(data), self.opts.json)),
            NodeKind::Array => self.dump_array(node, data, level),
            NodeKind::Void => Ok("null".to_string()),
            NodeKind::DataMemberField | NodeKind::StaticDataMemberField | NodeKind::Var => {
                let element = self.catalogue.node(node.element_type_id);
                self.dump_at(&element, data, level)
            }
        }
    }

    fn dump_scalar(&self, node: &TypeNode, data: &[u8]) -> Result<String, ExprError> {
        let (size, repr) = scalar_repr(&node.name).ok_or_else(|| ExprError::UnknownScalar(node.name.clone()))?;
        if (size as usize) > data.len() {
            return Err(ExprError::Process(format!(
                "scalar '{}' needs {} bytes, have {}",
                node.name,
                size,
                data.len()
            )));
        }
        let value = scalar_value_to_string(repr, data);
        if !self.opts.json {
            return Ok(value);
        }
        let quote = !is_bare_in_json(&node.name);
        Ok(quotes_cond(&value, quote))
    }

    fn dump_bitfield(&self, node: &TypeNode, data: &[u8]) -> Result<String, ExprError> {
        let element = self.catalogue.node(node.element_type_id);
        let (size, _) = scalar_repr(&element.name).ok_or_else(|| ExprError::UnknownScalar(element.name.clone()))?;
        let raw = read_u64(&data[..(size as usize).min(data.len())]);
        let mask = if node.bits >= 64 { u64::MAX } else { (1u64 << node.bits) - 1 };
        let value = (raw >> node.starting_position) & mask;
        Ok(quotes_cond(&value.to_string(), self.opts.json))
    }

    fn dump_array(&self, node: &TypeNode, data: &[u8], level: usize) -> Result<String, ExprError> {
        let element = self.catalogue.node(node.element_type_id);
        if element.kind == NodeKind::Scalar && element.name == "char" {
            let limit = (node.size as usize).min(data.len());
            let raw = &data[..limit];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let text = &raw[..end];
            return Ok(quotes_cond(&json_string(text), true));
        }

        let count = node.array_count(element.size.max(1));
        let mut items = Vec::new();
        for i in 0..count {
            let start = (i * element.size) as usize;
            let end = (start + element.size as usize).min(data.len());
            if start >= data.len() {
                break;
            }
            items.push(self.dump_at(&element, &data[start..end], level + 1)?);
        }

        if element.kind.is_aggregate() || element.kind == NodeKind::Array {
            let gap = self.gap(level + 1);
            let body = items
                .iter()
                .map(|i| format!("{gap}{i}"))
                .collect::<Vec<_>>()
                .join(",\n");
            Ok(format!("[\n{body}\n{}]", self.gap(level)))
        } else {
            Ok(format!("[{}]", items.join(", ")))
        }
    }

    fn dump_aggregate(&self, node: &TypeNode, data: &[u8], level: usize) -> Result<String, ExprError> {
        let mut fields = Vec::new();
        let mut decode_err = None;
        self.catalogue.each_field(node, |field| {
            if decode_err.is_some() {
                return;
            }
            let element = self.catalogue.node(field.element_type_id);
            let start = field.offset as usize;
            let end = (start + element.size.max(1) as usize).min(data.len());
            if start > data.len() {
                decode_err = Some(ExprError::Process(format!(
                    "field '{}' offset {} beyond buffer of {} bytes",
                    field.name,
                    start,
                    data.len()
                )));
                return;
            }
            match self.dump_at(&element, &data[start..end], level + 1) {
                Ok(rendered) => fields.push((field.name.clone(), rendered)),
                Err(e) => decode_err = Some(e),
            }
        });
        if let Some(err) = decode_err {
            return Err(err);
        }

        let gap = self.gap(level + 1);
        let body = fields
            .iter()
            .map(|(name, value)| format!("{gap}\"{name}\": {value}"))
            .collect::<Vec<_>>()
            .join(",\n");
        Ok(format!("{{\n{body}\n{}}}", self.gap(level)))
    }
}

/// Reconstructs a type's display name: scalars/structs by name, `T*`, `T[N]`, and a
/// `T : {start:bits}` bitfield annotation. Falls back to `{InvalidNode}` for anything
/// that does not resolve.
pub fn dump_struct_type(catalogue: &ReflectionCatalogue, node: &TypeNode) -> String {
    match node.kind {
        NodeKind::Scalar | NodeKind::Struct | NodeKind::Class | NodeKind::Union => node.name.clone(),
        NodeKind::Pointer => {
            let element = catalogue.node(node.element_type_id);
            format!("{}*", dump_struct_type(catalogue, &element))
        }
        NodeKind::Array => {
            let element = catalogue.node(node.element_type_id);
            let count = node.array_count(element.size.max(1));
            format!("{}[{}]", dump_struct_type(catalogue, &element), count)
        }
        NodeKind::Bitfield => {
            let element = catalogue.node(node.element_type_id);
            format!(
                "{} : {{{}:{}}}",
                dump_struct_type(catalogue, &element),
                node.starting_position,
                node.bits
            )
        }
        _ => "{InvalidNode}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use atf_reflect::RawTables;

    use super::*;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn push_u64(buf: &mut Vec<u8>, v: u64) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// id1: Scalar `char`, size 1. id2: Array of id1, size 8 (an 8-byte `char[8]`).
    fn char_array_catalogue() -> (Vec<u32>, Vec<u8>, Vec<&'static str>) {
        let mut blob = Vec::new();
        let mut offsets = vec![0u32];
        let names = vec!["char"];

        offsets.push(blob.len() as u32);
        blob.push(1);
        push_u32(&mut blob, 0);
        push_u64(&mut blob, 1);

        offsets.push(blob.len() as u32);
        blob.push(4);
        push_u64(&mut blob, 1);
        push_u64(&mut blob, 8);

        (offsets, blob, names)
    }

    #[test]
    fn char_array_truncates_at_null_terminator() {
        let (offsets, blob, names) = char_array_catalogue();
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
        let array_node = cat.node(2);
        let dumper = StructDumper::new(&cat, DumpOptions::default());

        // "hi\0junk" — declared size 8, but only "hi" precedes the NUL.
        let rendered = dumper.dump(&array_node, b"hi\0junk\0").unwrap();
        assert_eq!(rendered, "\"hi\"");
    }

    #[test]
    fn json_char_escapes_control_and_high_bytes() {
        assert_eq!(json_char(b'"'), "\\\"");
        assert_eq!(json_char(b'\\'), "\\\\");
        assert_eq!(json_char(7), "\\u0007");
        assert_eq!(json_char(200), "\\u00c8");
        assert_eq!(json_char(b'a'), "a");
    }

    #[test]
    fn int32_is_bare_but_int64_is_quoted() {
        assert!(is_bare_in_json("int32_t"));
        assert!(is_bare_in_json("float32_t"));
        assert!(is_bare_in_json("float64_t"));
        assert!(!is_bare_in_json("int64_t"));
        assert!(!is_bare_in_json("int8_t"));
        assert!(!is_bare_in_json("uint32_t"));
    }

    #[test]
    fn ptr_to_hex_zero_pads_sixteen_digits() {
        assert_eq!(ptr_to_hex(0x2A, false), "0x000000000000002A");
        assert_eq!(ptr_to_hex(0x2A, true), "\"0x000000000000002A\"");
    }
}
