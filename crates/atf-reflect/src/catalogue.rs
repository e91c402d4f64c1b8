use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::ReflectError;
use crate::func_info::{FuncInfo, get_bit};
use crate::type_node::{NodeKind, TypeNode};

/// Read-only tables produced by the reflection exporter and linked into the target
/// binary. `node_blob`/`node_offsets` hold the packed type-node graph; `node_names` is a
/// flat string table addressed by the `u32` name IDs embedded in the blob.
#[derive(Debug, Clone, Copy)]
pub struct RawTables<'a> {
    pub func_address: &'a [u64],
    pub func_name: &'a [&'a str],
    pub func_is_static: &'a [u64],
    pub func_is_method: &'a [u64],
    pub node_offsets: &'a [u32],
    pub node_blob: &'a [u8],
    pub node_names: &'a [&'a str],
}

/// Decodes the function and type-node tables on demand. Immutable after construction,
/// save for a lazily built name→node map guarded by a mutex, so it can be shared freely
/// across reader/worker threads.
pub struct ReflectionCatalogue<'a> {
    tables: RawTables<'a>,
    names_by_node: Mutex<Option<HashMap<String, u64>>>,
}

impl<'a> ReflectionCatalogue<'a> {
    pub fn new(tables: RawTables<'a>) -> Self {
        Self {
            tables,
            names_by_node: Mutex::new(None),
        }
    }

    pub fn func_count(&self) -> i64 {
        self.tables.func_address.len() as i64
    }

    pub fn func_info(&self, internal_id: i64) -> FuncInfo {
        if internal_id < 0 || internal_id >= self.func_count() {
            return FuncInfo::invalid();
        }
        let idx = internal_id as usize;
        FuncInfo {
            valid: true,
            internal_id,
            is_static: get_bit(self.tables.func_is_static, internal_id),
            is_method: get_bit(self.tables.func_is_method, internal_id),
            address: self.tables.func_address[idx],
            name: self
                .tables
                .func_name
                .get(idx)
                .map(|s| s.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn each_func(&self, mut f: impl FnMut(&FuncInfo)) {
        for id in 0..self.func_count() {
            let info = self.func_info(id);
            if info.valid {
                f(&info);
            }
        }
    }

    pub fn node_count(&self) -> u64 {
        self.tables.node_offsets.len() as u64
    }

    /// Decodes the node at `node_id`, or returns `{valid: false}` for `0` / out-of-range.
    pub fn node(&self, node_id: u64) -> TypeNode {
        if node_id == 0 || node_id >= self.node_count() {
            return TypeNode::invalid();
        }
        match self.decode_node(node_id) {
            Ok(node) => node,
            Err(_) => TypeNode::invalid(),
        }
    }

    /// Same as [`Self::node`] but surfaces the decode error instead of collapsing it to
    /// an invalid node; used by callers that want to distinguish "no such id" from
    /// "corrupt blob".
    pub fn try_node(&self, node_id: u64) -> Result<TypeNode, ReflectError> {
        if node_id == 0 || node_id >= self.node_count() {
            return Ok(TypeNode::invalid());
        }
        self.decode_node(node_id)
    }

    fn decode_node(&self, node_id: u64) -> Result<TypeNode, ReflectError> {
        let offset = self.tables.node_offsets[node_id as usize] as usize;
        let blob = self.tables.node_blob;
        let mut cur = Cursor::new(blob, offset);

        let tag = cur.u8(node_id, offset as u32)?;
        let kind = match tag {
            0 => NodeKind::Void,
            1 => NodeKind::Scalar,
            2 => NodeKind::Bitfield,
            3 => NodeKind::Pointer,
            4 => NodeKind::Array,
            5 => NodeKind::Struct,
            6 => NodeKind::Class,
            7 => NodeKind::Union,
            8 => NodeKind::DataMemberField,
            9 => NodeKind::StaticDataMemberField,
            10 => NodeKind::Var,
            other => {
                return Err(ReflectError::UnknownNodeKind {
                    id: node_id,
                    tag: other,
                });
            }
        };

        let mut node = TypeNode::invalid();
        node.valid = true;
        node.id = node_id;
        node.kind = kind;

        match kind {
            NodeKind::Void => {
                let name_id = cur.u32(node_id)?;
                node.name = self.name_at(name_id);
            }
            NodeKind::Scalar => {
                let name_id = cur.u32(node_id)?;
                node.size = cur.u64(node_id)?;
                node.name = self.name_at(name_id);
            }
            NodeKind::Bitfield => {
                node.element_type_id = cur.u64(node_id)?;
                node.starting_position = cur.u32(node_id)?;
                node.bits = cur.u32(node_id)?;
            }
            NodeKind::Pointer | NodeKind::Array => {
                node.element_type_id = cur.u64(node_id)?;
                node.size = cur.u64(node_id)?;
            }
            NodeKind::Struct | NodeKind::Class | NodeKind::Union => {
                let name_id = cur.u32(node_id)?;
                node.size = cur.u64(node_id)?;
                node.field_start_id = cur.u64(node_id)?;
                node.field_count = cur.u64(node_id)?;
                node.name = self.name_at(name_id);
            }
            NodeKind::DataMemberField => {
                let name_id = cur.u32(node_id)?;
                node.element_type_id = cur.u64(node_id)?;
                node.offset = cur.u64(node_id)?;
                node.name = self.name_at(name_id);
            }
            NodeKind::StaticDataMemberField | NodeKind::Var => {
                let name_id = cur.u32(node_id)?;
                node.element_type_id = cur.u64(node_id)?;
                node.address = cur.u64(node_id)?;
                node.size = cur.u64(node_id)?;
                node.name = self.name_at(name_id);
            }
        }

        Ok(node)
    }

    fn name_at(&self, name_id: u32) -> String {
        self.tables
            .node_names
            .get(name_id as usize)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    /// Iterates fields of a Struct/Class/Union node only; a no-op on any other kind.
    pub fn each_field(&self, node: &TypeNode, mut f: impl FnMut(TypeNode)) {
        if !node.kind.is_aggregate() {
            return;
        }
        for id in node.field_start_id..(node.field_start_id + node.field_count) {
            let field = self.node(id);
            if field.valid {
                f(field);
            }
        }
    }

    pub fn each_node(&self, mut f: impl FnMut(TypeNode)) {
        for id in 1..self.node_count() {
            let node = self.node(id);
            if node.valid {
                f(node);
            }
        }
    }

    /// Lazily builds and caches the name→node-id map over all nodes with a non-empty
    /// name. Subsequent calls reuse the cached map.
    pub fn node_by_name(&self, name: &str) -> Option<TypeNode> {
        let mut guard = self.names_by_node.lock();
        if guard.is_none() {
            let mut map = HashMap::new();
            self.each_node(|n| {
                if !n.name.is_empty() {
                    map.entry(n.name.clone()).or_insert(n.id);
                }
            });
            *guard = Some(map);
        }
        guard
            .as_ref()
            .and_then(|m| m.get(name))
            .map(|&id| self.node(id))
    }
}

struct Cursor<'a> {
    blob: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(blob: &'a [u8], pos: usize) -> Self {
        Self { blob, pos }
    }

    fn take(&mut self, n: usize, id: u64) -> Result<&'a [u8], ReflectError> {
        if self.pos + n > self.blob.len() {
            return Err(ReflectError::BlobTruncated {
                id,
                offset: self.pos as u32,
            });
        }
        let slice = &self.blob[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, id: u64, _offset: u32) -> Result<u8, ReflectError> {
        Ok(self.take(1, id)?[0])
    }

    fn u32(&mut self, id: u64) -> Result<u32, ReflectError> {
        let bytes: [u8; 4] = self.take(4, id)?.try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    fn u64(&mut self, id: u64) -> Result<u64, ReflectError> {
        let bytes: [u8; 8] = self.take(8, id)?.try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn push_u64(buf: &mut Vec<u8>, v: u64) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn sample_tables() -> (Vec<u32>, Vec<u8>) {
        let mut blob = Vec::new();
        let mut offsets = vec![0u32]; // id 0 unused

        // id 1: Scalar "int32_t" size 4
        offsets.push(blob.len() as u32);
        blob.push(1);
        push_u32(&mut blob, 0); // name id 0 -> "int32_t"
        push_u64(&mut blob, 4);

        // id 2: DataMemberField "count" -> element 1, offset 0
        offsets.push(blob.len() as u32);
        blob.push(8);
        push_u32(&mut blob, 1); // name id 1 -> "count"
        push_u64(&mut blob, 1);
        push_u64(&mut blob, 0);

        // id 3: Struct "Config" fieldStart=2 fieldCount=1 size=4
        offsets.push(blob.len() as u32);
        blob.push(5);
        push_u32(&mut blob, 2); // name id 2 -> "Config"
        push_u64(&mut blob, 4);
        push_u64(&mut blob, 2);
        push_u64(&mut blob, 1);

        (offsets, blob)
    }

    #[test]
    fn decodes_struct_with_one_field() {
        let (offsets, blob) = sample_tables();
        let names = ["int32_t", "count", "Config"];
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

        let config = cat.node(3);
        assert!(config.valid);
        assert_eq!(config.kind, NodeKind::Struct);
        assert_eq!(config.name, "Config");
        assert_eq!(config.field_count, 1);

        let mut seen = Vec::new();
        cat.each_field(&config, |f| seen.push(f.name.clone()));
        assert_eq!(seen, vec!["count".to_string()]);

        let found = cat.node_by_name("Config").expect("present");
        assert_eq!(found.id, 3);
        assert!(cat.node_by_name("NoSuchType").is_none());
    }

    #[test]
    fn func_info_out_of_range_invalid() {
        let tables = RawTables {
            func_address: &[0x1000],
            func_name: &["foo"],
            func_is_static: &[0],
            func_is_method: &[1],
            node_offsets: &[0],
            node_blob: &[],
            node_names: &[],
        };
        let cat = ReflectionCatalogue::new(tables);
        assert!(cat.func_info(0).valid);
        assert!(cat.func_info(0).is_method);
        assert!(!cat.func_info(-1).valid);
        assert!(!cat.func_info(1).valid);
    }
}
