use serde::Serialize;

/// Discriminant for [`TypeNode`], matching the reflection exporter's node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Void,
    Scalar,
    Bitfield,
    Pointer,
    Array,
    Struct,
    Class,
    Union,
    DataMemberField,
    StaticDataMemberField,
    Var,
}

impl NodeKind {
    /// Node kinds whose fields are iterated over a contiguous slice of sibling nodes.
    pub fn is_aggregate(self) -> bool {
        matches!(self, NodeKind::Struct | NodeKind::Class | NodeKind::Union)
    }
}

/// Node IDs at or above this value are synthesised at evaluation time (pointer/array
/// casts produced by `reinterpret_cast`/`[]`/`&`) rather than loaded from the catalogue
/// blob. Keeping them disjoint from real catalogue IDs means a synthesised node can never
/// collide with one the exporter actually emitted.
pub const SYNTHETIC_ID_BASE: u64 = 1 << 30;

/// One node of the reflection type graph.
///
/// Struct/Class/Union nodes describe their fields as a `(field_start_id, field_count)`
/// window into the node table rather than owning a `Vec` of children, mirroring the
/// exporter's packed representation.
#[derive(Debug, Clone, Serialize)]
pub struct TypeNode {
    pub valid: bool,
    pub id: u64,
    pub kind: NodeKind,
    pub name: String,
    pub size: u64,

    // Struct/Class/Union
    pub field_start_id: u64,
    pub field_count: u64,

    // Bitfield
    pub element_type_id: u64,
    pub starting_position: u32,
    pub bits: u32,

    // DataMemberField / StaticDataMemberField / Var
    pub offset: u64,
    pub address: u64,
}

impl TypeNode {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            id: 0,
            kind: NodeKind::Void,
            name: String::new(),
            size: 0,
            field_start_id: 0,
            field_count: 0,
            element_type_id: 0,
            starting_position: 0,
            bits: 0,
            offset: 0,
            address: 0,
        }
    }

    /// Array element count, derived from total size / element size (the exporter does
    /// not store a count directly).
    pub fn array_count(&self, element_size: u64) -> u64 {
        if element_size == 0 {
            0
        } else {
            self.size / element_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_count_divides_by_element_size() {
        let mut n = TypeNode::invalid();
        n.size = 40;
        assert_eq!(n.array_count(4), 10);
        assert_eq!(n.array_count(0), 0);
    }

    #[test]
    fn aggregate_kinds() {
        assert!(NodeKind::Struct.is_aggregate());
        assert!(NodeKind::Class.is_aggregate());
        assert!(NodeKind::Union.is_aggregate());
        assert!(!NodeKind::Scalar.is_aggregate());
    }
}
