use std::path::Path;

use atf_reflect::RawTables;
use eyre::{Context, eyre};

/// On-disk encoding of a [`RawTables`] snapshot, produced by an out-of-band reflection
/// exporter for the target binary. Owns every buffer `RawTables` borrows from, so the
/// loaded catalogue can outlive the function that read the file.
pub struct OwnedReflectBlob {
    func_address: Vec<u64>,
    func_name: Vec<String>,
    func_is_static: Vec<u64>,
    func_is_method: Vec<u64>,
    node_offsets: Vec<u32>,
    node_blob: Vec<u8>,
    node_names: Vec<String>,
}

impl OwnedReflectBlob {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading reflect blob {}", path.display()))?;
        let mut cur = Reader { data: &bytes, pos: 0 };

        let func_count = cur.u32()? as usize;
        let mut func_address = Vec::with_capacity(func_count);
        for _ in 0..func_count {
            func_address.push(cur.u64()?);
        }
        let mut func_name = Vec::with_capacity(func_count);
        for _ in 0..func_count {
            func_name.push(cur.string()?);
        }
        let word_count = func_count.div_ceil(64);
        let mut func_is_static = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            func_is_static.push(cur.u64()?);
        }
        let mut func_is_method = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            func_is_method.push(cur.u64()?);
        }

        let node_offset_count = cur.u32()? as usize;
        let mut node_offsets = Vec::with_capacity(node_offset_count);
        for _ in 0..node_offset_count {
            node_offsets.push(cur.u32()?);
        }

        let blob_len = cur.u32()? as usize;
        let node_blob = cur.bytes(blob_len)?.to_vec();

        let name_count = cur.u32()? as usize;
        let mut node_names = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            node_names.push(cur.string()?);
        }

        Ok(Self {
            func_address,
            func_name,
            func_is_static,
            func_is_method,
            node_offsets,
            node_blob,
            node_names,
        })
    }

    pub fn func_name_refs(&self) -> Vec<&str> {
        self.func_name.iter().map(String::as_str).collect()
    }

    pub fn node_name_refs(&self) -> Vec<&str> {
        self.node_names.iter().map(String::as_str).collect()
    }

    /// Assembles a [`RawTables`] borrowing `self` and the two name-ref slices the caller
    /// built with [`Self::func_name_refs`]/[`Self::node_name_refs`] — kept as separate
    /// steps since `Vec<&str>` can't live inside `OwnedReflectBlob` itself without making
    /// it self-referential.
    pub fn raw_tables<'a>(&'a self, func_name_refs: &'a [&'a str], node_name_refs: &'a [&'a str]) -> RawTables<'a> {
        RawTables {
            func_address: &self.func_address,
            func_name: func_name_refs,
            func_is_static: &self.func_is_static,
            func_is_method: &self.func_is_method,
            node_offsets: &self.node_offsets,
            node_blob: &self.node_blob,
            node_names: node_name_refs,
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bytes(&mut self, n: usize) -> eyre::Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(eyre!("reflect blob truncated at offset {}", self.pos));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> eyre::Result<u32> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> eyre::Result<u64> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> eyre::Result<String> {
        let len = self.u32()? as usize;
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| eyre!("non-utf8 string in reflect blob: {e}"))
    }
}
