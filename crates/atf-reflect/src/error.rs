use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("node blob truncated reading node {id} at offset {offset}")]
    BlobTruncated { id: u64, offset: u32 },
    #[error("node {id} has unknown kind tag {tag}")]
    UnknownNodeKind { id: u64, tag: u8 },
}
