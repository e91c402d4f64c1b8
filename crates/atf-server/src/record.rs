use bytes::Bytes;

/// One event crossing a client's recv queue: connection opened, a complete message
/// arrived, or the connection closed.
#[derive(Debug, Clone)]
pub enum ClientRecord {
    Open { client_id: u64 },
    Close { client_id: u64 },
    Message { client_id: u64, data: Bytes },
}

impl ClientRecord {
    pub fn client_id(&self) -> u64 {
        match self {
            ClientRecord::Open { client_id }
            | ClientRecord::Close { client_id }
            | ClientRecord::Message { client_id, .. } => *client_id,
        }
    }
}
