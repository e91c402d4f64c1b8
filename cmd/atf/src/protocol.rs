const CMD_REQ_READ_MEMORY: u32 = 1;
const CMD_RES_READ_MEMORY: u32 = 2;

/// A decoded MemCore request: `{ u32 cmdID; u32 rpcID; char code[]; }`, `code`
/// null-terminated.
pub struct Request {
    pub rpc_id: u32,
    pub code: String,
}

/// Parses one frame payload. Returns `None` for any `cmdID` other than `ReqReadMemory` —
/// callers drop such frames rather than erroring, since unknown commands are simply not
/// this implementation's concern.
pub fn decode_request(payload: &[u8]) -> Option<Request> {
    if payload.len() < 8 {
        return None;
    }
    let cmd_id = u32::from_le_bytes(payload[0..4].try_into().unwrap());
    if cmd_id != CMD_REQ_READ_MEMORY {
        return None;
    }
    let rpc_id = u32::from_le_bytes(payload[4..8].try_into().unwrap());
    let code_bytes = &payload[8..];
    let end = code_bytes.iter().position(|&b| b == 0).unwrap_or(code_bytes.len());
    let code = String::from_utf8_lossy(&code_bytes[..end]).into_owned();
    Some(Request { rpc_id, code })
}

/// Builds a `ResReadMemory` payload: the header with `cmdID = 2`, `rpcID` echoed back,
/// followed by `text` as a null-terminated string.
pub fn encode_response(rpc_id: u32, text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + text.len() + 1);
    out.extend_from_slice(&CMD_RES_READ_MEMORY.to_le_bytes());
    out.extend_from_slice(&rpc_id.to_le_bytes());
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    out
}
