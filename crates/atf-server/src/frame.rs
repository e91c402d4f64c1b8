use bytes::{Buf, BufMut, Bytes, BytesMut};

const MIN_RESERVE: usize = 4096;

/// Builds one wire frame: a 4-byte little-endian length prefix (counting itself)
/// followed by `payload`.
pub fn build_frame(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(4 + payload.len());
    out.put_u32_le((4 + payload.len()) as u32);
    out.put_slice(payload);
    out.freeze()
}

/// Accumulates bytes read off a socket and peels off complete length-prefixed frames.
/// `BytesMut` already amortizes its own growth/compaction, so this carries none of the
/// manual 80%-rebuild bookkeeping the original hand-rolled buffer needed.
pub struct FrameBuffer {
    buf: BytesMut,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            buf: BytesMut::with_capacity(MIN_RESERVE),
        }
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pops the next complete frame's payload (prefix stripped), if one is buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.buf.len() < 4 {
            return None;
        }
        let msg_size = u32::from_le_bytes(self.buf[..4].try_into().unwrap()) as usize;
        if msg_size < 4 || self.buf.len() < msg_size {
            return None;
        }
        let mut frame = self.buf.split_to(msg_size);
        frame.advance(4);
        Some(frame.freeze())
    }
}
