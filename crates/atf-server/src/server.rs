use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use crate::client::ClientContext;
use crate::error::ServerError;
use crate::queue::SafeQueue;
use crate::record::ClientRecord;

const STATE_INIT: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_CLOSED: u8 = 2;

const CONTROL_TICK: Duration = Duration::from_secs(1);

type ClientMap = Arc<Mutex<HashMap<u64, ClientContext>>>;

/// A length-prefixed TCP server with one accept thread, one client-control (reaper)
/// thread, and a send/recv thread pair per connection. All OS threads, no async
/// runtime — every message that arrives on any connection lands on one shared
/// `read_message` queue tagged with its `client_id`.
pub struct MessageServer {
    state: Arc<AtomicU8>,
    local_addr: SocketAddr,
    clients: ClientMap,
    recv_queue: Arc<SafeQueue<ClientRecord>>,
    accept_thread: Option<JoinHandle<()>>,
    control_thread: Option<JoinHandle<()>>,
}

impl MessageServer {
    pub fn bind(host: &str, port: u16) -> Result<Self, ServerError> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(ServerError::Bind)?
            .next()
            .ok_or_else(|| ServerError::Bind(std::io::Error::other("no resolvable address")))?;
        let listener = TcpListener::bind(addr).map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;

        let state = Arc::new(AtomicU8::new(STATE_OPEN));
        let clients: ClientMap = Arc::new(Mutex::new(HashMap::new()));
        let recv_queue = Arc::new(SafeQueue::new());

        let accept_thread = {
            let state = Arc::clone(&state);
            let clients = Arc::clone(&clients);
            let recv_queue = Arc::clone(&recv_queue);
            std::thread::spawn(move || accept_loop(listener, state, clients, recv_queue))
        };

        let control_thread = {
            let state = Arc::clone(&state);
            let clients = Arc::clone(&clients);
            std::thread::spawn(move || control_loop(state, clients))
        };

        info!(addr = %local_addr, "message server open");

        Ok(Self {
            state,
            local_addr,
            clients,
            recv_queue,
            accept_thread: Some(accept_thread),
            control_thread: Some(control_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn close(&mut self) -> Result<(), ServerError> {
        if self.state.swap(STATE_CLOSED, Ordering::AcqRel) != STATE_OPEN {
            return Err(ServerError::NotOpen);
        }

        // Unblock the accept thread's blocking `accept()` call.
        let _ = TcpStream::connect(self.local_addr);

        if let Some(h) = self.accept_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.control_thread.take() {
            let _ = h.join();
        }

        let mut map = self.clients.lock().unwrap();
        for ctx in map.values() {
            ctx.shutdown();
        }
        for (_, mut ctx) in map.drain() {
            ctx.join();
        }

        info!("message server closed");
        Ok(())
    }

    /// Pops the next queued event (client opened/closed, or a complete message) across
    /// every connection, FIFO.
    pub fn read_message(&self) -> Option<ClientRecord> {
        self.recv_queue.pop_front()
    }

    /// Queues `payload` to be sent to `client_id`. Returns `false` if the payload is
    /// empty or the client is unknown (already disconnected).
    pub fn send_message(&self, client_id: u64, payload: &[u8]) -> bool {
        if payload.is_empty() {
            return false;
        }
        let clients = self.clients.lock().unwrap();
        match clients.get(&client_id) {
            Some(ctx) => {
                ctx.enqueue_send(bytes::Bytes::copy_from_slice(payload));
                true
            }
            None => false,
        }
    }
}

impl Drop for MessageServer {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) == STATE_OPEN {
            let _ = self.close();
        }
    }
}

fn accept_loop(listener: TcpListener, state: Arc<AtomicU8>, clients: ClientMap, recv_queue: Arc<SafeQueue<ClientRecord>>) {
    let mut next_client_id: u64 = 1;

    for incoming in listener.incoming() {
        if state.load(Ordering::Acquire) != STATE_OPEN {
            break;
        }
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                break;
            }
        };
        if state.load(Ordering::Acquire) != STATE_OPEN {
            drop(stream);
            break;
        }

        let client_id = next_client_id;
        next_client_id += 1;

        match ClientContext::spawn(client_id, stream, Arc::clone(&recv_queue)) {
            Ok(ctx) => {
                clients.lock().unwrap().insert(client_id, ctx);
            }
            Err(e) => warn!(client_id, error = %e, "failed to spawn client threads"),
        }

        reap(&clients);
    }
}

fn control_loop(state: Arc<AtomicU8>, clients: ClientMap) {
    while state.load(Ordering::Acquire) == STATE_OPEN {
        reap(&clients);
        std::thread::sleep(CONTROL_TICK);
    }
}

fn reap(clients: &ClientMap) {
    let mut map = clients.lock().unwrap();
    let done: Vec<u64> = map.iter().filter(|(_, c)| c.is_done()).map(|(id, _)| *id).collect();
    for id in done {
        if let Some(mut ctx) = map.remove(&id) {
            ctx.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream as StdStream;

    #[test]
    fn round_trip_message() {
        let mut server = MessageServer::bind("127.0.0.1", 0).unwrap();
        let addr = server.local_addr();

        let mut client = StdStream::connect(addr).unwrap();
        let frame = crate::frame::build_frame(b"ping");
        client.write_all(&frame).unwrap();

        let open = loop {
            if let Some(rec) = server.read_message() {
                break rec;
            }
        };
        assert!(matches!(open, ClientRecord::Open { .. }));

        let msg = loop {
            if let Some(rec) = server.read_message() {
                break rec;
            }
        };
        match msg {
            ClientRecord::Message { client_id, data } => {
                assert_eq!(&data[..], b"ping");
                assert!(server.send_message(client_id, b"pong"));
            }
            other => panic!("expected Message, got {other:?}"),
        }

        let mut buf = [0u8; 8];
        let n = client.read(&mut buf).unwrap();
        let reply = crate::frame::build_frame(b"pong");
        assert_eq!(&buf[..n], &reply[..]);

        server.close().unwrap();
    }

    #[test]
    fn send_to_unknown_client_is_false() {
        let mut server = MessageServer::bind("127.0.0.1", 0).unwrap();
        assert!(!server.send_message(999, b"x"));
        server.close().unwrap();
    }
}
