use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::frame::{self, FrameBuffer};
use crate::queue::SafeQueue;
use crate::record::ClientRecord;

const RECV_CHUNK: usize = 64 * 1024;
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// One accepted connection: its own outbound queue plus the send/recv threads that drive
/// the socket. `is_done` flips once either thread hits EOF or a write error; the control
/// thread reaps contexts in that state.
pub struct ClientContext {
    pub id: u64,
    exit: Arc<AtomicBool>,
    send_queue: Arc<SafeQueue<ClientRecord>>,
    send_thread: Option<JoinHandle<()>>,
    recv_thread: Option<JoinHandle<()>>,
}

impl ClientContext {
    pub fn spawn(id: u64, stream: TcpStream, recv_queue: Arc<SafeQueue<ClientRecord>>) -> std::io::Result<Self> {
        let exit = Arc::new(AtomicBool::new(false));
        let send_queue = Arc::new(SafeQueue::new());

        let send_stream = stream.try_clone()?;
        let send_thread = {
            let exit = Arc::clone(&exit);
            let send_queue = Arc::clone(&send_queue);
            std::thread::spawn(move || send_loop(id, send_stream, send_queue, exit))
        };

        let recv_thread = {
            let exit = Arc::clone(&exit);
            let recv_queue = Arc::clone(&recv_queue);
            std::thread::spawn(move || recv_loop(id, stream, recv_queue, exit))
        };

        Ok(Self {
            id,
            exit,
            send_queue,
            send_thread: Some(send_thread),
            recv_thread: Some(recv_thread),
        })
    }

    pub fn is_done(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    pub fn enqueue_send(&self, data: Bytes) {
        self.send_queue.push_back(ClientRecord::Message { client_id: self.id, data });
    }

    pub fn shutdown(&self) {
        self.exit.store(true, Ordering::Release);
    }

    /// Joins both worker threads. Only called once `is_done()` is true.
    pub fn join(&mut self) {
        if let Some(h) = self.send_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.recv_thread.take() {
            let _ = h.join();
        }
    }
}

fn send_loop(id: u64, mut stream: TcpStream, queue: Arc<SafeQueue<ClientRecord>>, exit: Arc<AtomicBool>) {
    while !exit.load(Ordering::Acquire) {
        match queue.pop_front() {
            Some(ClientRecord::Message { data, .. }) => {
                let wire = frame::build_frame(&data);
                if let Err(e) = stream.write_all(&wire) {
                    debug!(client_id = id, error = %e, "send failed, closing client");
                    break;
                }
            }
            _ => std::thread::sleep(IDLE_SLEEP),
        }
    }
    exit.store(true, Ordering::Release);
    let _ = stream.shutdown(Shutdown::Both);
}

fn recv_loop(id: u64, mut stream: TcpStream, recv_queue: Arc<SafeQueue<ClientRecord>>, exit: Arc<AtomicBool>) {
    recv_queue.push_back(ClientRecord::Open { client_id: id });

    let mut frames = FrameBuffer::new();
    let mut scratch = [0u8; RECV_CHUNK];

    while !exit.load(Ordering::Acquire) {
        match stream.read(&mut scratch) {
            Ok(0) => break,
            Ok(n) => {
                frames.push(&scratch[..n]);
                while let Some(payload) = frames.next_frame() {
                    recv_queue.push_back(ClientRecord::Message { client_id: id, data: payload });
                }
            }
            Err(e) => {
                warn!(client_id = id, error = %e, "recv failed, closing client");
                break;
            }
        }
    }

    recv_queue.push_back(ClientRecord::Close { client_id: id });
    exit.store(true, Ordering::Release);
    let _ = stream.shutdown(Shutdown::Both);
}
