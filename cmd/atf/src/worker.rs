use std::sync::Arc;

use atf_memcore::{DumpOptions, RemoteReader, evaluate};
use atf_reflect::ReflectionCatalogue;
use atf_server::{ClientRecord, MessageServer};
use tracing::{debug, warn};

use crate::protocol::{decode_request, encode_response};

/// Spawns `num_workers` threads, each popping events off `server`'s shared inbound
/// queue and running the MemCore pipeline for `ReqReadMemory` requests. `catalogue` and
/// `reader` are read-only after startup and freely shared across workers.
pub fn spawn_workers(
    num_workers: u8,
    server: Arc<MessageServer>,
    catalogue: Arc<ReflectionCatalogue<'static>>,
    reader: Arc<dyn RemoteReader + Send + Sync>,
    module_base: u64,
    base_address_expected: u64,
    dump_opts: DumpOptions,
) -> Vec<std::thread::JoinHandle<()>> {
    (0..num_workers)
        .map(|idx| {
            let server = Arc::clone(&server);
            let catalogue = Arc::clone(&catalogue);
            let reader = Arc::clone(&reader);
            let dump_opts = dump_opts.clone();
            std::thread::Builder::new()
                .name(format!("atf-worker-{idx}"))
                .spawn(move || worker_loop(&server, &catalogue, reader.as_ref(), module_base, base_address_expected, dump_opts))
                .expect("failed to spawn worker thread")
        })
        .collect()
}

fn worker_loop(
    server: &MessageServer,
    catalogue: &ReflectionCatalogue,
    reader: &dyn RemoteReader,
    module_base: u64,
    base_address_expected: u64,
    dump_opts: DumpOptions,
) {
    loop {
        match server.read_message() {
            Some(ClientRecord::Message { client_id, data }) => {
                let Some(req) = decode_request(&data) else {
                    continue;
                };
                let text = match evaluate(catalogue, reader, &req.code, module_base, base_address_expected, dump_opts.clone()) {
                    Ok(result) => result.into_text(dump_opts.json),
                    Err(e) => format!("#{e}"),
                };
                debug!(client_id, rpc_id = req.rpc_id, %text, "evaluated request");
                let payload = encode_response(req.rpc_id, &text);
                if !server.send_message(client_id, &payload) {
                    warn!(client_id, "client gone before response could be sent");
                }
            }
            Some(ClientRecord::Open { client_id }) => debug!(client_id, "client connected"),
            Some(ClientRecord::Close { client_id }) => debug!(client_id, "client disconnected"),
            None => std::thread::sleep(std::time::Duration::from_millis(1)),
        }
    }
}
