mod cli;
mod logging;
mod protocol;
mod reflect_blob;
mod repl;
mod worker;

use std::sync::Arc;

use atf_memcore::{DumpOptions, RemoteReader};
use atf_reflect::ReflectionCatalogue;
use atf_server::MessageServer;
use clap::Parser;
use eyre::Context;
use tracing::info;

use cli::Cli;
use reflect_blob::OwnedReflectBlob;

#[cfg(target_os = "linux")]
fn attach(target: &str) -> eyre::Result<Arc<dyn RemoteReader + Send + Sync>> {
    let reader = atf_memcore::LinuxRemoteReader::find_by_name(target)
        .map_err(|e| eyre::eyre!("{e}"))
        .with_context(|| format!("attaching to process '{target}'"))?;
    Ok(Arc::new(reader))
}

#[cfg(not(target_os = "linux"))]
fn attach(_target: &str) -> eyre::Result<Arc<dyn RemoteReader + Send + Sync>> {
    Err(eyre::eyre!("process attach is only implemented on Linux"))
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);

    info!(version = cli.version_impl.as_str(), target = %cli.target, "starting atf");

    // Leaked for the process's lifetime: `atf` runs as a long-lived server, and every
    // worker thread needs a `'static` borrow of the same reflection tables.
    let blob: &'static OwnedReflectBlob =
        Box::leak(Box::new(OwnedReflectBlob::load(&cli.reflect_blob).context("loading reflection blob")?));
    let func_name_refs: &'static [&'static str] = Box::leak(blob.func_name_refs().into_boxed_slice());
    let node_name_refs: &'static [&'static str] = Box::leak(blob.node_name_refs().into_boxed_slice());
    let tables = blob.raw_tables(func_name_refs, node_name_refs);
    let catalogue = Arc::new(ReflectionCatalogue::new(tables));

    let reader = attach(&cli.target)?;
    let module_base = reader.module_base(&cli.target).unwrap_or(cli.base_address);

    let dump_opts = DumpOptions {
        json: cli.dump_json,
        ..DumpOptions::default()
    };

    let server = Arc::new(
        MessageServer::bind(&cli.api_host, cli.api_port)
            .map_err(|e| eyre::eyre!("{e}"))
            .context("binding TCP API")?,
    );
    info!(addr = %server.local_addr(), "TCP API listening");

    let _workers = worker::spawn_workers(
        cli.num_workers,
        Arc::clone(&server),
        Arc::clone(&catalogue),
        Arc::clone(&reader),
        module_base,
        cli.base_address,
        dump_opts.clone(),
    );

    repl::run(&catalogue, reader.as_ref(), module_base, cli.base_address, dump_opts)?;

    Ok(())
}
