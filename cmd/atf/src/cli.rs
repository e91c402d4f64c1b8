use clap::{Parser, ValueEnum};

/// Attaches to a running process and evaluates MemCore expressions against its memory,
/// either interactively over stdin or over the length-prefixed TCP wire protocol.
#[derive(Parser, Debug)]
#[command(name = "atf", author, about, disable_version_flag = true)]
pub struct Cli {
    /// Image name of the target process to attach to.
    #[arg(long, value_name = "PROCESS_IMAGE_NAME")]
    pub target: String,

    /// Emit JSON instead of plain text for evaluated expressions.
    #[arg(long = "dump-json")]
    pub dump_json: bool,

    /// Module base address the reflection tables were recorded against; overriding
    /// lets a re-linked/ASLR target still resolve correctly.
    #[arg(long = "base-address", value_parser = parse_u64, default_value = "0x140000000")]
    pub base_address: u64,

    /// Host the TCP API binds to.
    #[arg(long = "api-host", default_value = "127.0.0.1")]
    pub api_host: String,

    /// Port the TCP API binds to.
    #[arg(long = "api-port", default_value_t = 9000)]
    pub api_port: u16,

    /// Number of worker threads servicing the TCP API's inbound queue.
    #[arg(long = "num-workers", default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub num_workers: u8,

    /// Protocol/implementation version to run.
    #[arg(long = "version", value_enum, default_value_t = VersionImpl::V1_0_0)]
    pub version_impl: VersionImpl,

    /// Path to the target's reflection blob (offsets/node blob/name table), produced by
    /// an out-of-band reflection dump of the target binary.
    #[arg(long = "reflect-blob", value_name = "PATH", env = "ATF_REFLECT_BLOB")]
    pub reflect_blob: std::path::PathBuf,

    /// Default tracing level (`error`, `warn`, `info`, `debug`, `trace`), overridable via
    /// `RUST_LOG`.
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
#[allow(non_camel_case_types)]
pub enum VersionImpl {
    V1_0_0,
}

impl VersionImpl {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionImpl::V1_0_0 => "1.0.0",
        }
    }
}

fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(rest, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u64>().map_err(|e| e.to_string())
    }
}
