mod address_program;
mod builder;
mod dumper;
mod error;
mod lexer;
mod parser;
mod pipeline;
mod remote_reader;

pub use address_program::{AddressProgram, Step};
pub use builder::{CompiledExpr, StateKind, build, str_to_u64};
pub use dumper::{DumpOptions, StructDumper, dump_struct_type, ptr_to_hex};
pub use error::ExprError;
pub use lexer::{Token, tokenize};
pub use parser::{Op, parse};
pub use pipeline::{EvalResult, describe_type, evaluate};
pub use remote_reader::{FixtureReader, RemoteReader};

#[cfg(target_os = "linux")]
pub use remote_reader::linux::LinuxRemoteReader;
