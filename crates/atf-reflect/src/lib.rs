//! Reflection catalogue: decodes the function table and type-node graph produced by the
//! companion reflection exporter and linked into the target binary.

pub mod catalogue;
pub mod error;
pub mod func_info;
pub mod type_node;
pub mod version;

pub use catalogue::{RawTables, ReflectionCatalogue};
pub use error::ReflectError;
pub use func_info::FuncInfo;
pub use type_node::{NodeKind, SYNTHETIC_ID_BASE, TypeNode};
pub use version::{HOOK_VERSION, Version};
