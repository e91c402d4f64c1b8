//! Hierarchical, thread-safe function-hooking runtime: attach/detach pre-observer, hook,
//! and post-observer handlers on reflection-described functions, delegating the physical
//! trampoline install to an external collaborator.

pub mod constants;
pub mod handler_group;
pub mod handler_list;
pub mod hook_view;
pub mod installer;
pub mod structs;

pub use constants::{EnumHookAccessFlags, EnumHookMode, EnumHookState, EnumHookType};
pub use handler_group::HandlerGroup;
pub use handler_list::HandlerList;
pub use hook_view::HookView;
pub use installer::{EntryPointResolver, FuncInfoResolver, HookInstaller};
pub use structs::{AttachRecord, HookRequestRecord, HookResultRecord, InformRecord, NamePath};
