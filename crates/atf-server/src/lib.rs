mod client;
mod error;
mod frame;
mod queue;
mod record;
mod server;

pub use error::ServerError;
pub use frame::{FrameBuffer, build_frame};
pub use record::ClientRecord;
pub use server::MessageServer;
