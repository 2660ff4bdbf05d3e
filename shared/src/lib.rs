pub mod layout;
pub mod protocol;

pub use layout::*;
pub use protocol::*;

/// Version of the snapshot format served at the presentation boundary
pub const PROTOCOL_VERSION: u32 = 1;
