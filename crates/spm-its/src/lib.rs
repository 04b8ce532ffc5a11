//! Internal Trusted Storage (spec.md §4.5, §4.6): owner-stamped key/value
//! records over an `NvStore`, plus the partition dispatch loop that exposes
//! them as the four ITS RoT services.

pub mod errors;
pub mod header;
pub mod service;
pub mod store;

pub use errors::ItsError;
pub use header::{Header, HEADER_SIZE};
pub use service::{run, ItsOp, ItsRoute};
pub use store::{ItsInfo, ItsStore};
