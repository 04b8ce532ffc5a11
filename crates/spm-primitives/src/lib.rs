//! Isolated unsafe code for the SPM core.
//!
//! Every `unsafe` block in the crate lives in one of the two modules here so
//! it can be reviewed and loom-tested in one place rather than scattered
//! through `spm-kernel`. Nothing above this crate should need `unsafe`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod buffer;
mod sync;

pub use buffer::is_buffer_accessible;
pub use sync::{SendSyncPtr, SendSyncSlot};
