//! Build-time tunables (spec.md §6 "Build/link-time configuration").
//!
//! No runtime configuration surface exists at this layer — these are
//! `const` because the handle manager's backing storage is sized once at
//! boot and never resized.

/// Maximum number of simultaneously live channels.
pub const MAX_CHANNELS: usize = 64;

/// Maximum number of simultaneously in-flight active messages. At most one
/// per channel is ever live (spec.md §3 global invariant), so this never
/// needs to exceed `MAX_CHANNELS`.
pub const MAX_ACTIVE_MESSAGES: usize = MAX_CHANNELS;

/// Total handle-manager capacity: channels and active messages share one
/// handle namespace (spec.md §4.1).
pub const MAX_HANDLES: usize = MAX_CHANNELS + MAX_ACTIVE_MESSAGES;

/// Largest ITS payload this build will accept (spec.md §8 property 1).
pub const MAX_ITS_RECORD_SIZE: usize = 4096;

/// Maximum number of in-vectors or out-vectors per call (spec.md §3).
pub const MAX_VECS: usize = 4;
