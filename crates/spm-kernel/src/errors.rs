//! Recoverable Client API errors (spec.md §6, §7).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectError {
    /// No partition exposes `sid`, or the service refused the connection.
    ConnectionRefused,
    /// The target service's queue rejected a new connection (e.g. a
    /// single-flight service already has one pending).
    ConnectionBusy,
    /// The requested version did not satisfy the service's version policy.
    Version,
    /// The handle manager could not allocate a channel handle.
    InvalidHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallError {
    /// The channel was not `CONNECTED`, so `call` could not be dispatched.
    InvalidHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseError {
    /// The channel was not `CONNECTED` or `DROPPED`, or the handle was
    /// already destroyed.
    InvalidHandle,
}
