//! Thin Server API wrapper for partition service-loop code (spec.md §6).
//!
//! A partition's dispatch loop (built by `spm-init`) runs in-process with
//! the `Spm` runtime — unlike a cross-address-space target, there is no
//! syscall trap to wrap. [`ServerContext`] plays the same role the donor's
//! `zos-process` syscall shims play (a thin, ergonomic call surface a
//! service loop reaches for instead of touching the runtime directly), just
//! without an ABI boundary to cross: every method here is a direct call
//! into [`Spm`].

use spm_hal::Hal;
use spm_ipc::status;
use spm_kernel::Spm;
use spm_kernel_core::message::MessageType;
use spm_kernel_core::types::{Handle, PartitionId};

/// A partition's view of the Server API, scoped to its own `PartitionId`.
pub struct ServerContext<'a, H: Hal> {
    spm: &'a Spm<H>,
    partition: PartitionId,
}

impl<'a, H: Hal> ServerContext<'a, H> {
    pub fn new(spm: &'a Spm<H>, partition: PartitionId) -> Self {
        Self { spm, partition }
    }

    /// Block (or poll, if `blocking` is `false`) until a bit in `mask` is
    /// asserted on this partition's signal word.
    pub fn wait(&self, mask: u32, blocking: bool) -> u32 {
        self.spm.wait(self.partition, mask, blocking)
    }

    /// Dequeue the oldest pending message handle for `bit`.
    pub fn get(&self, bit: u32) -> Option<Handle> {
        self.spm.get(self.partition, bit)
    }

    pub fn identity(&self, msg: Handle) -> i32 {
        self.spm.identity(self.partition, msg)
    }

    pub fn msg_type(&self, msg: Handle) -> MessageType {
        self.spm.msg_type(self.partition, msg)
    }

    pub fn in_vec_len(&self, msg: Handle, idx: usize) -> usize {
        self.spm.in_vec_len(self.partition, msg, idx)
    }

    pub fn out_vec_len(&self, msg: Handle, idx: usize) -> usize {
        self.spm.out_vec_len(self.partition, msg, idx)
    }

    pub fn read(&self, msg: Handle, idx: usize, dst: &mut [u8]) -> usize {
        self.spm.read(self.partition, msg, idx, dst)
    }

    pub fn write(&self, msg: Handle, idx: usize, src: &[u8]) -> usize {
        self.spm.write(self.partition, msg, idx, src)
    }

    pub fn skip(&self, msg: Handle, idx: usize, len: usize) -> usize {
        self.spm.skip(self.partition, msg, idx, len)
    }

    pub fn reply(&self, msg: Handle, status_code: i32) {
        self.spm.reply(self.partition, msg, status_code)
    }

    /// Convenience over `reply` for the common success case.
    pub fn reply_success(&self, msg: Handle) {
        self.reply(msg, status::SUCCESS);
    }

    /// Convenience over `reply` for the protocol-violation drop case.
    pub fn drop_connection(&self, msg: Handle) {
        self.reply(msg, status::DROP_CONNECTION);
    }

    pub fn panic(&self) -> ! {
        self.spm.panic(self.partition)
    }

    /// Append a commit to the audit trail's deterministic-replay ledger for
    /// a state mutation this service performed on its own behalf (e.g. an
    /// ITS write), outside the Client API request/response pair that
    /// triggered it.
    pub fn audit_commit(&self, commit_type: spm_audit::CommitType) -> spm_audit::CommitId {
        self.spm.audit_commit(commit_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spm_hal::{TestHal, TestMemoryRegions};
    use spm_kernel::partition::{PartitionDescriptor, RotService};
    use spm_kernel_core::types::VersionPolicy;

    static SERVICES: &[RotService] = &[RotService {
        sid: 0x4242,
        signal_bit: 0,
        min_version: 1,
        version_policy: VersionPolicy::Strict,
        allow_nspe: true,
    }];

    static DESCRIPTORS: &[PartitionDescriptor] = &[PartitionDescriptor {
        id: 1,
        name: "echo",
        services: SERVICES,
    }];

    fn test_spm() -> Spm<TestHal> {
        Spm::new(
            TestHal::default(),
            Box::new(TestMemoryRegions {
                secure_ram: 0x2000_0000..0x2001_0000,
                secure_flash: 0x0800_0000..0x0810_0000,
            }),
            DESCRIPTORS,
        )
    }

    #[test]
    fn wait_reports_no_signal_when_nothing_is_pending() {
        let spm = test_spm();
        let ctx = ServerContext::new(&spm, 1);
        assert_eq!(ctx.wait(1, false), 0);
    }

    #[test]
    fn get_is_empty_before_any_message_is_posted() {
        let spm = test_spm();
        let ctx = ServerContext::new(&spm, 1);
        assert_eq!(ctx.get(0), None);
    }
}
