//! ITS partition dispatch loop (spec.md §4.4, §4.6).
//!
//! Wire framing for the four ITS SIDs (the service contract fixes the
//! owner/flags/offset semantics but not a bit-exact request layout; fixed
//! here the way a donor service loop fixes its own request framing):
//!
//! - `ITS_SET`:    in[0] = `{uid: u32, create_flags: u32}` (8 bytes, LE), in[1] = payload.
//! - `ITS_GET`:    in[0] = `{uid: u32, offset: u32}` (8 bytes, LE), out[0] = destination.
//! - `ITS_INFO`:   in[0] = `{uid: u32}` (4 bytes, LE), out[0] = `{size: u32, flags: u32}` (8 bytes, LE).
//! - `ITS_REMOVE`: in[0] = `{uid: u32}` (4 bytes, LE).
//!
//! One partition serves all four SIDs; each is assigned its own signal
//! bit (spec.md §4.4: ordering is FIFO within a signal bit, unspecified
//! across bits), so the bit a message arrived on tells the dispatch loop
//! which operation to run without inspecting message content.

use spm_hal::{Hal, NvStore};
use spm_ipc::status;
use spm_kernel_core::types::Handle;
use spm_process::ServerContext;

use crate::store::ItsStore;

/// One ITS operation's signal bit within the partition's combined mask.
#[derive(Clone, Copy, Debug)]
pub enum ItsOp {
    Set,
    Get,
    GetInfo,
    Remove,
}

/// Maps a signal bit to the ITS operation it carries.
#[derive(Clone, Copy, Debug)]
pub struct ItsRoute {
    pub bit: u32,
    pub op: ItsOp,
}

/// Runs the ITS service loop forever on the calling thread.
pub fn run<H: Hal, N: NvStore>(ctx: &ServerContext<H>, store: &ItsStore<N>, routes: &[ItsRoute]) -> ! {
    let mask: u32 = routes.iter().map(|r| 1 << r.bit).fold(0, |a, b| a | b);
    loop {
        ctx.wait(mask, true);
        for route in routes {
            while let Some(msg) = ctx.get(route.bit) {
                dispatch(ctx, store, msg, route.op);
            }
        }
    }
}

fn dispatch<H: Hal, N: NvStore>(ctx: &ServerContext<H>, store: &ItsStore<N>, msg: Handle, op: ItsOp) {
    use spm_kernel_core::message::MessageType;
    match ctx.msg_type(msg) {
        MessageType::Connect | MessageType::Disconnect => ctx.reply_success(msg),
        MessageType::Call => {
            let caller = ctx.identity(msg);
            let result = match op {
                ItsOp::Set => handle_set(ctx, store, msg, caller),
                ItsOp::Get => handle_get(ctx, store, msg, caller),
                ItsOp::GetInfo => handle_info(ctx, store, msg, caller),
                ItsOp::Remove => handle_remove(ctx, store, msg, caller),
            };
            ctx.reply(msg, result);
        }
    }
}

fn read_exact<H: Hal>(ctx: &ServerContext<H>, msg: Handle, idx: usize, dst: &mut [u8]) {
    ctx.read(msg, idx, dst);
}

fn handle_set<H: Hal, N: NvStore>(ctx: &ServerContext<H>, store: &ItsStore<N>, msg: Handle, caller: i32) -> i32 {
    let mut header = [0u8; 8];
    read_exact(ctx, msg, 0, &mut header);
    let uid = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let create_flags = u32::from_le_bytes(header[4..8].try_into().unwrap());

    let payload_len = ctx.in_vec_len(msg, 1);
    let mut payload = vec![0u8; payload_len];
    read_exact(ctx, msg, 1, &mut payload);

    let result = store.set(caller, uid, &payload, create_flags);
    let status_code = match &result {
        Ok(()) => {
            ctx.audit_commit(spm_audit::CommitType::ItsRecordWritten { uid, owner: caller, size: payload.len() });
            status::SUCCESS
        }
        Err(e) => e.to_status(),
    };
    payload.iter_mut().for_each(|b| *b = 0);
    status_code
}

fn handle_get<H: Hal, N: NvStore>(ctx: &ServerContext<H>, store: &ItsStore<N>, msg: Handle, caller: i32) -> i32 {
    let mut header = [0u8; 8];
    read_exact(ctx, msg, 0, &mut header);
    let uid = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let offset = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

    let out_len = ctx.out_vec_len(msg, 0);
    let mut out = vec![0u8; out_len];
    let result = store.get(caller, uid, offset, &mut out);
    let status_code = match &result {
        Ok(()) => {
            ctx.write(msg, 0, &out);
            status::SUCCESS
        }
        Err(e) => e.to_status(),
    };
    out.iter_mut().for_each(|b| *b = 0);
    status_code
}

fn handle_info<H: Hal, N: NvStore>(ctx: &ServerContext<H>, store: &ItsStore<N>, msg: Handle, caller: i32) -> i32 {
    let mut header = [0u8; 4];
    read_exact(ctx, msg, 0, &mut header);
    let uid = u32::from_le_bytes(header);

    match store.get_info(caller, uid) {
        Ok(info) => {
            let mut out = [0u8; 8];
            out[0..4].copy_from_slice(&(info.size as u32).to_le_bytes());
            out[4..8].copy_from_slice(&info.flags.to_le_bytes());
            ctx.write(msg, 0, &out);
            status::SUCCESS
        }
        Err(e) => e.to_status(),
    }
}

fn handle_remove<H: Hal, N: NvStore>(ctx: &ServerContext<H>, store: &ItsStore<N>, msg: Handle, caller: i32) -> i32 {
    let mut header = [0u8; 4];
    read_exact(ctx, msg, 0, &mut header);
    let uid = u32::from_le_bytes(header);

    match store.remove(caller, uid) {
        Ok(()) => {
            ctx.audit_commit(spm_audit::CommitType::ItsRecordRemoved { uid, owner: caller });
            status::SUCCESS
        }
        Err(e) => e.to_status(),
    }
}
