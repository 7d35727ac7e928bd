//! aarch64 context switching (AAPCS64)

use std::arch::naked_asm;

use super::EntryFn;

/// Callee-saved register file
///
/// Offsets are hard-coded in `context_switch`; do not reorder.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedContext {
    pub sp: u64,       // 0x00
    pub pc: u64,       // 0x08
    pub lr: u64,       // 0x10
    pub x: [u64; 10],  // 0x18  x19..x28
    pub fp: u64,       // 0x68  x29
    pub d: [u64; 8],   // 0x70  d8..d15
}

impl SavedContext {
    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

/// Initialize a context so that switching to it runs `entry(arg)` on the
/// stack ending at `stack_top`.
///
/// # Safety
///
/// `regs` must be valid for writes and `stack_top` must be the exclusive
/// upper end of a writable stack region that outlives the context.
#[inline]
pub unsafe fn init_context(regs: *mut SavedContext, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    let sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    *regs = SavedContext::default();
    regs.sp = sp as u64;
    regs.pc = uthread_entry_trampoline as usize as u64;
    regs.x[0] = entry as usize as u64; // x19
    regs.x[1] = arg as u64; // x20
}

/// Calls `x19(x20)`, then `context_finished(x20)`
#[unsafe(naked)]
unsafe extern "C" fn uthread_entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "mov x0, x20",
        "bl {finished}",
        "brk #0x1",
        finished = sym crate::scheduler::context_finished,
    );
}

/// Save callee-saved registers into `old` and resume `new`
///
/// # Safety
///
/// `new` must hold a context produced by `init_context` or by a previous
/// `context_switch`, whose stack is still alive.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedContext, _new: *const SavedContext) {
    naked_asm!(
        // Save into old (x0)
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "adr x10, 1f",
        "str x10, [x0, #0x08]",
        "str x30, [x0, #0x10]",
        "stp x19, x20, [x0, #0x18]",
        "stp x21, x22, [x0, #0x28]",
        "stp x23, x24, [x0, #0x38]",
        "stp x25, x26, [x0, #0x48]",
        "stp x27, x28, [x0, #0x58]",
        "str x29, [x0, #0x68]",
        "stp d8, d9, [x0, #0x70]",
        "stp d10, d11, [x0, #0x80]",
        "stp d12, d13, [x0, #0x90]",
        "stp d14, d15, [x0, #0xa0]",
        // Load from new (x1)
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldr x10, [x1, #0x08]",
        "ldr x30, [x1, #0x10]",
        "ldp x19, x20, [x1, #0x18]",
        "ldp x21, x22, [x1, #0x28]",
        "ldp x23, x24, [x1, #0x38]",
        "ldp x25, x26, [x1, #0x48]",
        "ldp x27, x28, [x1, #0x58]",
        "ldr x29, [x1, #0x68]",
        "ldp d8, d9, [x1, #0x70]",
        "ldp d10, d11, [x1, #0x80]",
        "ldp d12, d13, [x1, #0x90]",
        "ldp d14, d15, [x1, #0xa0]",
        "br x10",
        // Resumption point for a saved context
        "1:",
        "ret",
    );
}
