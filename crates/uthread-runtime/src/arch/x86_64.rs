//! x86_64 context switching (System V AMD64)

use std::arch::naked_asm;

use super::EntryFn;

/// Callee-saved register file
///
/// Offsets are hard-coded in `context_switch`; do not reorder.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedContext {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

impl SavedContext {
    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.rsp as usize
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
    // 16-byte aligned at the trampoline's `call`, as the ABI requires
    let sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    *regs = SavedContext::default();
    regs.rsp = sp as u64;
    regs.rip = uthread_entry_trampoline as usize as u64;
    regs.r12 = entry as usize as u64;
    regs.r13 = arg as u64;
}

/// Calls `r12(r13)`, then `context_finished(r13)`
#[unsafe(naked)]
unsafe extern "C" fn uthread_entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "mov rdi, r13",
        "call {finished}",
        "ud2",
        finished = sym crate::scheduler::context_finished,
    );
}

/// Save callee-saved registers into `old` and resume `new`
///
/// Returns when some other context switches back into `old`.
///
/// # Safety
///
/// `new` must hold a context produced by `init_context` or by a previous
/// `context_switch`, whose stack is still alive.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedContext, _new: *const SavedContext) {
    naked_asm!(
        // Save into old (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load from new (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resumption point for a saved context
        "1:",
        "ret",
    );
}
