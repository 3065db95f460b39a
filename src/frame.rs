use log::debug;

use crate::Function;

/// Bytes below %rbp holding the spilled callee-saved registers.
pub const RESERVED_BYTES: usize = 32;
pub const SLOT_BYTES: usize = 8;
pub const STACK_ALIGN: usize = 16;

/// Gives every local its slot below the reserved region and sizes the frame.
///
/// Locals are walked from the most recently declared back to the first, so the
/// first variable a program mentions ends up deepest in the frame.
pub fn assign_offsets(func: &mut Function) {
    let mut offset = RESERVED_BYTES;
    for var in func.locals.iter_mut().rev() {
        offset += SLOT_BYTES;
        var.offset = offset;
    }
    func.stack_size = align_to(offset, STACK_ALIGN);
    debug!(
        "frame: {} locals, {} bytes",
        func.locals.len(),
        func.stack_size
    );
}

pub fn align_to(n: usize, align: usize) -> usize {
    n.div_ceil(align) * align
}
