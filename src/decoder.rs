//! Capstone-based instruction decoder construction.
//!
//! The sweep treats the decoder as an opaque instruction producer: it opens a
//! handle at the start of every block decode and drops it on every exit path.
//! Handles are built with details enabled, since the classifier needs group
//! membership and structured operands, and with Intel operand syntax.

use capstone::arch::x86::ArchMode as X86Mode;
use capstone::prelude::{BuildsCapstone, BuildsCapstoneSyntax};
use capstone::{arch::x86::ArchSyntax, Capstone};

use crate::DisassemblyError;

/// Build an x86 decoder for the given bit width (16, 32, or 64).
pub fn build_x86(bits: u32) -> Result<Capstone, DisassemblyError> {
    let mode = match bits {
        64 => X86Mode::Mode64,
        32 => X86Mode::Mode32,
        16 => X86Mode::Mode16,
        other => return Err(DisassemblyError::UnsupportedBitWidth(other)),
    };
    let cs = Capstone::new()
        .x86()
        .mode(mode)
        .syntax(ArchSyntax::Intel)
        .detail(true)
        .build()?;
    Ok(cs)
}
