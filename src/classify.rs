//! Per-instruction classification predicates.
//!
//! Pure functions over a single decoded instruction. The sweep combines these
//! into block-boundary decisions; nothing here looks at neighboring
//! instructions or at the address map.

use capstone::arch::x86::{X86Insn, X86InsnDetail, X86OperandType, X86Reg};
use capstone::arch::DetailsArchInsn;
use capstone::{Insn, InsnDetail, InsnGroupId, InsnGroupType};

/// Syntactic no-op: `nop` or `fnop`.
pub fn is_nop_ins(ins: &Insn<'_>) -> bool {
    let id = ins.id().0;
    id == X86Insn::X86_INS_NOP as u32 || id == X86Insn::X86_INS_FNOP as u32
}

/// Instruction with no observable effect that is not a syntactic nop.
///
/// Known cases, checked against the structured operands:
/// - `mov reg, reg` with identical registers
/// - `xchg reg, reg` with identical registers
/// - `lea reg, [reg + 0x0]` and `lea reg, [reg + eiz*s + 0x0]`
///
/// True semantic analysis would catch more; these are the idioms compilers
/// actually emit as padding.
pub fn is_semantic_nop_ins(ins: &Insn<'_>, x86: &X86InsnDetail<'_>) -> bool {
    let id = ins.id().0;
    let ops: Vec<_> = x86.operands().collect();

    if id == X86Insn::X86_INS_MOV as u32 || id == X86Insn::X86_INS_XCHG as u32 {
        if let [a, b] = ops.as_slice() {
            if let (X86OperandType::Reg(ra), X86OperandType::Reg(rb)) = (&a.op_type, &b.op_type) {
                return ra == rb;
            }
        }
        return false;
    }

    if id == X86Insn::X86_INS_LEA as u32 {
        if let [dst, src] = ops.as_slice() {
            if let (X86OperandType::Reg(reg), X86OperandType::Mem(mem)) =
                (&dst.op_type, &src.op_type)
            {
                // scale is irrelevant: the index is absent or the zero register
                let index_ok =
                    mem.index().0 == 0 || mem.index().0 as u32 == X86Reg::X86_REG_EIZ as u32;
                return mem.segment().0 == 0
                    && mem.base() == *reg
                    && index_ok
                    && mem.disp() == 0;
            }
        }
        return false;
    }

    false
}

/// `int3` or `ud2`.
pub fn is_trap_ins(ins: &Insn<'_>) -> bool {
    let id = ins.id().0;
    id == X86Insn::X86_INS_INT3 as u32 || id == X86Insn::X86_INS_UD2 as u32
}

/// Group ids the decoder attaches to control-flow instructions.
pub fn is_cflow_group(group: InsnGroupId) -> bool {
    group == InsnGroupId(InsnGroupType::CS_GRP_JUMP as u8)
        || group == InsnGroupId(InsnGroupType::CS_GRP_CALL as u8)
        || group == InsnGroupId(InsnGroupType::CS_GRP_RET as u8)
        || group == InsnGroupId(InsnGroupType::CS_GRP_IRET as u8)
}

/// Any control-flow instruction (jump, call, return, interrupt return).
pub fn is_cflow_ins(detail: &InsnDetail<'_>) -> bool {
    detail.groups().iter().any(|g| is_cflow_group(*g))
}

/// `call` or `lcall`.
pub fn is_call_ins(ins: &Insn<'_>) -> bool {
    let id = ins.id().0;
    id == X86Insn::X86_INS_CALL as u32 || id == X86Insn::X86_INS_LCALL as u32
}

/// `ret` or `retf`.
pub fn is_ret_ins(ins: &Insn<'_>) -> bool {
    let id = ins.id().0;
    id == X86Insn::X86_INS_RET as u32 || id == X86Insn::X86_INS_RETF as u32
}

/// Unconditional `jmp` only.
pub fn is_unconditional_jmp_ins(ins: &Insn<'_>) -> bool {
    ins.id().0 == X86Insn::X86_INS_JMP as u32
}

/// Conditional jumps: the `jcc` family plus `jcxz`/`jecxz`/`jrcxz`.
/// Unconditional `jmp` is excluded.
pub fn is_conditional_cflow_ins(ins: &Insn<'_>) -> bool {
    let id = ins.id().0;
    const CONDITIONALS: &[X86Insn] = &[
        X86Insn::X86_INS_JAE,
        X86Insn::X86_INS_JA,
        X86Insn::X86_INS_JBE,
        X86Insn::X86_INS_JB,
        X86Insn::X86_INS_JCXZ,
        X86Insn::X86_INS_JECXZ,
        X86Insn::X86_INS_JE,
        X86Insn::X86_INS_JGE,
        X86Insn::X86_INS_JG,
        X86Insn::X86_INS_JLE,
        X86Insn::X86_INS_JL,
        X86Insn::X86_INS_JNE,
        X86Insn::X86_INS_JNO,
        X86Insn::X86_INS_JNP,
        X86Insn::X86_INS_JNS,
        X86Insn::X86_INS_JO,
        X86Insn::X86_INS_JP,
        X86Insn::X86_INS_JRCXZ,
        X86Insn::X86_INS_JS,
    ];
    CONDITIONALS.iter().any(|&c| id == c as u32)
}

/// Instructions that fault outside ring 0 (or leak privileged state).
/// A block containing one of these rarely belongs to ordinary code.
pub fn is_privileged_ins(ins: &Insn<'_>) -> bool {
    let id = ins.id().0;
    const PRIVILEGED: &[X86Insn] = &[
        X86Insn::X86_INS_HLT,
        X86Insn::X86_INS_IN,
        X86Insn::X86_INS_INSB,
        X86Insn::X86_INS_INSW,
        X86Insn::X86_INS_INSD,
        X86Insn::X86_INS_OUT,
        X86Insn::X86_INS_OUTSB,
        X86Insn::X86_INS_OUTSW,
        X86Insn::X86_INS_OUTSD,
        X86Insn::X86_INS_RDMSR,
        X86Insn::X86_INS_WRMSR,
        X86Insn::X86_INS_RDPMC,
        X86Insn::X86_INS_RDTSC,
        X86Insn::X86_INS_LGDT,
        X86Insn::X86_INS_LLDT,
        X86Insn::X86_INS_LTR,
        X86Insn::X86_INS_LMSW,
        X86Insn::X86_INS_CLTS,
        X86Insn::X86_INS_INVD,
        X86Insn::X86_INS_INVLPG,
        X86Insn::X86_INS_WBINVD,
    ];
    PRIVILEGED.iter().any(|&p| id == p as u32)
}
