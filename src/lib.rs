//! Core IR, traits, and dispatch for the fission disassembler.
//!
//! fission recovers basic blocks from stripped ELF and PE binaries. It has no
//! symbol table to lean on: starting from candidate addresses, a pluggable
//! strategy proposes speculative block candidates ("mutants"), a linear sweep
//! decodes each one until a control-flow terminator or an invalid byte, and
//! the strategy scores and selects which candidates to commit. A per-section
//! address map records which bytes have been claimed as code.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::fs;
//! use fission::{engine, loader, Options};
//!
//! let data = fs::read("path/to/binary").unwrap();
//!
//! // Parse the binary format and lift sections
//! let binary = loader::load(&data).unwrap();
//!
//! // Recover basic blocks in every code section
//! let opts = Options::default();
//! let sections = engine::disasm(&binary, &opts).unwrap();
//!
//! for dis in &sections {
//!     println!("{}: {} blocks", dis.section.name, dis.blocks.len());
//! }
//! ```

pub mod addrmap;
pub mod classify;
pub mod decoder;
pub mod engine;
pub mod format;
pub mod loader;
pub mod strategy;
#[cfg(feature = "extension-module")]
pub mod python;

use std::fmt;
use std::io;
use std::ops::{BitOr, BitOrAssign};

use crate::addrmap::AddressMap;
use crate::strategy::StrategyKind;

/// Represents a virtual memory address in the binary's load image
pub type Address = u64;

/// CPU architectures a loaded binary may report.
///
/// Only `X86` has a sweep implementation; the engine fails explicitly on
/// everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Arch {
    /// x86 (any bit width; see `Binary::bits`)
    X86,
    /// ARM (32-bit)
    Arm,
    /// AArch64
    AArch64,
    /// MIPS
    Mips,
    /// RISC-V
    RiscV,
    /// Unknown architecture
    Unknown,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86 => write!(f, "x86"),
            Arch::Arm => write!(f, "arm"),
            Arch::AArch64 => write!(f, "aarch64"),
            Arch::Mips => write!(f, "mips"),
            Arch::RiscV => write!(f, "riscv"),
            Arch::Unknown => write!(f, "unknown"),
        }
    }
}

/// Container format of the loaded binary.
///
/// The distinction matters beyond metadata: MSVC pads between functions with
/// `int3` and rarely emits semantic nops, so the effective-nop test during
/// the sweep is keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Elf,
    Pe,
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryFormat::Elf => write!(f, "ELF"),
            BinaryFormat::Pe => write!(f, "PE"),
        }
    }
}

/// Section classification as reported by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Code,
    Data,
}

/// A loaded section: name, classification, base VMA, and raw bytes.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub kind: SectionType,
    pub vma: Address,
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl Section {
    pub fn new(name: String, kind: SectionType, vma: Address, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            name,
            kind,
            vma,
            size,
            bytes,
        }
    }

    /// End VMA of the section (exclusive).
    pub fn end(&self) -> Address {
        self.vma + self.size
    }

    /// True if `addr` falls inside this section.
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.vma && addr < self.end()
    }
}

/// A loaded binary: architecture tag, bit width, container format, and the
/// ordered sections lifted by the loader.
#[derive(Debug, Clone)]
pub struct Binary {
    pub arch: Arch,
    pub bits: u32,
    pub format: BinaryFormat,
    pub entry: Address,
    pub sections: Vec<Section>,
}

/// Memory operand fields: `segment:[base + index*scale + disp]`.
///
/// Register fields hold raw decoder register ids; `0` means "no register".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemOperand {
    pub segment: u16,
    pub base: u16,
    pub index: u16,
    pub scale: i32,
    pub disp: i64,
}

/// One decoded operand, a closed sum over the shapes x86 operands take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperandKind {
    /// Register operand (raw decoder register id)
    Reg(u16),
    /// Immediate operand
    Imm(i64),
    /// Memory operand
    Mem(MemOperand),
    /// Floating-point immediate
    Fp(f64),
    /// Absent or unrecognized operand
    None,
}

/// Operand kind plus its byte size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    pub size: u8,
}

/// Classification flags attached to a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsnFlags(u16);

impl InsnFlags {
    pub const NONE: InsnFlags = InsnFlags(0);
    /// Effective no-op (syntactic nop, semantic nop, or PE `int3` padding)
    pub const NOP: InsnFlags = InsnFlags(1 << 0);
    /// Return instruction
    pub const RET: InsnFlags = InsnFlags(1 << 1);
    /// Jump, conditional or not
    pub const JMP: InsnFlags = InsnFlags(1 << 2);
    /// Conditional control flow
    pub const COND: InsnFlags = InsnFlags(1 << 3);
    /// Any control-flow instruction
    pub const CFLOW: InsnFlags = InsnFlags(1 << 4);
    /// Call instruction
    pub const CALL: InsnFlags = InsnFlags(1 << 5);
    /// Control flow through a register or memory operand
    pub const INDIRECT: InsnFlags = InsnFlags(1 << 6);

    pub fn contains(self, other: InsnFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: InsnFlags) {
        self.0 |= other.0;
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

impl BitOr for InsnFlags {
    type Output = InsnFlags;
    fn bitor(self, rhs: InsnFlags) -> InsnFlags {
        InsnFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for InsnFlags {
    fn bitor_assign(&mut self, rhs: InsnFlags) {
        self.0 |= rhs.0;
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Instruction {
    /// Address of the instruction
    pub start: Address,
    /// Size of the instruction in bytes
    pub size: u8,
    /// Effective address size in bits (16, 32, or 64)
    pub addr_size: u8,
    /// Instruction mnemonic (e.g., "mov", "ret")
    pub mnemonic: String,
    /// Operand string as formatted by the decoder
    pub op_str: String,
    /// Classification flags
    pub flags: InsnFlags,
    /// Requires ring-0 to execute
    pub privileged: bool,
    /// `int3` or `ud2`
    pub trap: bool,
    /// Branch target, when control flow carries an immediate operand
    pub target: Option<Address>,
    /// Structured operands in decoder order
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Address one past the last byte of the instruction.
    pub fn end(&self) -> Address {
        self.start + self.size as Address
    }

    pub fn is_cflow(&self) -> bool {
        self.flags.contains(InsnFlags::CFLOW)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op_str.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{}\t{}", self.mnemonic, self.op_str)
        }
    }
}

/// One basic-block candidate, committed or not.
///
/// A block covers `[start, end)`; when `invalid` holds the byte range does
/// not decode and `insns` may be empty. `alive` marks blocks a strategy
/// selected for committal. `scratch` is a slot strategies may use between
/// their own `mutate`/`score`/`select` calls; the engine never touches it.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub start: Address,
    pub end: Address,
    pub insns: Vec<Instruction>,
    /// Index of the owning `DisasmSection` within the engine's output
    pub section_id: usize,
    pub invalid: bool,
    pub padding: bool,
    pub trap: bool,
    pub privileged: bool,
    pub alive: bool,
    pub score: f64,
    pub scratch: u64,
}

impl BasicBlock {
    /// Create an empty candidate seeded at `start`.
    pub fn seeded_at(start: Address) -> Self {
        BasicBlock {
            start,
            end: start,
            ..Default::default()
        }
    }

    /// Size of the block in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Last instruction of the block, if any decoded.
    pub fn last_insn(&self) -> Option<&Instruction> {
        self.insns.last()
    }
}

/// Per-section disassembly state: the section under exploration, its address
/// map, and the blocks committed so far.
#[derive(Debug)]
pub struct DisasmSection<'a> {
    /// Index of this entry in the engine's output list
    pub id: usize,
    pub section: &'a Section,
    pub addrmap: AddressMap,
    pub blocks: Vec<BasicBlock>,
}

impl<'a> DisasmSection<'a> {
    pub fn new(id: usize, section: &'a Section) -> Self {
        Self {
            id,
            section,
            addrmap: AddressMap::new(),
            blocks: Vec::new(),
        }
    }

    /// Sort committed blocks ascending by start address.
    pub fn sort_blocks(&mut self) {
        self.blocks.sort_by_key(|b| (b.start, b.end));
    }

    /// Print all committed blocks, sorted by start address.
    pub fn write_blocks<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "<Section {} {} @0x{:016x} (size {})>",
            self.section.name,
            match self.section.kind {
                SectionType::Code => "C",
                SectionType::Data => "D",
            },
            self.section.vma,
            self.section.size
        )?;
        writeln!(out)?;
        let mut sorted: Vec<&BasicBlock> = self.blocks.iter().collect();
        sorted.sort_by_key(|b| (b.start, b.end));
        for bb in sorted {
            let mut marks = String::new();
            if bb.invalid {
                marks.push_str(" invalid");
            }
            if bb.padding {
                marks.push_str(" padding");
            }
            if bb.trap {
                marks.push_str(" trap");
            }
            if bb.privileged {
                marks.push_str(" privileged");
            }
            writeln!(
                out,
                "BB @0x{:016x} (score {:.5}){}",
                bb.start, bb.score, marks
            )?;
            for ins in &bb.insns {
                writeln!(out, "  0x{:016x}: {}", ins.start, ins)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Process-wide configuration for a disassembly run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Skip `Data` sections when set (the default); include them otherwise
    pub only_code_sections: bool,
    /// Exploration heuristic, selected once at engine start
    pub strategy: StrategyKind,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            only_code_sections: true,
            strategy: StrategyKind::Recursive,
        }
    }
}

/// Error type for disassembly operations
#[derive(Debug, thiserror::Error)]
pub enum DisassemblyError {
    /// Failed to parse binary format
    #[error("failed to parse binary format: {0}")]
    Parsing(String),

    /// Decoder error
    #[error("decoder error: {0}")]
    Decoder(#[from] capstone::Error),

    /// No sweep implementation for the binary's architecture
    #[error("disassembly for architecture {0} is not supported")]
    UnsupportedArchitecture(Arch),

    /// Architecture is supported but the bit width is not
    #[error("unsupported bit width {0}")]
    UnsupportedBitWidth(u32),

    /// A strategy proposed a block outside its section
    #[error("basic block at 0x{start:x} points outside of section '{section}'")]
    BlockOutOfSection { start: Address, section: String },

    /// A strategy signaled a fatal error from `score` or `select`
    #[error("strategy error: {0}")]
    Strategy(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output formatting error
    #[error("format error: {0}")]
    Format(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insn_flags_combine() {
        let mut flags = InsnFlags::CFLOW | InsnFlags::JMP;
        assert!(flags.contains(InsnFlags::CFLOW));
        assert!(flags.contains(InsnFlags::JMP));
        assert!(!flags.contains(InsnFlags::COND));

        flags |= InsnFlags::COND;
        assert!(flags.contains(InsnFlags::COND));
        assert!(flags.contains(InsnFlags::CFLOW | InsnFlags::JMP | InsnFlags::COND));
    }

    #[test]
    fn test_section_bounds() {
        let sec = Section::new(".text".into(), SectionType::Code, 0x1000, vec![0u8; 0x40]);
        assert_eq!(sec.size, 0x40);
        assert_eq!(sec.end(), 0x1040);
        assert!(sec.contains(0x1000));
        assert!(sec.contains(0x103f));
        assert!(!sec.contains(0x1040));
        assert!(!sec.contains(0xfff));
    }

    #[test]
    fn test_basic_block_helpers() {
        let mut bb = BasicBlock::seeded_at(0x1000);
        assert_eq!(bb.start, 0x1000);
        assert_eq!(bb.end, 0x1000);
        assert!(bb.is_empty());

        bb.insns.push(Instruction {
            start: 0x1000,
            size: 1,
            mnemonic: "ret".to_string(),
            flags: InsnFlags::CFLOW | InsnFlags::RET,
            ..Default::default()
        });
        bb.end = 0x1001;
        assert_eq!(bb.len(), 1);
        assert_eq!(bb.last_insn().unwrap().mnemonic, "ret");
        assert!(bb.last_insn().unwrap().is_cflow());
    }

    #[test]
    fn test_sort_blocks_orders_by_start() {
        let sec = Section::new(".text".into(), SectionType::Code, 0x1000, vec![0u8; 0x10]);
        let mut dis = DisasmSection::new(0, &sec);
        for start in [0x1008u64, 0x1000, 0x1004] {
            let mut bb = BasicBlock::seeded_at(start);
            bb.end = start + 4;
            dis.blocks.push(bb);
        }
        dis.sort_blocks();
        let starts: Vec<Address> = dis.blocks.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![0x1000, 0x1004, 0x1008]);
    }

    #[test]
    fn test_write_blocks_renders_sorted_listing() {
        let sec = Section::new(".text".into(), SectionType::Code, 0x1000, vec![0x90, 0xc3]);
        let mut dis = DisasmSection::new(0, &sec);
        let mut bb = BasicBlock::seeded_at(0x1000);
        bb.end = 0x1001;
        bb.insns.push(Instruction {
            start: 0x1000,
            size: 1,
            mnemonic: "nop".to_string(),
            flags: InsnFlags::NOP,
            ..Default::default()
        });
        bb.padding = true;
        dis.blocks.push(bb);

        let mut out = Vec::new();
        dis.write_blocks(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<Section .text C"));
        assert!(text.contains("padding"));
        assert!(text.contains("nop"));
    }

    #[test]
    fn test_instruction_display() {
        let ins = Instruction {
            start: 0x400000,
            size: 3,
            mnemonic: "mov".to_string(),
            op_str: "eax, ebx".to_string(),
            ..Default::default()
        };
        assert_eq!(ins.to_string(), "mov\teax, ebx");
        assert_eq!(ins.end(), 0x400003);

        let ret = Instruction {
            mnemonic: "ret".to_string(),
            ..Default::default()
        };
        assert_eq!(ret.to_string(), "ret");
    }

    #[test]
    fn test_error_display() {
        let err = DisassemblyError::UnsupportedArchitecture(Arch::AArch64);
        assert_eq!(
            err.to_string(),
            "disassembly for architecture aarch64 is not supported"
        );

        let err = DisassemblyError::BlockOutOfSection {
            start: 0x2000,
            section: ".text".to_string(),
        };
        assert!(err.to_string().contains("0x2000"));
        assert!(err.to_string().contains(".text"));
    }
}
