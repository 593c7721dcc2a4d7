//! Goblin-based binary loader.
//!
//! Lifts an ELF or PE image into the `Binary`/`Section` model the engine
//! consumes. Only allocated sections with file-backed bytes are lifted;
//! section bytes are copied once here and immutable for the rest of the run.

use goblin::{elf, pe, Object};
use log::debug;

use crate::{Address, Arch, Binary, BinaryFormat, DisassemblyError, Section, SectionType};

/// Parse `data` and lift its sections.
///
/// Mach-O and archive inputs parse but are rejected: the engine's nop policy
/// is keyed on the ELF/PE distinction, so anything else has no sound
/// interpretation here.
pub fn load(data: &[u8]) -> Result<Binary, DisassemblyError> {
    match Object::parse(data) {
        Ok(Object::Elf(elf)) => load_elf(&elf, data),
        Ok(Object::PE(pe)) => load_pe(&pe, data),
        Ok(_) => Err(DisassemblyError::Parsing(
            "unsupported container format (expected ELF or PE)".to_string(),
        )),
        Err(e) => Err(DisassemblyError::Parsing(e.to_string())),
    }
}

fn arch_from_elf_machine(e_machine: u16) -> Arch {
    match e_machine {
        elf::header::EM_386 | elf::header::EM_X86_64 => Arch::X86,
        elf::header::EM_ARM => Arch::Arm,
        elf::header::EM_AARCH64 => Arch::AArch64,
        elf::header::EM_MIPS => Arch::Mips,
        elf::header::EM_RISCV => Arch::RiscV,
        _ => Arch::Unknown,
    }
}

fn arch_from_coff_machine(machine: u16) -> Arch {
    match machine {
        pe::header::COFF_MACHINE_X86 | pe::header::COFF_MACHINE_X86_64 => Arch::X86,
        pe::header::COFF_MACHINE_ARM => Arch::Arm,
        pe::header::COFF_MACHINE_ARM64 => Arch::AArch64,
        _ => Arch::Unknown,
    }
}

fn load_elf(elf: &elf::Elf<'_>, data: &[u8]) -> Result<Binary, DisassemblyError> {
    let arch = arch_from_elf_machine(elf.header.e_machine);
    let bits = if elf.is_64 { 64 } else { 32 };

    let mut sections = Vec::new();
    for sh in &elf.section_headers {
        if sh.sh_flags & u64::from(elf::section_header::SHF_ALLOC) == 0 || sh.sh_size == 0 {
            continue;
        }
        // NOBITS sections (.bss) have no file bytes to decode
        let range = match sh.file_range() {
            Some(range) => range,
            None => continue,
        };
        let name = elf
            .shdr_strtab
            .get_at(sh.sh_name)
            .unwrap_or("")
            .to_string();
        let bytes = data.get(range).ok_or_else(|| {
            DisassemblyError::Parsing(format!("section '{}' extends past end of file", name))
        })?;
        let kind = if sh.is_executable() {
            SectionType::Code
        } else {
            SectionType::Data
        };
        sections.push(Section::new(name, kind, sh.sh_addr, bytes.to_vec()));
    }

    debug!(
        "loaded ELF: {} bits={} with {} sections",
        arch,
        bits,
        sections.len()
    );

    Ok(Binary {
        arch,
        bits,
        format: BinaryFormat::Elf,
        entry: elf.entry,
        sections,
    })
}

fn load_pe(pe: &pe::PE<'_>, data: &[u8]) -> Result<Binary, DisassemblyError> {
    let arch = arch_from_coff_machine(pe.header.coff_header.machine);
    let bits = if pe.is_64 { 64 } else { 32 };
    let image_base = pe.image_base as Address;

    let mut sections = Vec::new();
    for sect in &pe.sections {
        let raw_off = sect.pointer_to_raw_data as usize;
        let raw_size = sect.size_of_raw_data as usize;
        if raw_size == 0 {
            continue;
        }
        let virt_size = if sect.virtual_size == 0 {
            raw_size
        } else {
            sect.virtual_size as usize
        };
        let name = sect.name().unwrap_or("").to_string();
        let raw = data
            .get(raw_off..raw_off + raw_size.min(virt_size))
            .ok_or_else(|| {
                DisassemblyError::Parsing(format!("section '{}' extends past end of file", name))
            })?;
        // raw data may undershoot the mapped size; the tail is zero-filled
        let mut bytes = raw.to_vec();
        bytes.resize(virt_size, 0);

        let executable =
            sect.characteristics & pe::section_table::IMAGE_SCN_MEM_EXECUTE != 0;
        let kind = if executable {
            SectionType::Code
        } else {
            SectionType::Data
        };
        sections.push(Section::new(
            name,
            kind,
            image_base + sect.virtual_address as Address,
            bytes,
        ));
    }

    debug!(
        "loaded PE: {} bits={} with {} sections",
        arch,
        bits,
        sections.len()
    );

    Ok(Binary {
        arch,
        bits,
        format: BinaryFormat::Pe,
        entry: pe.entry as Address,
        sections,
    })
}
