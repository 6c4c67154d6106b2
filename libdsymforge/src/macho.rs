//! Mach-O container assembly. `DsymEncoder` binds the string table, symbol
//! table and DWARF payloads into one debug-symbol companion file whose load
//! commands and section headers agree with where the bytes actually land.

use std::mem;

use dsymforge_proc_macros::ByteSwap;

use crate::byte_swap::*;
use crate::dwarf::{build_debug_abbrev, build_debug_info, build_debug_line};
use crate::error::DsymError;
use crate::string_table::StringTable;
use crate::symbol::Symbol;
use crate::symbol_table::{SymbolTableEntry, SymbolTableResult, build_symbol_table};
use crate::target::Arch;

const MH_MAGIC_64: u32 = 0xFEED_FACF;
const MH_DSYM: u32     = 0x0000_000A;

const CPU_TYPE_ARM64: u32         = 0x0100_000C;
const CPU_SUBTYPE_ARM64_ALL: u32  = 0x0000_0000;
const CPU_TYPE_X86_64: u32        = 0x0100_0007;
const CPU_SUBTYPE_X86_64_ALL: u32 = 0x0000_0003;

const LC_SYMTAB: u32     = 0x0000_0002;
const LC_SEGMENT_64: u32 = 0x0000_0019;
const LC_UUID: u32       = 0x0000_001B;

const VM_PROT_NONE: u32    = 0x0000_0000;
const VM_PROT_READ: u32    = 0x0000_0001;
const VM_PROT_EXECUTE: u32 = 0x0000_0004;

const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;
const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x0000_0400;

pub const PAGE_SIZE: u64 = 0x1000;

/// File offset of the symbol table. The header and all six load commands fit
/// below it; `test_load_commands_fit_below_symbol_table` keeps that true.
pub const SYMBOL_TABLE_OFFSET: u64 = 0x1000;

/// Zero bytes reserved past the end of the string table.
const STRING_TABLE_PADDING: u64 = 2;

const NUM_LOAD_COMMANDS: u32 = 6;
const SIZE_OF_COMMANDS: u32 = (mem::size_of::<UuidCommand>()
    + mem::size_of::<SymbolTableCommand>()
    + 4 * mem::size_of::<LcSegment64>()
    + 5 * mem::size_of::<Section64>()) as u32;

const DWARF_SECTION_NAMES: [&str; 4] = ["__debug_line", "__debug_info", "__debug_abbrev", "__debug_str"];

#[repr(C)]
#[derive(ByteSwap)]
struct MachHeader {
    magic: u32,
    cpu_type: u32,
    cpu_subtype: u32,
    file_type: u32,
    num_commands: u32,
    size_of_commands: u32,
    flags: u32,
    reserved: u32,
}

#[repr(C)]
#[derive(ByteSwap)]
struct LcSegment64 {
    command: u32,
    command_size: u32,
    name: [u8; 16],
    vm_addr: u64,
    vm_size: u64,
    file_offset: u64,
    file_size: u64,
    max_vm_protection: u32,
    initial_vm_protection: u32,
    num_sections: u32,
    flags: u32,
}

#[repr(C)]
#[derive(ByteSwap)]
struct Section64 {
    name: [u8; 16],
    segment_name: [u8; 16],
    vm_addr: u64,
    vm_size: u64,
    file_offset: u32,
    alignment: u32, // stored as log base 2
    relocations_file_offset: u32,
    num_relocations: u32,
    flags: u32,
    reserved: [u32; 3],
}

#[repr(C)]
#[derive(ByteSwap)]
struct SymbolTableCommand {
    command: u32,
    command_size: u32,
    symbol_table_offset: u32,
    num_symbols: u32,
    string_table_offset: u32,
    string_table_size: u32,
}

#[repr(C)]
#[derive(ByteSwap)]
struct UuidCommand {
    command: u32,
    command_size: u32,
    uuid: [u8; 16],
}

fn encode_string_16(name: &str) -> [u8; 16] {
    let mut out = [0; 16];
    debug_assert!(name.len() <= 16);
    debug_assert!(name.is_ascii());
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

#[derive(Clone, Copy)]
struct SegmentExtent {
    vm_addr: u64,
    vm_size: u64,
    file_offset: u64,
    file_size: u64,
}

/// Every offset, address and size the load commands will claim. Computed in
/// one forward pass; each quantity depends only on earlier ones.
struct DsymLayout {
    vm_base: u64,
    string_table_offset: u64,
    string_table_size: u64,
    text: SegmentExtent,
    text_section_addr: u64,
    text_section_size: u64,
    link_edit: SegmentExtent,
    dwarf: SegmentExtent,
    dwarf_section_offsets: [u64; 4],
    dwarf_section_sizes: [u64; 4],
}

fn compute_layout(
    symbol_table: &SymbolTableResult,
    string_table_len: u64,
    debug_line_len: u64,
    debug_info_len: u64,
    debug_abbrev_len: u64,
    vm_base: u64,
) -> DsymLayout {
    let string_table_offset = SYMBOL_TABLE_OFFSET + symbol_table.buffer.len() as u64;
    let string_table_size = string_table_len + STRING_TABLE_PADDING;

    // Span from the start of the symbol records through the end of the
    // strings, shifted up by how far past the segment base the first symbol
    // sits. The text section is sized to cover the whole span.
    let save_offset = symbol_table.first_value;
    let total_size = string_table_offset + string_table_size - SYMBOL_TABLE_OFFSET;
    let string_end = save_offset + total_size;

    let text = SegmentExtent {
        vm_addr: vm_base,
        vm_size: nearest_multiple_of!(string_end, PAGE_SIZE),
        file_offset: 0,
        file_size: string_end,
    };

    let link_edit_file_size = symbol_table.num_symbols as u64 * mem::size_of::<SymbolTableEntry>() as u64
        + string_table_size;
    let link_edit = SegmentExtent {
        vm_addr: vm_base + text.vm_size,
        vm_size: nearest_multiple_of!(link_edit_file_size, PAGE_SIZE),
        file_offset: SYMBOL_TABLE_OFFSET,
        file_size: link_edit_file_size,
    };

    // The DWARF region begins at the file position matching the end of
    // link-edit's virtual span, with its four sections tiled contiguously.
    let dwarf_begin = text.vm_size + link_edit.vm_size;
    let dwarf_section_sizes = [debug_line_len, debug_info_len, debug_abbrev_len, string_table_len];
    let mut dwarf_section_offsets = [0; 4];
    let mut offset = dwarf_begin;
    for (slot, size) in dwarf_section_offsets.iter_mut().zip(dwarf_section_sizes) {
        *slot = offset;
        offset += size;
    }
    let dwarf = SegmentExtent {
        vm_addr: vm_base + dwarf_begin,
        vm_size: nearest_multiple_of!(offset - dwarf_begin, PAGE_SIZE),
        file_offset: dwarf_begin,
        file_size: offset - dwarf_begin,
    };

    DsymLayout {
        vm_base,
        string_table_offset,
        string_table_size,
        text,
        text_section_addr: vm_base + save_offset,
        text_section_size: total_size,
        link_edit,
        dwarf,
        dwarf_section_offsets,
        dwarf_section_sizes,
    }
}

fn parse_uuid(uuid: &str) -> Result<[u8; 16], DsymError> {
    let digits: Vec<u8> = uuid.bytes().filter(|&digit| digit != b'-').collect();
    if digits.len() != 32 {
        return Err(DsymError::MalformedUuid { uuid: uuid.to_string() });
    }
    let mut bytes = [0; 16];
    for (i, byte) in bytes.iter_mut().enumerate() {
        match (hex_value(digits[2 * i]), hex_value(digits[2 * i + 1])) {
            (Some(hi), Some(lo)) => *byte = hi << 4 | lo,
            _ => return Err(DsymError::MalformedUuid { uuid: uuid.to_string() }),
        }
    }
    Ok(bytes)
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Bytes destined for a fixed file offset. The container is the ordered
/// concatenation of these, with zero fill between them.
struct Placement {
    offset: u64,
    region: &'static str,
    bytes: Vec<u8>,
}

fn concat_placements(placements: Vec<Placement>) -> Result<Vec<u8>, DsymError> {
    let mut buf = Buffer::default();
    for placement in placements {
        let position = buf.pos() as u64;
        if placement.offset < position {
            return Err(DsymError::LayoutOverflow {
                region: placement.region,
                offset: placement.offset,
                position,
            });
        }
        buf.pad_with_zeroes((placement.offset - position) as usize);
        buf.push_bytes(&placement.bytes);
    }
    Ok(buf.data)
}

pub struct DsymEncoder {
    arch: Arch,
}

impl DsymEncoder {
    pub fn new(arch: Arch) -> Self {
        DsymEncoder { arch }
    }

    pub fn encode(&self, uuid: &str, symbols: &[Symbol], vm_addr_hint: u64) -> Result<Vec<u8>, DsymError> {
        let uuid = parse_uuid(uuid)?;

        let strings = StringTable::build(symbols);
        let symbol_table = build_symbol_table(symbols, &strings)?;

        let vm_base = nearest_multiple_of!(vm_addr_hint, PAGE_SIZE);
        let debug_line = build_debug_line();
        let debug_info = build_debug_info(symbols, &strings, vm_base)?;
        let debug_abbrev = build_debug_abbrev();

        let layout = compute_layout(
            &symbol_table,
            strings.buf.data.len() as u64,
            debug_line.len() as u64,
            debug_info.len() as u64,
            debug_abbrev.len() as u64,
            vm_base,
        );
        let commands = self.load_commands(&layout, uuid, symbol_table.num_symbols);

        // The string table appears twice: once behind the symbol records with
        // the reserved zero bytes after it, once as the __debug_str payload.
        let mut string_region = strings.buf.data.clone();
        string_region.resize(string_region.len() + STRING_TABLE_PADDING as usize, 0);

        let [line_offset, info_offset, abbrev_offset, str_offset] = layout.dwarf_section_offsets;
        concat_placements(vec![
            Placement { offset: 0, region: "load commands", bytes: commands },
            Placement { offset: SYMBOL_TABLE_OFFSET, region: "symbol table", bytes: symbol_table.buffer },
            Placement { offset: layout.string_table_offset, region: "string table", bytes: string_region },
            Placement { offset: line_offset, region: "__debug_line", bytes: debug_line },
            Placement { offset: info_offset, region: "__debug_info", bytes: debug_info },
            Placement { offset: abbrev_offset, region: "__debug_abbrev", bytes: debug_abbrev },
            Placement { offset: str_offset, region: "__debug_str", bytes: strings.buf.data },
        ])
    }

    fn load_commands(&self, layout: &DsymLayout, uuid: [u8; 16], num_symbols: u32) -> Vec<u8> {
        let (cpu_type, cpu_subtype) = match self.arch {
            Arch::Arm64 => (CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL),
            Arch::X86_64 => (CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL),
        };
        let mut buf = Buffer::default();
        buf.push(MachHeader {
            magic: MH_MAGIC_64,
            cpu_type,
            cpu_subtype,
            file_type: MH_DSYM,
            num_commands: NUM_LOAD_COMMANDS,
            size_of_commands: SIZE_OF_COMMANDS,
            flags: 0,
            reserved: 0,
        });
        let commands_begin = buf.pos();

        buf.push(UuidCommand {
            command: LC_UUID,
            command_size: mem::size_of::<UuidCommand>() as u32,
            uuid,
        });
        buf.push(SymbolTableCommand {
            command: LC_SYMTAB,
            command_size: mem::size_of::<SymbolTableCommand>() as u32,
            symbol_table_offset: SYMBOL_TABLE_OFFSET as u32,
            num_symbols,
            string_table_offset: layout.string_table_offset as u32,
            string_table_size: layout.string_table_size as u32,
        });
        buf.push(LcSegment64 {
            command: LC_SEGMENT_64,
            command_size: mem::size_of::<LcSegment64>() as u32,
            name: encode_string_16("__PAGEZERO"),
            vm_addr: 0,
            vm_size: 0,
            file_offset: 0,
            file_size: 0,
            max_vm_protection: VM_PROT_NONE,
            initial_vm_protection: VM_PROT_NONE,
            num_sections: 0,
            flags: 0,
        });
        buf.push(LcSegment64 {
            command: LC_SEGMENT_64,
            command_size: (mem::size_of::<LcSegment64>() + mem::size_of::<Section64>()) as u32,
            name: encode_string_16("__TEXT"),
            vm_addr: layout.text.vm_addr,
            vm_size: layout.text.vm_size,
            file_offset: layout.text.file_offset,
            file_size: layout.text.file_size,
            max_vm_protection: VM_PROT_READ | VM_PROT_EXECUTE,
            initial_vm_protection: VM_PROT_READ | VM_PROT_EXECUTE,
            num_sections: 1,
            flags: 0,
        });
        buf.push(Section64 {
            name: encode_string_16("__text"),
            segment_name: encode_string_16("__TEXT"),
            vm_addr: layout.text_section_addr,
            vm_size: layout.text_section_size,
            file_offset: 0,
            alignment: 2,
            relocations_file_offset: 0,
            num_relocations: 0,
            flags: S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS,
            reserved: [0; 3],
        });
        buf.push(LcSegment64 {
            command: LC_SEGMENT_64,
            command_size: mem::size_of::<LcSegment64>() as u32,
            name: encode_string_16("__LINKEDIT"),
            vm_addr: layout.link_edit.vm_addr,
            vm_size: layout.link_edit.vm_size,
            file_offset: layout.link_edit.file_offset,
            file_size: layout.link_edit.file_size,
            max_vm_protection: VM_PROT_READ,
            initial_vm_protection: VM_PROT_READ,
            num_sections: 0,
            flags: 0,
        });
        buf.push(LcSegment64 {
            command: LC_SEGMENT_64,
            command_size: (mem::size_of::<LcSegment64>() + 4 * mem::size_of::<Section64>()) as u32,
            name: encode_string_16("__DWARF"),
            vm_addr: layout.dwarf.vm_addr,
            vm_size: layout.dwarf.vm_size,
            file_offset: layout.dwarf.file_offset,
            file_size: layout.dwarf.file_size,
            max_vm_protection: VM_PROT_READ,
            initial_vm_protection: VM_PROT_READ,
            num_sections: 4,
            flags: 0,
        });
        for ((name, &offset), &size) in DWARF_SECTION_NAMES.iter()
            .zip(&layout.dwarf_section_offsets)
            .zip(&layout.dwarf_section_sizes)
        {
            buf.push(Section64 {
                name: encode_string_16(name),
                segment_name: encode_string_16("__DWARF"),
                vm_addr: layout.vm_base + offset,
                vm_size: size,
                file_offset: offset as u32,
                alignment: 0,
                relocations_file_offset: 0,
                num_relocations: 0,
                flags: 0,
                reserved: [0; 3],
            });
        }

        debug_assert_eq!(buf.pos() - commands_begin, SIZE_OF_COMMANDS as usize);
        buf.data
    }
}
