//! Minimal DWARF payloads: a placeholder line program, a fixed abbreviation
//! schema, and one subprogram DIE per symbol. Just enough for symbolication
//! tools that expect the debug sections to exist.

use crate::byte_swap::Buffer;
use crate::error::DsymError;
use crate::string_table::StringTable;
use crate::symbol::Symbol;

const DW_TAG_COMPILE_UNIT: u32 = 0x11;
const DW_TAG_SUBPROGRAM: u32   = 0x2E;

const DW_AT_NAME: u32   = 0x03;
const DW_AT_LOW_PC: u32 = 0x11;

const DW_FORM_ADDR: u32 = 0x01;
const DW_FORM_STRP: u32 = 0x0E;

const DW_CHILDREN_NO: u8  = 0;
const DW_CHILDREN_YES: u8 = 1;

const DW_LNE_END_SEQUENCE: u8 = 1;

// Abbreviation codes shared between the abbreviation table and the DIEs in
// debug_info that reference them.
const ABBREV_COMPILE_UNIT: u32 = 1;
const ABBREV_SUBPROGRAM: u32   = 2;

const LINE_VERSION: u16 = 2;
const INFO_VERSION: u16 = 4;
const ADDRESS_SIZE: u8  = 8;

const OPCODE_BASE: u8 = 10;
const STANDARD_OPCODE_LENGTHS: [u8; 9] = [0, 1, 1, 1, 1, 0, 0, 0, 1];

/// A line program holding nothing but its prologue and an end-of-sequence
/// marker: no directories, no file names, no rows.
pub fn build_debug_line() -> Vec<u8> {
    let mut buf = Buffer::default();
    let unit_length = buf.alloc::<u32>();
    buf.push(LINE_VERSION);
    let header_length = buf.alloc::<u32>();
    let prologue_begin = buf.pos();
    buf.push(1u8);  // minimum_instruction_length
    buf.push(1u8);  // default_is_stmt
    buf.push(-5i8); // line_base
    buf.push(14u8); // line_range
    buf.push(OPCODE_BASE);
    for length in STANDARD_OPCODE_LENGTHS {
        buf.push(length);
    }
    buf.push(0u8); // include_directories terminator
    buf.push(0u8); // file_names terminator
    let prologue_end = buf.pos();

    buf.push(0u8); // extended opcode escape
    buf.push(1u8); // opcode length
    buf.push(DW_LNE_END_SEQUENCE);

    let total = buf.pos();
    buf.get_mut(unit_length).set((total - unit_length.end()) as u32);
    buf.get_mut(header_length).set((prologue_end - prologue_begin) as u32);
    buf.data
}

pub fn build_debug_abbrev() -> Vec<u8> {
    let mut buf = Buffer::default();

    buf.push_uleb128(ABBREV_COMPILE_UNIT);
    buf.push_uleb128(DW_TAG_COMPILE_UNIT);
    buf.push(DW_CHILDREN_YES);
    buf.push_uleb128(0); // attribute list terminator
    buf.push_uleb128(0);

    buf.push_uleb128(ABBREV_SUBPROGRAM);
    buf.push_uleb128(DW_TAG_SUBPROGRAM);
    buf.push(DW_CHILDREN_NO);
    buf.push_uleb128(DW_AT_NAME);
    buf.push_uleb128(DW_FORM_STRP);
    buf.push_uleb128(DW_AT_LOW_PC);
    buf.push_uleb128(DW_FORM_ADDR);
    buf.push_uleb128(0);
    buf.push_uleb128(0);

    buf.push_uleb128(0); // end of abbreviations
    buf.data
}

/// One compile unit wrapping one subprogram DIE per symbol. Each DIE names
/// the symbol through its string-table offset (the string table doubles as
/// `__debug_str`) and places it at `vm_base` plus the symbol's value.
pub fn build_debug_info(symbols: &[Symbol], strings: &StringTable, vm_base: u64) -> Result<Vec<u8>, DsymError> {
    let mut buf = Buffer::default();
    let unit_length = buf.alloc::<u32>();
    buf.push(INFO_VERSION);
    buf.push(0u32); // abbreviation table offset
    buf.push(ADDRESS_SIZE);

    buf.push_uleb128(ABBREV_COMPILE_UNIT);
    for symbol in symbols {
        let name_offset = strings.offset_of(&symbol.name)
            .ok_or_else(|| DsymError::MissingName { name: symbol.name.clone() })?;
        buf.push_uleb128(ABBREV_SUBPROGRAM);
        buf.push(name_offset);             // DW_AT_name
        buf.push(vm_base + symbol.value);  // DW_AT_low_pc
    }
    buf.push_uleb128(0); // end of children

    let total = buf.pos();
    buf.get_mut(unit_length).set((total - unit_length.end()) as u32);
    Ok(buf.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_line_bytes() {
        let line = build_debug_line();
        assert_eq!(line, [
            0x19, 0x00, 0x00, 0x00, // unit_length
            0x02, 0x00,             // version
            0x10, 0x00, 0x00, 0x00, // header_length
            0x01,                   // minimum_instruction_length
            0x01,                   // default_is_stmt
            0xFB,                   // line_base
            0x0E,                   // line_range
            0x0A,                   // opcode_base
            0x00, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01,
            0x00,                   // include_directories terminator
            0x00,                   // file_names terminator
            0x00, 0x01, 0x01,       // end_sequence
        ]);
    }

    #[test]
    fn test_debug_line_length_fields_cover_their_spans() {
        let line = build_debug_line();
        let unit_length = u32::from_le_bytes([line[0], line[1], line[2], line[3]]);
        assert_eq!(unit_length as usize, line.len() - 4);
        let header_length = u32::from_le_bytes([line[6], line[7], line[8], line[9]]);
        // The prologue runs from past the header_length field to the first
        // program opcode, which here is the end_sequence escape.
        assert_eq!(header_length as usize, line.len() - 10 - 3);
    }

    #[test]
    fn test_debug_abbrev_bytes() {
        let abbrev = build_debug_abbrev();
        assert_eq!(abbrev, [
            0x01, 0x11, 0x01, 0x00, 0x00,                   // compile unit, has children
            0x02, 0x2E, 0x00, 0x03, 0x0E, 0x11, 0x01, 0x00, 0x00, // subprogram: name, low_pc
            0x00,
        ]);
    }

    #[test]
    fn test_debug_info_empty() {
        let info = build_debug_info(&[], &StringTable::default(), 0).unwrap();
        assert_eq!(info, [
            0x09, 0x00, 0x00, 0x00, // unit_length
            0x04, 0x00,             // version
            0x00, 0x00, 0x00, 0x00, // abbreviation table offset
            0x08,                   // address size
            0x01,                   // compile unit DIE
            0x00,                   // end of children
        ]);
    }

    #[test]
    fn test_debug_info_one_die_per_symbol() {
        let symbols = [Symbol::function("foo", 0x1000), Symbol::function("bar", 0x1010)];
        let strings = StringTable::build(&symbols);
        let info = build_debug_info(&symbols, &strings, 0x1_0000_0000).unwrap();
        assert_eq!(info.len(), 39);
        let unit_length = u32::from_le_bytes([info[0], info[1], info[2], info[3]]);
        assert_eq!(unit_length as usize, info.len() - 4);

        assert_eq!(info[11], 0x01); // compile unit DIE
        assert_eq!(info[12], 0x02);
        assert_eq!(info[13..17], 0u32.to_le_bytes());
        assert_eq!(info[17..25], 0x1_0000_1000u64.to_le_bytes());
        assert_eq!(info[25], 0x02);
        assert_eq!(info[26..30], 4u32.to_le_bytes());
        assert_eq!(info[30..38], 0x1_0000_1010u64.to_le_bytes());
        assert_eq!(info[38], 0x00);
    }

    #[test]
    fn test_debug_info_codes_match_abbrev_table() {
        let abbrev = build_debug_abbrev();
        let symbols = [Symbol::function("f", 0)];
        let strings = StringTable::build(&symbols);
        let info = build_debug_info(&symbols, &strings, 0).unwrap();
        // First declared abbreviation backs the compile unit DIE, the second
        // backs each subprogram DIE.
        assert_eq!(abbrev[0], info[11]);
        assert_eq!(abbrev[5], info[12]);
    }

    #[test]
    fn test_debug_info_unmapped_name_is_an_error() {
        let symbols = [Symbol::function("ghost", 0x1000)];
        let result = build_debug_info(&symbols, &StringTable::default(), 0);
        assert!(matches!(result, Err(DsymError::MissingName { .. })));
    }
}
