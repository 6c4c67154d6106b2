use dsymforge_proc_macros::ByteSwap;

use crate::byte_swap::Buffer;
use crate::error::DsymError;
use crate::string_table::StringTable;
use crate::symbol::{Symbol, SymbolDescription, SymbolFlags};

#[repr(C)]
#[derive(ByteSwap)]
pub struct SymbolTableEntry {
    pub string_table_offset: u32,
    pub ty: SymbolFlags,
    pub section_number: u8,
    pub description: SymbolDescription,
    pub value: u64,
}

pub struct SymbolTableResult {
    pub buffer: Vec<u8>,
    pub num_symbols: u32,
    /// Value of the first symbol, at full width. The layout computation uses
    /// it as the text section's offset from the segment base.
    pub first_value: u64,
}

pub fn build_symbol_table(symbols: &[Symbol], strings: &StringTable) -> Result<SymbolTableResult, DsymError> {
    let mut buf = Buffer::default();
    for symbol in symbols {
        let string_table_offset = strings.offset_of(&symbol.name)
            .ok_or_else(|| DsymError::MissingName { name: symbol.name.clone() })?;
        buf.push(SymbolTableEntry {
            string_table_offset,
            ty: symbol.flags,
            section_number: symbol.section_number,
            description: symbol.description,
            value: symbol.value,
        });
    }
    let first_value = symbols.first().map(|symbol| symbol.value).unwrap_or(0);
    Ok(SymbolTableResult {
        buffer: buf.data,
        num_symbols: symbols.len() as u32,
        first_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bytes() {
        let symbols = [Symbol::function("foo", 0x1000), Symbol::function("bar", 0x1010)];
        let strings = StringTable::build(&symbols);
        let result = build_symbol_table(&symbols, &strings).unwrap();
        assert_eq!(result.num_symbols, 2);
        assert_eq!(result.buffer.len(), 32);
        assert_eq!(result.buffer[..16], [
            0x00, 0x00, 0x00, 0x00, // name offset
            0x0F,                   // external, defined in section
            0x01,                   // section number
            0x00, 0x00,             // description
            0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // value
        ]);
        assert_eq!(result.buffer[16..20], [0x04, 0x00, 0x00, 0x00]);
        assert_eq!(result.buffer[24..32], [0x10, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_first_value_keeps_full_width() {
        let symbols = [Symbol::function("far", 0x1_0002_0000)];
        let strings = StringTable::build(&symbols);
        let result = build_symbol_table(&symbols, &strings).unwrap();
        assert_eq!(result.first_value, 0x1_0002_0000);
    }

    #[test]
    fn test_empty_list() {
        let result = build_symbol_table(&[], &StringTable::default()).unwrap();
        assert!(result.buffer.is_empty());
        assert_eq!(result.num_symbols, 0);
        assert_eq!(result.first_value, 0);
    }

    #[test]
    fn test_unmapped_name_is_an_error() {
        let symbols = [Symbol::function("ghost", 0x1000)];
        let result = build_symbol_table(&symbols, &StringTable::default());
        assert!(matches!(result, Err(DsymError::MissingName { ref name }) if name == "ghost"));
    }
}
