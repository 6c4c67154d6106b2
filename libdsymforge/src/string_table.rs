use std::collections::HashMap;

use crate::byte_swap::Buffer;
use crate::symbol::Symbol;

/// Null-terminated names concatenated into one buffer, plus the offset each
/// name starts at. Duplicate names are interned once and share an offset.
#[derive(Default)]
pub struct StringTable {
    pub buf: Buffer,
    offsets: HashMap<String, u32>,
}

impl StringTable {
    pub fn build(symbols: &[Symbol]) -> StringTable {
        let mut table = StringTable::default();
        for symbol in symbols {
            table.intern(&symbol.name);
        }
        table
    }

    pub fn intern(&mut self, name: &str) -> u32 {
        debug_assert!(!name.contains('\0'));
        *self.offsets.entry(name.to_string())
            .or_insert_with(|| self.buf.push_null_terminated_string(name) as u32)
    }

    pub fn offset_of(&self, name: &str) -> Option<u32> {
        self.offsets.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_insertion_order() {
        let symbols = [Symbol::function("foo", 0x1000), Symbol::function("bar", 0x1010)];
        let table = StringTable::build(&symbols);
        assert_eq!(table.buf.data, b"foo\0bar\0");
        assert_eq!(table.offset_of("foo"), Some(0));
        assert_eq!(table.offset_of("bar"), Some(4));
        assert_eq!(table.offset_of("baz"), None);
    }

    #[test]
    fn test_intern_returns_the_start_of_each_entry() {
        let mut table = StringTable::default();
        let first = table.intern("foo");
        let second = table.intern("longer_name");
        let again = table.intern("foo");
        assert_eq!(first, 0);
        assert_eq!(second, 4);
        assert_eq!(again, first);
        assert_eq!(table.buf.data.len(), 16);
    }

    #[test]
    fn test_duplicate_names_share_offset() {
        let symbols = [
            Symbol::function("dup", 0x1000),
            Symbol::function("other", 0x1010),
            Symbol::function("dup", 0x1020),
        ];
        let table = StringTable::build(&symbols);
        assert_eq!(table.buf.data, b"dup\0other\0");
        assert_eq!(table.offset_of("dup"), Some(0));
        assert_eq!(table.offset_of("other"), Some(4));
    }

    #[test]
    fn test_empty_name_is_a_zero_length_entry() {
        let symbols = [Symbol::function("", 0x1000), Symbol::function("a", 0x1010)];
        let table = StringTable::build(&symbols);
        assert_eq!(table.buf.data, b"\0a\0");
        assert_eq!(table.offset_of(""), Some(0));
        assert_eq!(table.offset_of("a"), Some(1));
    }
}
