#[macro_use]
pub mod byte_swap;
pub mod target;
pub mod error;
pub mod symbol;
pub mod string_table;
pub mod symbol_table;
pub mod dwarf;
pub mod macho;
pub mod raw_symbols;
