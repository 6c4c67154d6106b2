use dsymforge_proc_macros::ByteSwap;

/// One input symbol record. The type, section and description fields are
/// carried into the on-disk symbol table verbatim.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub value: u64,
    pub flags: SymbolFlags,
    pub section_number: u8,
    pub description: SymbolDescription,
}

impl Symbol {
    /// An externally-visible symbol defined in the text section.
    pub fn function(name: impl Into<String>, value: u64) -> Self {
        Symbol {
            name: name.into(),
            value,
            flags: SymbolFlags::new(true, SymbolType::DefinedInSectionNumber, false, 0),
            section_number: 1,
            description: SymbolDescription::default(),
        }
    }
}

#[derive(Copy, Clone)]
#[repr(u8)]
pub enum SymbolType {
    Undefined = 0,
    Absolute = 1,
    Indirect = 5,
    PreboundUndefined = 6,
    DefinedInSectionNumber = 7,
}

#[repr(C)]
#[derive(ByteSwap, Clone, Copy, Debug)]
pub struct SymbolFlags(u8);

impl SymbolFlags {
    pub fn new(external: bool, ty: SymbolType, private_external: bool, stab: u8) -> Self {
        assert!(stab <= 7);
        Self(external as u8 | (ty as u8) << 1 | (private_external as u8) << 4 | stab << 5)
    }
}

#[repr(C)]
#[derive(ByteSwap, Clone, Copy, Debug, Default)]
pub struct SymbolDescription(pub u16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_flags() {
        let flags = SymbolFlags::new(true, SymbolType::DefinedInSectionNumber, false, 0);
        assert_eq!(flags.0, 0x0F);
        let flags = SymbolFlags::new(false, SymbolType::DefinedInSectionNumber, true, 0);
        assert_eq!(flags.0, 0x1E);
        let flags = SymbolFlags::new(true, SymbolType::Undefined, false, 0);
        assert_eq!(flags.0, 0x01);
    }
}
