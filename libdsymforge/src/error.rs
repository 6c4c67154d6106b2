use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum DsymError {
    MalformedUuid {
        uuid: String,
    },
    LayoutOverflow {
        region: &'static str,
        offset: u64,
        position: u64,
    },
    MissingName {
        name: String,
    },
}

impl fmt::Display for DsymError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DsymError::MalformedUuid { uuid } => {
                write!(f, "malformed UUID \"{}\": expected 32 hex digits", uuid)
            },
            DsymError::LayoutOverflow { region, offset, position } => {
                write!(f, "{} would begin at {:#x}, before the end of the preceding region at {:#x}", region, offset, position)
            },
            DsymError::MissingName { name } => {
                write!(f, "symbol name \"{}\" is missing from the string table", name)
            },
        }
    }
}

impl Error for DsymError {}
