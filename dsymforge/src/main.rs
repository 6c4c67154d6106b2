use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use libdsymforge::macho::DsymEncoder;
use libdsymforge::raw_symbols::load_raw_symbols;
use libdsymforge::target::Arch;

#[derive(ValueEnum, Copy, Clone, Debug)]
enum ArchArg {
    Arm64,
    #[clap(name = "x86_64")]
    X86_64,
}

impl From<ArchArg> for Arch {
    fn from(value: ArchArg) -> Self {
        match value {
            ArchArg::Arm64 => Arch::Arm64,
            ArchArg::X86_64 => Arch::X86_64,
        }
    }
}

fn parse_hex(value: &str) -> Result<u64, String> {
    let digits = value.strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|err| err.to_string())
}

#[derive(Parser, Debug)]
#[clap(name = "dsymforge")]
struct Opt {
    /// UUID to stamp into the container, with or without hyphens
    #[clap(short='u', long)]
    uuid: String,

    /// Input symbol file, one "ADDRESS NAME" pair per line
    #[clap(short='s', long)]
    symbols: PathBuf,

    /// Base virtual address of the __TEXT segment, rounded up to a page
    #[clap(long, value_parser = parse_hex, default_value="0x100000000")]
    vm_addr: u64,

    /// Target architecture
    #[clap(value_enum, short='a', long, default_value="arm64", ignore_case = true)]
    arch: ArchArg,

    /// Output path
    #[clap(short='o', long)]
    output: PathBuf,
}

fn report_error(message: impl Display) -> ExitCode {
    println!("\u{001B}[31merror:\u{001B}[0m {}", message);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let opt = Opt::parse();

    let symbols = match load_raw_symbols(&opt.symbols) {
        Ok(symbols) => symbols,
        Err(err) => return report_error(err),
    };

    let encoder = DsymEncoder::new(opt.arch.into());
    let dsym = match encoder.encode(&opt.uuid, &symbols, opt.vm_addr) {
        Ok(dsym) => dsym,
        Err(err) => return report_error(err),
    };

    let file = match File::create(&opt.output) {
        Ok(file) => file,
        Err(err) => return report_error(format!("unable to create \"{}\": {}", opt.output.display(), err)),
    };
    let mut w = BufWriter::new(file);
    if let Err(err) = w.write_all(&dsym).and_then(|_| w.flush()) {
        return report_error(format!("unable to write \"{}\": {}", opt.output.display(), err));
    }

    ExitCode::SUCCESS
}
