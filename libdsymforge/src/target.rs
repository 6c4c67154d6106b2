#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arch {
    Arm64,
    X86_64,
}
