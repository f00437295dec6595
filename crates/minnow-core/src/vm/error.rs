use thiserror::Error;

/// A machine fault: the VM stops and reports. These are distinct from
/// language-level errors, which are ordinary ERROR-tagged values written to
/// registers and never unwind. A fault means the compiler broke its side of
/// the contract (an unproven tag, a bad index) or the embedder's limits
/// were hit.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("at @{loc}: register m{reg} holds {found}, expected {expected}")]
    Tag {
        expected: &'static str,
        found: String,
        reg: u32,
        loc: u32,
    },

    #[error("at @{loc}: register m{reg} does not exist")]
    BadRegister { reg: u32, loc: u32 },

    #[error("constant c{0} does not exist")]
    BadConstant(u32),

    #[error("token k{0} does not exist")]
    BadToken(u32),

    #[error("lambda factory f{0} does not exist")]
    BadFactory(u32),

    #[error("code offset @{0} is out of range")]
    CodeOutOfRange(u32),

    #[error("call depth limit of {0} frames exceeded")]
    CallDepth(usize),

    #[error("at @{loc}: call supplied {got} arguments for {expected} parameter slots")]
    CallArity { expected: usize, got: usize, loc: u32 },

    #[error("at @{loc}: integer division by zero was not guarded")]
    DivisionByZero { loc: u32 },

    #[error("at @{loc}: proven index into m{reg} was out of range")]
    Bounds { reg: u32, loc: u32 },

    #[error("struct type {type_name} has no field labelled {label}")]
    UnknownField { type_name: String, label: String },

    #[error("struct {got} registered out of order, expected {expected}")]
    StructOrder { expected: usize, got: usize },

    #[error("enum declared after struct registration sealed the enum range")]
    SealedEnums,
}

impl MachineError {
    pub fn tag(expected: &'static str, found: impl Into<String>, reg: u32, loc: u32) -> Self {
        MachineError::Tag {
            expected,
            found: found.into(),
            reg,
            loc,
        }
    }
}
