//! The execution core of the Minnow language: a register-based VM over
//! tagged immutable values, the typescheme algebra the compiler uses to
//! track runtime shapes, and the multi-method dispatch tree.
//!
//! The front end (lexer, parser, module resolution) and the outer service
//! layer live elsewhere; they talk to this crate through [`Program`]'s
//! builder interface and [`Vm::run`].

pub mod dispatch;
pub mod types;
pub mod value;
pub mod value_format;
pub mod vm;

pub use value::tag::{self, Tag};
pub use value::{Lambda, RtError, Token, Value, ValueMap};
pub use vm::{MachineError, Opcode, Operation, Program, Vm, VmOptions};
