pub mod bytecode;
pub mod error;
pub mod options;
pub mod program;
pub mod runtime;

pub use bytecode::{Opcode, OperandKind, OperandSchema, Operation};
pub use error::MachineError;
pub use options::VmOptions;
pub use program::{LambdaFactory, Program, StructResolver};
pub use runtime::Vm;
