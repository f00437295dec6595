//! The immutable bundle the compiler produces and the VM consumes: code,
//! tokens, the constant prefix of the register file, type metadata, lambda
//! factories and the struct-field resolver. The builder methods here are
//! the compiler-facing interface; nothing mutates a Program once a VM is
//! running over it.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::AltType;
use crate::value::tag::{self, Tag};
use crate::value::{seed_constants, Lambda, RtError, Token, Value};
use crate::vm::bytecode::{Opcode, OperandKind, Operation};
use crate::vm::error::MachineError;

/// Everything needed to stamp out a lambda at one textual site: the model
/// closure and the outer registers to snapshot into its captures.
#[derive(Clone, Debug)]
pub struct LambdaFactory {
    pub model: Lambda,
    pub ext_mem: Vec<u32>,
}

/// Maps (struct number, label id) to a field index. Struct numbers count
/// from zero in registration order; the tag of struct number `n` is
/// `ub_enums + n`.
#[derive(Clone, Debug, Default)]
pub struct StructResolver {
    maps: Vec<HashMap<usize, usize>>,
}

impl StructResolver {
    pub fn add(&mut self, struct_number: usize, labels: &[usize]) -> Result<(), MachineError> {
        if struct_number != self.maps.len() {
            return Err(MachineError::StructOrder {
                expected: self.maps.len(),
                got: struct_number,
            });
        }
        let map = labels
            .iter()
            .enumerate()
            .map(|(field, &label)| (label, field))
            .collect();
        self.maps.push(map);
        Ok(())
    }

    pub fn resolve(&self, struct_number: usize, label: usize) -> Option<usize> {
        self.maps.get(struct_number)?.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

static FIXED_TYPE_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    [
        "undefined value",
        "int array",
        "thunk",
        "created local constant",
        "tuple",
        "error",
        "unsat",
        "ref",
        "null",
        "int",
        "bool",
        "string",
        "float",
        "type",
        "func",
        "pair",
        "list",
        "map",
        "set",
        "label",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

#[derive(Clone, Debug, Default)]
pub struct Program {
    pub code: Vec<Operation>,
    pub tokens: Vec<Token>,
    /// The initial image of the register file. `reserve` is the compiler's
    /// register allocator: every register it ever names is an index here.
    pub constants: Vec<Value>,
    /// Indexed by tag: the fixed prefix, then enums, then structs.
    pub type_names: Vec<String>,
    /// Indexed by label id.
    pub labels: Vec<String>,
    /// Variant names per enum, indexed by `tag - LB_ENUMS`.
    pub enums: Vec<Vec<String>>,
    /// Label ids per struct in declared field order, indexed by
    /// `tag - ub_enums`.
    pub struct_labels: Vec<Vec<usize>>,
    pub struct_field_types: Vec<Vec<AltType>>,
    pub lambda_factories: Vec<LambdaFactory>,
    pub resolver: StructResolver,
    structs_declared: bool,
}

impl Program {
    /// A fresh program: the four seed constants at their fixed addresses,
    /// the fixed type-name prefix, no code.
    pub fn blank() -> Self {
        Program {
            constants: seed_constants(),
            type_names: FIXED_TYPE_NAMES.clone(),
            ..Program::default()
        }
    }

    /// One past the last enum tag. Fixed for good once the first struct is
    /// registered.
    pub fn ub_enums(&self) -> Tag {
        tag::LB_ENUMS + self.enums.len() as Tag
    }

    pub fn mem_top(&self) -> u32 {
        self.constants.len() as u32
    }

    /// The most recently reserved register.
    pub fn that(&self) -> u32 {
        self.constants.len() as u32 - 1
    }

    pub fn code_top(&self) -> u32 {
        self.code.len() as u32
    }

    pub fn token_top(&self) -> u32 {
        self.tokens.len() as u32
    }

    pub fn that_token(&self) -> u32 {
        self.tokens.len() as u32 - 1
    }

    pub fn lf_top(&self) -> u32 {
        self.lambda_factories.len() as u32
    }

    /// Appends a constant to the register-file image and returns its
    /// address. This is how the compiler allocates registers.
    pub fn reserve(&mut self, value: Value) -> u32 {
        self.constants.push(value);
        self.that()
    }

    pub fn reserve_token(&mut self, token: Token) -> u32 {
        self.tokens.push(token);
        self.that_token()
    }

    /// Reserves a register holding a prebuilt error value, for opcodes that
    /// report failure through a latent-error operand.
    pub fn reserve_error(&mut self, id: &str, token: &Token, args: Vec<Value>) -> u32 {
        self.reserve(Value::error(
            RtError::new(id, "", Some(token.clone())).with_args(args),
        ))
    }

    pub fn emit(&mut self, opcode: Opcode, args: Vec<u32>) {
        self.code.push(Operation::new(opcode, args));
    }

    /// Reserves a fresh destination register, then emits `opcode` with that
    /// destination prepended to `args`.
    pub fn put(&mut self, opcode: Opcode, args: Vec<u32>) -> u32 {
        let dest = self.reserve(Value::Undefined);
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(dest);
        full.extend(args);
        self.emit(opcode, full);
        dest
    }

    pub fn add_label(&mut self, name: &str) -> usize {
        if let Some(ix) = self.labels.iter().position(|l| l == name) {
            return ix;
        }
        self.labels.push(name.to_string());
        self.labels.len() - 1
    }

    pub fn add_enum(&mut self, name: &str, variants: &[&str]) -> Result<Tag, MachineError> {
        if self.structs_declared {
            return Err(MachineError::SealedEnums);
        }
        let t = self.ub_enums();
        self.type_names.push(name.to_string());
        self.enums
            .push(variants.iter().map(|v| v.to_string()).collect());
        Ok(t)
    }

    pub fn add_struct(
        &mut self,
        name: &str,
        labels: Vec<usize>,
        field_types: Vec<AltType>,
    ) -> Result<Tag, MachineError> {
        self.structs_declared = true;
        let number = self.struct_labels.len();
        self.resolver.add(number, &labels)?;
        let t = self.ub_enums() + number as Tag;
        self.type_names.push(name.to_string());
        self.struct_labels.push(labels);
        self.struct_field_types.push(field_types);
        Ok(t)
    }

    pub fn type_name(&self, t: Tag) -> &str {
        self.type_names
            .get(t as usize)
            .map(String::as_str)
            .unwrap_or("unknown type")
    }

    pub fn add_factory(&mut self, factory: LambdaFactory) -> u32 {
        self.lambda_factories.push(factory);
        self.lf_top() - 1
    }

    /// Splices another program's code onto this one. Every operand whose
    /// schema slot is a code offset, token index or factory index is
    /// relocated by the current length of the corresponding table; the
    /// operand-kind table decides, never the operand's position.
    pub fn add(&mut self, other: Program) {
        let code_base = self.code_top();
        let token_base = self.token_top();
        let lf_base = self.lf_top();
        for mut op in other.code {
            let schema = op.opcode.operands();
            for (i, arg) in op.args.iter_mut().enumerate() {
                match schema.kind_at(i) {
                    Some(OperandKind::Loc) => *arg += code_base,
                    Some(OperandKind::Tok) => *arg += token_base,
                    Some(OperandKind::Lfc) => *arg += lf_base,
                    _ => {}
                }
            }
            self.code.push(op);
        }
        self.tokens.extend(other.tokens);
        self.lambda_factories.extend(other.lambda_factories);
    }

    /// One line of the bytecode listing, `@<loc> : <mnemonic> <operands…>`.
    pub fn listing_line(&self, loc: u32) -> String {
        match self.code.get(loc as usize) {
            Some(op) => format!("@{loc} : {op}"),
            None => format!("@{loc} : <no such instruction>"),
        }
    }

    pub fn listing(&self) -> String {
        (0..self.code_top())
            .map(|loc| self.listing_line(loc))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
