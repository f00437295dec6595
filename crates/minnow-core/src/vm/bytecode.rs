//! Instruction encoding: fixed-width operations over an opcode-indexed
//! operand-kind table. The table is the single source of truth for what
//! each operand slot means; both the disassembler and code splicing are
//! driven by it rather than by operand position.

use std::fmt;

/// What an operand slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// A register index.
    Mem,
    /// A code offset.
    Loc,
    /// A constant-pool index.
    Const,
    /// A token-table index.
    Tok,
    /// A type tag.
    Typ,
    /// A lambda-factory index.
    Lfc,
    /// A raw small integer.
    Num,
}

impl OperandKind {
    fn prefix(self) -> &'static str {
        match self {
            OperandKind::Mem => "m",
            OperandKind::Loc => "@",
            OperandKind::Const => "c",
            OperandKind::Tok => "k",
            OperandKind::Typ => "t",
            OperandKind::Lfc => "f",
            OperandKind::Num => "",
        }
    }
}

/// The operand layout of one opcode: a fixed prefix, optionally followed by
/// any number of operands of one repeating kind.
#[derive(Clone, Copy, Debug)]
pub struct OperandSchema {
    pub fixed: &'static [OperandKind],
    pub rest: Option<OperandKind>,
}

impl OperandSchema {
    const fn of(fixed: &'static [OperandKind]) -> Self {
        Self { fixed, rest: None }
    }

    const fn variadic(fixed: &'static [OperandKind], rest: OperandKind) -> Self {
        Self {
            fixed,
            rest: Some(rest),
        }
    }

    pub fn kind_at(&self, i: usize) -> Option<OperandKind> {
        self.fixed.get(i).copied().or(self.rest)
    }

    /// Whether `n` operands satisfy this schema.
    pub fn admits(&self, n: usize) -> bool {
        if self.rest.is_some() {
            n >= self.fixed.len()
        } else {
            n == self.fixed.len()
        }
    }
}

use OperandKind::{Const, Lfc, Loc, Mem, Num, Tok, Typ};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Addf,
    Addi,
    Adds,
    Adtk,
    Andb,
    Asgc,
    Asgm,
    Call,
    CalT,
    Cc11,
    Cc1T,
    CcT1,
    CcTT,
    Ccxx,
    Cv1T,
    CvTT,
    Divf,
    Divi,
    Dofn,
    Dref,
    Equb,
    Equf,
    Equi,
    Equs,
    Flti,
    Flts,
    Gtef,
    Gtei,
    Gthf,
    Gthi,
    Halt,
    Idfn,
    IdxL,
    Idxp,
    Idxs,
    Idxt,
    IdxT,
    Intf,
    Ints,
    IxTn,
    IxZl,
    IxZn,
    Jmp,
    Jsr,
    KeyM,
    KeyZ,
    LenL,
    LenM,
    Lens,
    LenS,
    LenT,
    List,
    Litx,
    Mker,
    Mkfn,
    Mkmp,
    Mkpr,
    Mkst,
    Modi,
    Mulf,
    Muli,
    Negf,
    Negi,
    Notb,
    Orb,
    QlnT,
    Qsng,
    QsnQ,
    Qtru,
    Qtyp,
    Ret,
    Strc,
    Strx,
    Subf,
    Subi,
    Thnk,
    TupL,
    Typx,
    Untk,
}

impl Opcode {
    /// The operand-kind table. Splicing relocates every `Loc`/`Tok`/`Lfc`
    /// slot it names, and the disassembler prefixes operands by it.
    pub fn operands(self) -> OperandSchema {
        use Opcode::*;
        match self {
            Addf | Addi | Adds | Andb | Cc11 | Cc1T | CcT1 | CcTT | Ccxx | Divf | Divi | Equb
            | Equf | Equi | Equs | Gtef | Gtei | Gthf | Gthi | Mkpr | Modi | Mulf | Muli | Orb
            | Subf | Subi => OperandSchema::of(&[Mem, Mem, Mem]),
            Asgm | Cv1T | Dref | Flti | Flts | Idfn | Intf | Ints | KeyM | KeyZ | LenL | LenM
            | Lens | LenS | LenT | List | Litx | Negf | Negi | Notb | Strx | TupL | Typx => {
                OperandSchema::of(&[Mem, Mem])
            }
            Asgc => OperandSchema::of(&[Mem, Const]),
            Adtk | Mker => OperandSchema::of(&[Mem, Mem, Tok]),
            Call => OperandSchema::variadic(&[Loc, Mem, Mem], Mem),
            CalT => OperandSchema::variadic(&[Loc, Mem, Mem], Mem),
            CvTT => OperandSchema::variadic(&[Mem], Mem),
            Dofn => OperandSchema::variadic(&[Mem, Mem], Mem),
            Halt | Ret => OperandSchema::of(&[]),
            IdxL | Idxp | Idxs | IdxT => OperandSchema::of(&[Mem, Mem, Mem, Mem]),
            Idxt => OperandSchema::of(&[Mem, Mem, Mem, Mem, Mem]),
            IxTn | IxZn => OperandSchema::of(&[Mem, Mem, Num]),
            IxZl => OperandSchema::of(&[Mem, Mem, Mem]),
            Jmp | Jsr => OperandSchema::of(&[Loc]),
            Mkfn => OperandSchema::of(&[Mem, Lfc]),
            Mkmp => OperandSchema::of(&[Mem, Mem, Mem, Mem]),
            Mkst => OperandSchema::of(&[Mem, Mem, Mem]),
            QlnT => OperandSchema::of(&[Mem, Num, Loc]),
            Qsng | QsnQ | Qtru => OperandSchema::of(&[Mem, Loc]),
            Qtyp => OperandSchema::of(&[Mem, Typ, Loc]),
            Strc => OperandSchema::variadic(&[Mem, Typ], Mem),
            Thnk => OperandSchema::of(&[Mem, Loc]),
            Untk => OperandSchema::of(&[Mem]),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Addf => "addf",
            Addi => "addi",
            Adds => "adds",
            Adtk => "adtk",
            Andb => "andb",
            Asgc => "asgc",
            Asgm => "asgm",
            Call => "call",
            CalT => "calt",
            Cc11 => "cc11",
            Cc1T => "cc1t",
            CcT1 => "cct1",
            CcTT => "cctt",
            Ccxx => "ccxx",
            Cv1T => "cv1t",
            CvTT => "cvtt",
            Divf => "divf",
            Divi => "divi",
            Dofn => "dofn",
            Dref => "dref",
            Equb => "equb",
            Equf => "equf",
            Equi => "equi",
            Equs => "equs",
            Flti => "flti",
            Flts => "flts",
            Gtef => "gtef",
            Gtei => "gtei",
            Gthf => "gthf",
            Gthi => "gthi",
            Halt => "halt",
            Idfn => "idfn",
            IdxL => "idxl",
            Idxp => "idxp",
            Idxs => "idxs",
            Idxt => "idxt",
            IdxT => "idxT",
            Intf => "intf",
            Ints => "ints",
            IxTn => "ixtn",
            IxZl => "ixzl",
            IxZn => "ixzn",
            Jmp => "jmp",
            Jsr => "jsr",
            KeyM => "keym",
            KeyZ => "keyz",
            LenL => "lenl",
            LenM => "lenm",
            Lens => "lens",
            LenS => "lenS",
            LenT => "lent",
            List => "list",
            Litx => "litx",
            Mker => "mker",
            Mkfn => "mkfn",
            Mkmp => "mkmp",
            Mkpr => "mkpr",
            Mkst => "mkst",
            Modi => "modi",
            Mulf => "mulf",
            Muli => "muli",
            Negf => "negf",
            Negi => "negi",
            Notb => "notb",
            Orb => "orb",
            QlnT => "qlnt",
            Qsng => "qsng",
            QsnQ => "qsnq",
            Qtru => "qtru",
            Qtyp => "qtyp",
            Ret => "ret",
            Strc => "strc",
            Strx => "strx",
            Subf => "subf",
            Subi => "subi",
            Thnk => "thnk",
            TupL => "tupl",
            Typx => "typx",
            Untk => "untk",
        }
    }
}

/// One instruction: an opcode and its 32-bit operand slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub opcode: Opcode,
    pub args: Vec<u32>,
}

impl Operation {
    pub fn new(opcode: Opcode, args: Vec<u32>) -> Self {
        debug_assert!(
            opcode.operands().admits(args.len()),
            "{} given {} operands",
            opcode.mnemonic(),
            args.len()
        );
        Self { opcode, args }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        let schema = self.opcode.operands();
        for (i, arg) in self.args.iter().enumerate() {
            let prefix = schema.kind_at(i).map(OperandKind::prefix).unwrap_or("");
            write!(f, " {prefix}{arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassembly_prefixes_operands_by_kind() {
        let op = Operation::new(Opcode::Asgc, vec![4, 0]);
        assert_eq!(op.to_string(), "asgc m4 c0");
        let q = Operation::new(Opcode::Qtyp, vec![3, 9, 17]);
        assert_eq!(q.to_string(), "qtyp m3 t9 @17");
        let halt = Operation::new(Opcode::Halt, vec![]);
        assert_eq!(halt.to_string(), "halt");
    }

    #[test]
    fn variadic_schemas_repeat_their_tail_kind() {
        let call = Operation::new(Opcode::Call, vec![10, 4, 6, 8, 9]);
        assert_eq!(call.to_string(), "call @10 m4 m6 m8 m9");
        let schema = Opcode::Call.operands();
        assert_eq!(schema.kind_at(0), Some(OperandKind::Loc));
        assert_eq!(schema.kind_at(4), Some(OperandKind::Mem));
        assert!(schema.admits(3));
        assert!(schema.admits(7));
        assert!(!schema.admits(2));
    }

    #[test]
    fn raw_numbers_print_bare() {
        let op = Operation::new(Opcode::QlnT, vec![2, 3, 40]);
        assert_eq!(op.to_string(), "qlnt m2 3 @40");
        let ix = Operation::new(Opcode::IxZn, vec![1, 2, 0]);
        assert_eq!(ix.to_string(), "ixzn m1 m2 0");
    }
}
