//! The dispatch loop. A `Vm` owns a flat register file and a stack of
//! return addresses; the shared `Program` stays read-only throughout a run.
//! Conditional opcodes fall through on the true branch and jump on the
//! false branch, so compiled code lays out forward.

use std::sync::Arc;

use im::{HashSet, Vector};
use tracing::{debug, trace};

use crate::value::tag::{self, Tag};
use crate::value::{Lambda, RtError, Token, Value};
use crate::vm::bytecode::Opcode;
use crate::vm::error::MachineError;
use crate::vm::options::VmOptions;
use crate::vm::program::Program;

pub struct Vm {
    program: Arc<Program>,
    /// The register file. Seeded from the program's constant image; every
    /// register the compiler named is an index into it.
    pub mem: Vec<Value>,
    callstack: Vec<u32>,
    options: VmOptions,
    loc: u32,
}

impl Vm {
    pub fn new(program: Arc<Program>) -> Self {
        Self::with_options(program, VmOptions::default())
    }

    pub fn with_options(program: Arc<Program>, options: VmOptions) -> Self {
        let mem = program.constants.clone();
        Vm {
            program,
            mem,
            callstack: Vec::new(),
            options,
            loc: 0,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Runs from `entry` until `Halt`, or until a `Ret` finds the call
    /// stack empty. Language-level errors land in registers; an `Err` here
    /// is a machine fault and stops the run where it stood.
    pub fn run(&mut self, entry: u32) -> Result<(), MachineError> {
        debug!(entry, "run");
        let mut loc = entry;
        loop {
            let op = self
                .program
                .code
                .get(loc as usize)
                .ok_or(MachineError::CodeOutOfRange(loc))?
                .clone();
            self.loc = loc;
            trace!("{}", self.program.listing_line(loc));
            let args = &op.args;
            match op.opcode {
                // -- control ----------------------------------------------
                Opcode::Halt => break,
                Opcode::Ret => match self.callstack.pop() {
                    Some(back) => loc = back,
                    None => break,
                },
                Opcode::Jmp => {
                    loc = args[0];
                    continue;
                }
                Opcode::Jsr => {
                    self.push_return(loc)?;
                    loc = args[0];
                    continue;
                }
                Opcode::Qtru => {
                    loc = if self.boolean(args[0])? { loc + 1 } else { args[1] };
                    continue;
                }
                Opcode::Qtyp => {
                    loc = if self.reg(args[0])?.tag() == args[1] {
                        loc + 1
                    } else {
                        args[2]
                    };
                    continue;
                }
                Opcode::Qsng => {
                    loc = if self.reg(args[0])?.tag() >= tag::INT {
                        loc + 1
                    } else {
                        args[1]
                    };
                    continue;
                }
                Opcode::QsnQ => {
                    loc = if self.reg(args[0])?.tag() >= tag::NULL {
                        loc + 1
                    } else {
                        args[1]
                    };
                    continue;
                }
                Opcode::QlnT => {
                    loc = if self.tuple(args[0])?.len() == args[1] as usize {
                        loc + 1
                    } else {
                        args[2]
                    };
                    continue;
                }
                Opcode::Untk => {
                    if let Value::Thunk(body) = self.reg(args[0])? {
                        let body = *body;
                        self.push_return(loc)?;
                        loc = body;
                        continue;
                    }
                }

                // -- moves ------------------------------------------------
                Opcode::Asgm | Opcode::Idfn => {
                    let v = self.reg(args[1])?.clone();
                    self.set(args[0], v)?;
                }
                Opcode::Asgc => {
                    let v = self
                        .program
                        .constants
                        .get(args[1] as usize)
                        .ok_or(MachineError::BadConstant(args[1]))?
                        .clone();
                    self.set(args[0], v)?;
                }
                Opcode::Thnk => {
                    self.set(args[0], Value::Thunk(args[1]))?;
                }
                Opcode::Dref => {
                    let addr = match self.reg(args[1])? {
                        Value::Ref(addr) => *addr,
                        other => return Err(self.tag_fault("ref", args[1], other.tag())),
                    };
                    let v = self.reg(addr)?.clone();
                    self.set(args[0], v)?;
                }

                // -- integers ---------------------------------------------
                Opcode::Addi => {
                    let v = self.int(args[1])?.wrapping_add(self.int(args[2])?);
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Subi => {
                    let v = self.int(args[1])?.wrapping_sub(self.int(args[2])?);
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Muli => {
                    let v = self.int(args[1])?.wrapping_mul(self.int(args[2])?);
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Divi => {
                    let v = self
                        .int(args[1])?
                        .checked_div(self.int(args[2])?)
                        .ok_or(MachineError::DivisionByZero { loc })?;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Modi => {
                    let v = self
                        .int(args[1])?
                        .checked_rem(self.int(args[2])?)
                        .ok_or(MachineError::DivisionByZero { loc })?;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Negi => {
                    let v = self.int(args[1])?.wrapping_neg();
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Equi => {
                    let v = self.int(args[1])? == self.int(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Gthi => {
                    let v = self.int(args[1])? > self.int(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Gtei => {
                    let v = self.int(args[1])? >= self.int(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }

                // -- floats -----------------------------------------------
                Opcode::Addf => {
                    let v = self.float(args[1])? + self.float(args[2])?;
                    self.set(args[0], Value::Float(v))?;
                }
                Opcode::Subf => {
                    let v = self.float(args[1])? - self.float(args[2])?;
                    self.set(args[0], Value::Float(v))?;
                }
                Opcode::Mulf => {
                    let v = self.float(args[1])? * self.float(args[2])?;
                    self.set(args[0], Value::Float(v))?;
                }
                Opcode::Divf => {
                    let v = self.float(args[1])? / self.float(args[2])?;
                    self.set(args[0], Value::Float(v))?;
                }
                Opcode::Negf => {
                    let v = -self.float(args[1])?;
                    self.set(args[0], Value::Float(v))?;
                }
                Opcode::Equf => {
                    let v = self.float(args[1])? == self.float(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Gthf => {
                    let v = self.float(args[1])? > self.float(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Gtef => {
                    let v = self.float(args[1])? >= self.float(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }

                // -- conversions ------------------------------------------
                Opcode::Flti => {
                    let v = self.int(args[1])? as f64;
                    self.set(args[0], Value::Float(v))?;
                }
                Opcode::Intf => {
                    let v = self.float(args[1])? as i64;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Flts => {
                    let s = self.string(args[1])?.to_owned();
                    let v = match s.parse::<f64>() {
                        Ok(f) => Value::Float(f),
                        Err(_) => parse_failure("built/float/string", &s),
                    };
                    self.set(args[0], v)?;
                }
                Opcode::Ints => {
                    let s = self.string(args[1])?.to_owned();
                    let v = match s.parse::<i64>() {
                        Ok(n) => Value::Int(n),
                        Err(_) => parse_failure("built/int/string", &s),
                    };
                    self.set(args[0], v)?;
                }

                // -- booleans ---------------------------------------------
                Opcode::Andb => {
                    let v = self.boolean(args[1])? && self.boolean(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Orb => {
                    let v = self.boolean(args[1])? || self.boolean(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Notb => {
                    let v = !self.boolean(args[1])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Equb => {
                    let v = self.boolean(args[1])? == self.boolean(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }

                // -- strings ----------------------------------------------
                Opcode::Adds => {
                    let mut v = self.string(args[1])?.to_owned();
                    v.push_str(self.string(args[2])?);
                    self.set(args[0], Value::String(v))?;
                }
                Opcode::Equs => {
                    let v = self.string(args[1])? == self.string(args[2])?;
                    self.set(args[0], Value::Bool(v))?;
                }
                Opcode::Lens => {
                    let v = self.string(args[1])?.len() as i64;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::Idxs => {
                    let ix = self.int(args[2])?;
                    let byte = if ix >= 0 {
                        self.string(args[1])?.as_bytes().get(ix as usize).copied()
                    } else {
                        None
                    };
                    let v = match byte {
                        Some(b) => Value::String(
                            String::from_utf8_lossy(std::slice::from_ref(&b)).into_owned(),
                        ),
                        None => self.reg(args[3])?.clone(),
                    };
                    self.set(args[0], v)?;
                }

                // -- tuples -----------------------------------------------
                Opcode::Cc11 => {
                    let v = Value::tuple(vec![
                        self.reg(args[1])?.clone(),
                        self.reg(args[2])?.clone(),
                    ]);
                    self.set(args[0], v)?;
                }
                Opcode::Cc1T => {
                    let mut items = vec![self.reg(args[1])?.clone()];
                    items.extend(self.tuple(args[2])?.iter().cloned());
                    self.set(args[0], Value::tuple(items))?;
                }
                Opcode::CcT1 => {
                    let mut items: Vec<Value> = self.tuple(args[1])?.as_ref().clone();
                    items.push(self.reg(args[2])?.clone());
                    self.set(args[0], Value::tuple(items))?;
                }
                Opcode::CcTT => {
                    let mut items: Vec<Value> = self.tuple(args[1])?.as_ref().clone();
                    items.extend(self.tuple(args[2])?.iter().cloned());
                    self.set(args[0], Value::tuple(items))?;
                }
                Opcode::Ccxx => {
                    let mut items = flatten_into_tuple(self.reg(args[1])?.clone());
                    items.extend(flatten_into_tuple(self.reg(args[2])?.clone()));
                    self.set(args[0], Value::tuple(items))?;
                }
                Opcode::Cv1T => {
                    let v = Value::tuple(vec![self.reg(args[1])?.clone()]);
                    self.set(args[0], v)?;
                }
                Opcode::CvTT => {
                    let mut items = Vec::with_capacity(args.len() - 1);
                    for &src in &args[1..] {
                        items.push(self.reg(src)?.clone());
                    }
                    self.set(args[0], Value::tuple(items))?;
                }
                Opcode::LenT => {
                    let v = self.tuple(args[1])?.len() as i64;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::IdxT => {
                    let ix = self.int(args[2])?;
                    let v = match usize::try_from(ix)
                        .ok()
                        .and_then(|ix| self.tuple(args[1]).ok()?.get(ix).cloned())
                    {
                        Some(item) => item,
                        None => self.reg(args[3])?.clone(),
                    };
                    self.set(args[0], v)?;
                }
                Opcode::IxTn => {
                    let v = self
                        .tuple(args[1])?
                        .get(args[2] as usize)
                        .cloned()
                        .ok_or(MachineError::Bounds { reg: args[1], loc })?;
                    self.set(args[0], v)?;
                }

                // -- lists ------------------------------------------------
                Opcode::List => {
                    let list: Vector<Value> = match self.reg(args[1])? {
                        Value::Tuple(items) => items.iter().cloned().collect(),
                        single => Vector::unit(single.clone()),
                    };
                    self.set(args[0], Value::List(list))?;
                }
                Opcode::LenL => {
                    let v = self.list(args[1])?.len() as i64;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::IdxL => {
                    let ix = self.int(args[2])?;
                    let v = match usize::try_from(ix)
                        .ok()
                        .and_then(|ix| self.list(args[1]).ok()?.get(ix).cloned())
                    {
                        Some(item) => item,
                        None => self.reg(args[3])?.clone(),
                    };
                    self.set(args[0], v)?;
                }
                Opcode::TupL => {
                    let items: Vec<Value> = self.list(args[1])?.iter().cloned().collect();
                    self.set(args[0], Value::tuple(items))?;
                }

                // -- pairs ------------------------------------------------
                Opcode::Mkpr => {
                    let v = Value::pair(self.reg(args[1])?.clone(), self.reg(args[2])?.clone());
                    self.set(args[0], v)?;
                }
                Opcode::Idxp => {
                    let ix = self.int(args[2])?;
                    let v = if ix == 0 || ix == 1 {
                        self.pair(args[1])?[ix as usize].clone()
                    } else {
                        self.reg(args[3])?.clone()
                    };
                    self.set(args[0], v)?;
                }

                // -- maps and sets ----------------------------------------
                Opcode::Mkmp => {
                    let items = self.tuple(args[1])?.clone();
                    let mut map = crate::value::ValueMap::new();
                    let mut failure = None;
                    for item in items.iter() {
                        match item {
                            Value::Pair(kv) => {
                                if !self.admissible(kv[0].tag()) {
                                    failure = Some(args[3]);
                                    break;
                                }
                                map.insert(kv[0].clone(), kv[1].clone());
                            }
                            _ => {
                                failure = Some(args[2]);
                                break;
                            }
                        }
                    }
                    let v = match failure {
                        Some(err_reg) => self.reg(err_reg)?.clone(),
                        None => Value::Map(map),
                    };
                    self.set(args[0], v)?;
                }
                Opcode::Mkst => {
                    let items = self.tuple(args[1])?.clone();
                    let mut set = HashSet::new();
                    let mut admitted = true;
                    for item in items.iter() {
                        if !self.admissible(item.tag()) {
                            admitted = false;
                            break;
                        }
                        set.insert(item.clone());
                    }
                    let v = if admitted {
                        Value::Set(set)
                    } else {
                        self.reg(args[2])?.clone()
                    };
                    self.set(args[0], v)?;
                }
                Opcode::LenM => {
                    let v = self.map(args[1])?.len() as i64;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::LenS => {
                    let v = self.set_value(args[1])?.len() as i64;
                    self.set(args[0], Value::Int(v))?;
                }
                Opcode::KeyM => {
                    let keys: Vector<Value> = self.map(args[1])?.keys().cloned().collect();
                    self.set(args[0], Value::List(keys))?;
                }

                // -- enums ------------------------------------------------
                Opcode::Idxt => {
                    let t = self.type_tag(args[1])?;
                    let ub = self.program.ub_enums();
                    let v = if !(tag::LB_ENUMS..ub).contains(&t) {
                        self.reg(args[3])?.clone()
                    } else {
                        let ix = self.int(args[2])?;
                        let variants = &self.program.enums[(t - tag::LB_ENUMS) as usize];
                        if ix >= 0 && (ix as usize) < variants.len() {
                            Value::Enum {
                                tag: t,
                                index: ix as usize,
                            }
                        } else {
                            self.reg(args[4])?.clone()
                        }
                    };
                    self.set(args[0], v)?;
                }

                // -- structs ----------------------------------------------
                Opcode::Strc => {
                    let mut fields = Vec::with_capacity(args.len() - 2);
                    for &src in &args[2..] {
                        fields.push(self.reg(src)?.clone());
                    }
                    self.set(
                        args[0],
                        Value::Struct {
                            tag: args[1],
                            fields: Arc::new(fields),
                        },
                    )?;
                }
                Opcode::IxZl => {
                    let (stag, fields) = self.struct_value(args[1])?;
                    let fields = fields.clone();
                    let label = self.label(args[2])?;
                    let number = (stag - self.program.ub_enums()) as usize;
                    let field = self.program.resolver.resolve(number, label).ok_or_else(|| {
                        MachineError::UnknownField {
                            type_name: self.program.type_name(stag).to_string(),
                            label: self
                                .program
                                .labels
                                .get(label)
                                .cloned()
                                .unwrap_or_else(|| label.to_string()),
                        }
                    })?;
                    let v = fields
                        .get(field)
                        .cloned()
                        .ok_or(MachineError::Bounds { reg: args[1], loc })?;
                    self.set(args[0], v)?;
                }
                Opcode::IxZn => {
                    let (_, fields) = self.struct_value(args[1])?;
                    let v = fields
                        .get(args[2] as usize)
                        .cloned()
                        .ok_or(MachineError::Bounds { reg: args[1], loc })?;
                    self.set(args[0], v)?;
                }
                Opcode::KeyZ => {
                    let (stag, _) = self.struct_value(args[1])?;
                    let number = (stag - self.program.ub_enums()) as usize;
                    let labels: Vector<Value> = self.program.struct_labels[number]
                        .iter()
                        .map(|&l| Value::Label(l))
                        .collect();
                    self.set(args[0], Value::List(labels))?;
                }

                // -- calls and closures -----------------------------------
                Opcode::Call => {
                    let base = args[1];
                    let hireg = args[2];
                    for i in base..hireg {
                        let src = args[(3 + i - base) as usize];
                        let v = self.reg(src)?.clone();
                        self.set(i, v)?;
                    }
                    self.push_return(loc)?;
                    loc = args[0];
                    continue;
                }
                Opcode::CalT => {
                    self.shift_tuple_call(args)?;
                    self.push_return(loc)?;
                    loc = args[0];
                    continue;
                }
                Opcode::Mkfn => {
                    let factory = self
                        .program
                        .lambda_factories
                        .get(args[1] as usize)
                        .ok_or(MachineError::BadFactory(args[1]))?;
                    let mut lambda = factory.model.clone();
                    let ext_mem = factory.ext_mem.clone();
                    lambda.captures = ext_mem
                        .iter()
                        .map(|&r| self.reg(r).cloned())
                        .collect::<Result<_, _>>()?;
                    self.set(args[0], Value::Func(Arc::new(lambda)))?;
                }
                Opcode::Dofn => {
                    let lambda = self.lambda(args[1])?;
                    let result = self.invoke(&lambda, &args[2..])?;
                    self.set(args[0], result)?;
                }

                // -- diagnostics ------------------------------------------
                Opcode::Litx => {
                    let v = self.program.literal(self.reg(args[1])?);
                    self.set(args[0], Value::String(v))?;
                }
                Opcode::Strx => {
                    let v = self.program.describe(self.reg(args[1])?);
                    self.set(args[0], Value::String(v))?;
                }
                Opcode::Typx => {
                    let v = Value::Type(self.reg(args[1])?.tag());
                    self.set(args[0], v)?;
                }
                Opcode::Mker => {
                    let message = self.string(args[1])?.to_owned();
                    let token = self.token(args[2])?.clone();
                    let v = Value::error(RtError::new("eval/user", message, Some(token)));
                    self.set(args[0], v)?;
                }
                Opcode::Adtk => {
                    let mut v = self.reg(args[1])?.clone();
                    let token = self.token(args[2])?.clone();
                    match &mut v {
                        Value::Error(err) => Arc::make_mut(err).trace.push(token),
                        other => {
                            return Err(self.tag_fault("error", args[1], other.tag()));
                        }
                    }
                    self.set(args[0], v)?;
                }
            }
            loc += 1;
        }
        debug!(halted_at = self.loc, "run finished");
        Ok(())
    }

    /// Invokes a closure: a private register file is built from the
    /// lambda's frame image, captures and arguments are written into their
    /// slots, and its body runs on a fresh machine over the same program.
    fn invoke(&self, lambda: &Lambda, arg_regs: &[u32]) -> Result<Value, MachineError> {
        let param_count = (lambda.prm_top - lambda.ext_top) as usize;
        if arg_regs.len() != param_count {
            return Err(MachineError::CallArity {
                expected: param_count,
                got: arg_regs.len(),
                loc: self.loc,
            });
        }
        let mut frame: Vec<Value> = lambda.frame.as_ref().clone();
        if frame.len() < lambda.prm_top as usize {
            frame.resize(lambda.prm_top as usize, Value::Undefined);
        }
        let capture_base = lambda.ext_top as usize - lambda.captures.len();
        for (i, capture) in lambda.captures.iter().enumerate() {
            frame[capture_base + i] = capture.clone();
        }
        for (i, &src) in arg_regs.iter().enumerate() {
            frame[lambda.ext_top as usize + i] = self.reg(src)?.clone();
        }
        let mut inner = Vm {
            program: Arc::clone(&self.program),
            mem: frame,
            callstack: Vec::new(),
            options: self.options.clone(),
            loc: 0,
        };
        inner.run(lambda.entry)?;
        inner
            .mem
            .get(lambda.dest as usize)
            .cloned()
            .ok_or(MachineError::BadRegister {
                reg: lambda.dest,
                loc: self.loc,
            })
    }

    /// Regroups `CalT` arguments into per-parameter registers. The register
    /// named by `args[2]` is the parameter hireg and also holds the sorted
    /// positions at which tuple parameters begin; a tuple parameter absorbs
    /// the surplus arguments, leaving one source argument for every
    /// remaining parameter after it.
    fn shift_tuple_call(&mut self, args: &[u32]) -> Result<(), MachineError> {
        let base = args[1];
        let hireg = args[2];
        let starts = self.int_array(hireg)?.clone();
        let mut supplied = Vec::with_capacity(args.len() - 3);
        for &src in &args[3..] {
            supplied.push(self.reg(src)?.clone());
        }
        let param_count = (hireg - base) as usize;
        let mut si = 0usize;
        for p in 0..param_count {
            let slot = base + p as u32;
            if starts.binary_search(&(p as u32)).is_ok() {
                let remaining = param_count - p - 1;
                let take = supplied.len().saturating_sub(si + remaining);
                let items: Vec<Value> = supplied[si..si + take].to_vec();
                si += take;
                self.set(slot, Value::tuple(items))?;
            } else {
                let v = supplied
                    .get(si)
                    .cloned()
                    .ok_or(MachineError::CallArity {
                        expected: param_count,
                        got: supplied.len(),
                        loc: self.loc,
                    })?;
                si += 1;
                self.set(slot, v)?;
            }
        }
        Ok(())
    }

    fn push_return(&mut self, loc: u32) -> Result<(), MachineError> {
        if self.callstack.len() >= self.options.call_depth_limit {
            return Err(MachineError::CallDepth(self.options.call_depth_limit));
        }
        self.callstack.push(loc);
        Ok(())
    }

    /// The admission predicate for set members and map keys: hashable
    /// primitives and enums only.
    fn admissible(&self, t: Tag) -> bool {
        (tag::NULL..tag::PAIR).contains(&t)
            || (tag::LB_ENUMS..self.program.ub_enums()).contains(&t)
    }

    // Register accessors. A tag mismatch here means the compiler emitted a
    // typed opcode over an unproven register; that is a fault, not a value.

    fn reg(&self, r: u32) -> Result<&Value, MachineError> {
        self.mem.get(r as usize).ok_or(MachineError::BadRegister {
            reg: r,
            loc: self.loc,
        })
    }

    fn set(&mut self, r: u32, v: Value) -> Result<(), MachineError> {
        let loc = self.loc;
        match self.mem.get_mut(r as usize) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(MachineError::BadRegister { reg: r, loc }),
        }
    }

    fn tag_fault(&self, expected: &'static str, reg: u32, found: Tag) -> MachineError {
        MachineError::tag(expected, self.program.type_name(found), reg, self.loc)
    }

    fn int(&self, r: u32) -> Result<i64, MachineError> {
        match self.reg(r)? {
            Value::Int(n) => Ok(*n),
            other => Err(self.tag_fault("int", r, other.tag())),
        }
    }

    fn float(&self, r: u32) -> Result<f64, MachineError> {
        match self.reg(r)? {
            Value::Float(f) => Ok(*f),
            other => Err(self.tag_fault("float", r, other.tag())),
        }
    }

    fn boolean(&self, r: u32) -> Result<bool, MachineError> {
        match self.reg(r)? {
            Value::Bool(b) => Ok(*b),
            other => Err(self.tag_fault("bool", r, other.tag())),
        }
    }

    fn string(&self, r: u32) -> Result<&str, MachineError> {
        match self.reg(r)? {
            Value::String(s) => Ok(s),
            other => Err(self.tag_fault("string", r, other.tag())),
        }
    }

    fn tuple(&self, r: u32) -> Result<&Arc<Vec<Value>>, MachineError> {
        match self.reg(r)? {
            Value::Tuple(items) => Ok(items),
            other => Err(self.tag_fault("tuple", r, other.tag())),
        }
    }

    fn list(&self, r: u32) -> Result<&Vector<Value>, MachineError> {
        match self.reg(r)? {
            Value::List(items) => Ok(items),
            other => Err(self.tag_fault("list", r, other.tag())),
        }
    }

    fn pair(&self, r: u32) -> Result<&Arc<[Value; 2]>, MachineError> {
        match self.reg(r)? {
            Value::Pair(kv) => Ok(kv),
            other => Err(self.tag_fault("pair", r, other.tag())),
        }
    }

    fn map(&self, r: u32) -> Result<&crate::value::ValueMap, MachineError> {
        match self.reg(r)? {
            Value::Map(m) => Ok(m),
            other => Err(self.tag_fault("map", r, other.tag())),
        }
    }

    fn set_value(&self, r: u32) -> Result<&HashSet<Value>, MachineError> {
        match self.reg(r)? {
            Value::Set(s) => Ok(s),
            other => Err(self.tag_fault("set", r, other.tag())),
        }
    }

    fn label(&self, r: u32) -> Result<usize, MachineError> {
        match self.reg(r)? {
            Value::Label(l) => Ok(*l),
            other => Err(self.tag_fault("label", r, other.tag())),
        }
    }

    fn type_tag(&self, r: u32) -> Result<Tag, MachineError> {
        match self.reg(r)? {
            Value::Type(t) => Ok(*t),
            other => Err(self.tag_fault("type", r, other.tag())),
        }
    }

    fn int_array(&self, r: u32) -> Result<&Arc<Vec<u32>>, MachineError> {
        match self.reg(r)? {
            Value::IntArray(xs) => Ok(xs),
            other => Err(self.tag_fault("int array", r, other.tag())),
        }
    }

    fn lambda(&self, r: u32) -> Result<Arc<Lambda>, MachineError> {
        match self.reg(r)? {
            Value::Func(lambda) => Ok(Arc::clone(lambda)),
            other => Err(self.tag_fault("func", r, other.tag())),
        }
    }

    fn struct_value(&self, r: u32) -> Result<(Tag, &Arc<Vec<Value>>), MachineError> {
        match self.reg(r)? {
            Value::Struct { tag, fields } => Ok((*tag, fields)),
            other => Err(self.tag_fault("struct", r, other.tag())),
        }
    }

    fn token(&self, ix: u32) -> Result<&Token, MachineError> {
        self.program
            .tokens
            .get(ix as usize)
            .ok_or(MachineError::BadToken(ix))
    }
}

fn flatten_into_tuple(v: Value) -> Vec<Value> {
    match v {
        Value::Tuple(items) => items.as_ref().clone(),
        single => vec![single],
    }
}

fn parse_failure(id: &str, text: &str) -> Value {
    Value::error(RtError::new(id, format!("cannot parse {text:?}"), None))
}
