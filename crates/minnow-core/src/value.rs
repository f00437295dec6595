use std::hash::{Hash, Hasher};
use std::sync::Arc;

use im::{HashSet, Vector};
use indexmap::IndexMap;

/// The numeric tag space. Primitives occupy a fixed prefix, user-declared
/// enums start at `LB_ENUMS`, and struct tags follow the enums from
/// `Program::ub_enums()` upward.
pub mod tag {
    pub type Tag = u32;

    pub const UNDEFINED: Tag = 0;
    pub const INT_ARRAY: Tag = 1;
    pub const THUNK: Tag = 2;
    pub const CREATED_LOCAL_CONSTANT: Tag = 3;
    pub const TUPLE: Tag = 4;
    pub const ERROR: Tag = 5;
    pub const UNSAT: Tag = 6;
    pub const REF: Tag = 7;
    pub const NULL: Tag = 8;
    pub const INT: Tag = 9;
    pub const BOOL: Tag = 10;
    pub const STRING: Tag = 11;
    pub const FLOAT: Tag = 12;
    pub const TYPE: Tag = 13;
    pub const FUNC: Tag = 14;
    pub const PAIR: Tag = 15;
    pub const LIST: Tag = 16;
    pub const MAP: Tag = 17;
    pub const SET: Tag = 18;
    pub const LABEL: Tag = 19;
    pub const LB_ENUMS: Tag = 20;
}

use tag::Tag;

/// A source token, carried by error-producing instructions. Lexing is the
/// front end's business; the core only threads tokens through error values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub literal: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(literal: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            literal: literal.into(),
            line,
            col,
        }
    }
}

/// A first-class error value. Errors never unwind; they are written to a
/// destination register and travel like any other value, growing their
/// trace through `Adtk` as they bubble out of call frames.
#[derive(Clone, Debug, PartialEq)]
pub struct RtError {
    pub id: String,
    pub message: String,
    pub token: Option<Token>,
    pub args: Vec<Value>,
    pub trace: Vec<Token>,
}

impl RtError {
    pub fn new(id: impl Into<String>, message: impl Into<String>, token: Option<Token>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            token,
            args: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// A closure: entry point, parameter layout, result register, the initial
/// register-file image its body was compiled against, and the values it
/// captured when `Mkfn` ran. Each invocation gets a private register file
/// built from `frame`, so re-entry cannot observe a previous activation.
///
/// Captures land at `[ext_top - captures.len(), ext_top)`; arguments at
/// `[ext_top, prm_top)`; the result is read from `dest`.
#[derive(Clone, Debug)]
pub struct Lambda {
    pub ext_top: u32,
    pub prm_top: u32,
    pub dest: u32,
    pub entry: u32,
    pub frame: Arc<Vec<Value>>,
    pub captures: Vec<Value>,
}

/// Insertion-ordered map keyed by value, with copy-on-write sharing: clones
/// are cheap and writers split off their own copy.
#[derive(Clone, Debug, Default)]
pub struct ValueMap(Arc<IndexMap<Value, Value>>);

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        Arc::make_mut(&mut self.0).insert(key, value);
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.0.keys()
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl FromIterator<(Value, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

/// A runtime value: one variant per kind, plus the open-ended enum and
/// struct kinds which carry their numeric tag. All payloads are immutable;
/// the collection kinds share structure on clone.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    IntArray(Arc<Vec<u32>>),
    Thunk(u32),
    LocalConstant,
    Tuple(Arc<Vec<Value>>),
    Error(Arc<RtError>),
    Unsat,
    Ref(u32),
    Null,
    Int(i64),
    Bool(bool),
    String(String),
    Float(f64),
    Type(Tag),
    Func(Arc<Lambda>),
    Pair(Arc<[Value; 2]>),
    List(Vector<Value>),
    Map(ValueMap),
    Set(HashSet<Value>),
    Label(usize),
    Enum { tag: Tag, index: usize },
    Struct { tag: Tag, fields: Arc<Vec<Value>> },
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Undefined => tag::UNDEFINED,
            Value::IntArray(_) => tag::INT_ARRAY,
            Value::Thunk(_) => tag::THUNK,
            Value::LocalConstant => tag::CREATED_LOCAL_CONSTANT,
            Value::Tuple(_) => tag::TUPLE,
            Value::Error(_) => tag::ERROR,
            Value::Unsat => tag::UNSAT,
            Value::Ref(_) => tag::REF,
            Value::Null => tag::NULL,
            Value::Int(_) => tag::INT,
            Value::Bool(_) => tag::BOOL,
            Value::String(_) => tag::STRING,
            Value::Float(_) => tag::FLOAT,
            Value::Type(_) => tag::TYPE,
            Value::Func(_) => tag::FUNC,
            Value::Pair(_) => tag::PAIR,
            Value::List(_) => tag::LIST,
            Value::Map(_) => tag::MAP,
            Value::Set(_) => tag::SET,
            Value::Label(_) => tag::LABEL,
            Value::Enum { tag, .. } => *tag,
            Value::Struct { tag, .. } => *tag,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Arc::new(items))
    }

    pub fn pair(first: Value, second: Value) -> Self {
        Value::Pair(Arc::new([first, second]))
    }

    pub fn error(err: RtError) -> Self {
        Value::Error(Arc::new(err))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::IntArray(a), Value::IntArray(b)) => a == b,
            (Value::Thunk(a), Value::Thunk(b)) => a == b,
            (Value::LocalConstant, Value::LocalConstant) => true,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Unsat, Value::Unsat) => true,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Type(a), Value::Type(b)) => a == b,
            // Lambda bodies have no structural identity; compare by pointer.
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Label(a), Value::Label(b)) => a == b,
            (
                Value::Enum { tag: ta, index: ia },
                Value::Enum { tag: tb, index: ib },
            ) => ta == tb && ia == ib,
            (
                Value::Struct {
                    tag: ta,
                    fields: fa,
                },
                Value::Struct {
                    tag: tb,
                    fields: fb,
                },
            ) => ta == tb && fa == fb,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.tag());
        match self {
            Value::Undefined
            | Value::LocalConstant
            | Value::Unsat
            | Value::Null => {}
            Value::IntArray(xs) => xs.hash(state),
            Value::Thunk(a) | Value::Ref(a) => a.hash(state),
            Value::Tuple(items) => items.hash(state),
            Value::Error(e) => {
                e.id.hash(state);
                e.message.hash(state);
            }
            Value::Int(n) => n.hash(state),
            Value::Bool(b) => b.hash(state),
            Value::String(s) => s.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Type(t) => t.hash(state),
            Value::Func(lambda) => (Arc::as_ptr(lambda) as usize).hash(state),
            Value::Pair(kv) => kv.hash(state),
            Value::List(items) => items.hash(state),
            // Collections hash shallowly: their equality is order-insensitive,
            // and they are inadmissible as set members or map keys anyway.
            Value::Map(map) => map.len().hash(state),
            Value::Set(set) => set.len().hash(state),
            Value::Label(n) => n.hash(state),
            Value::Enum { index, .. } => index.hash(state),
            Value::Struct { fields, .. } => fields.hash(state),
        }
    }
}

/// The constants every blank program is seeded with, at these addresses.
pub const C_FALSE: u32 = 0;
pub const C_TRUE: u32 = 1;
pub const C_UNSAT: u32 = 2;
pub const C_ONE: u32 = 3;

pub fn seed_constants() -> Vec<Value> {
    vec![Value::Bool(false), Value::Bool(true), Value::Unsat, Value::Int(1)]
}
