//! User-facing rendering of values. Lives on `Program` because enums,
//! structs, labels and types render through its name tables.

use crate::value::tag::{self, Tag};
use crate::value::Value;
use crate::vm::program::Program;

impl Program {
    pub fn describe_type(&self, t: Tag) -> &str {
        self.type_name(t)
    }

    /// The plain rendering used by `Strx`: strings appear bare.
    pub fn describe(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value);
        out
    }

    /// The quoted rendering used by `Litx`: strings keep their quotes.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{s}\""),
            _ => self.describe(value),
        }
    }

    fn write_value(&self, out: &mut String, value: &Value) {
        match value {
            Value::Undefined => out.push_str("undefined value"),
            Value::IntArray(xs) => {
                out.push_str("int_array(");
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&x.to_string());
                }
                out.push(')');
            }
            Value::Thunk(_) => out.push_str("thunk"),
            Value::LocalConstant => out.push_str("created local constant"),
            Value::Tuple(items) => {
                // A 1-tuple is distinct from its element; mark it.
                if items.len() == 1 {
                    out.push_str("tuple(");
                } else {
                    out.push('(');
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, item);
                }
                out.push(')');
            }
            Value::Error(e) => {
                out.push_str("error ");
                out.push_str(&e.id);
                if !e.message.is_empty() {
                    out.push_str(": ");
                    out.push_str(&e.message);
                }
            }
            Value::Unsat => out.push_str("unsatisfied conditional"),
            Value::Ref(addr) => {
                out.push_str("ref m");
                out.push_str(&addr.to_string());
            }
            Value::Null => out.push_str("null"),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::String(s) => out.push_str(s),
            Value::Float(f) => out.push_str(&format!("{f:?}")),
            Value::Type(t) => out.push_str(self.describe_type(*t)),
            Value::Func(_) => out.push_str("lambda function"),
            Value::Pair(kv) => {
                self.write_value(out, &kv[0]);
                out.push_str("::");
                self.write_value(out, &kv[1]);
            }
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, item);
                }
                out.push(']');
            }
            Value::Map(map) => {
                out.push_str("map(");
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, k);
                    out.push_str("::");
                    self.write_value(out, v);
                }
                out.push(')');
            }
            Value::Set(set) => {
                out.push_str("set(");
                for (i, item) in set.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, item);
                }
                out.push(')');
            }
            Value::Label(n) => {
                out.push_str(self.labels.get(*n).map(String::as_str).unwrap_or("?"));
            }
            Value::Enum { tag: t, index } => {
                let variant = self
                    .enums
                    .get((t - tag::LB_ENUMS) as usize)
                    .and_then(|vs| vs.get(*index));
                match variant {
                    Some(name) => out.push_str(name),
                    None => out.push_str(self.type_name(*t)),
                }
            }
            Value::Struct { tag: t, fields } => {
                out.push_str(self.type_name(*t));
                out.push_str(" with (");
                let labels = self
                    .struct_labels
                    .get((t - self.ub_enums()) as usize)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let label = labels
                        .get(i)
                        .and_then(|&l| self.labels.get(l))
                        .map(String::as_str)
                        .unwrap_or("?");
                    out.push_str(label);
                    out.push_str("::");
                    self.write_value(out, field);
                }
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AltType;
    use crate::value::tag;

    #[test]
    fn primitives_render_plainly() {
        let p = Program::blank();
        assert_eq!(p.describe(&Value::Int(-3)), "-3");
        assert_eq!(p.describe(&Value::Float(0.5)), "0.5");
        assert_eq!(p.describe(&Value::Float(2.0)), "2.0");
        assert_eq!(p.describe(&Value::Bool(true)), "true");
        assert_eq!(p.describe(&Value::Null), "null");
        assert_eq!(p.describe(&Value::string("hi")), "hi");
        assert_eq!(p.literal(&Value::string("hi")), "\"hi\"");
        assert_eq!(p.literal(&Value::Int(-3)), "-3");
        assert_eq!(p.describe(&Value::Type(tag::INT)), "int");
    }

    #[test]
    fn compounds_render_with_their_shapes() {
        let p = Program::blank();
        let pair = Value::pair(Value::Int(1), Value::string("a"));
        assert_eq!(p.describe(&pair), "1::a");
        let tup = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(p.describe(&tup), "(1, 2)");
        let one = Value::tuple(vec![Value::Int(9)]);
        assert_eq!(p.describe(&one), "tuple(9)");
        let list: Value = Value::List([Value::Int(1), Value::Int(2)].into_iter().collect());
        assert_eq!(p.describe(&list), "[1, 2]");
    }

    #[test]
    fn enums_and_structs_render_through_the_name_tables() {
        let mut p = Program::blank();
        let colour = p.add_enum("Colour", &["RED", "GREEN"]).unwrap();
        let lx = p.add_label("x");
        let ly = p.add_label("y");
        let point = p
            .add_struct("Point", vec![lx, ly], vec![AltType::new(), AltType::new()])
            .unwrap();
        assert_eq!(
            p.describe(&Value::Enum { tag: colour, index: 1 }),
            "GREEN"
        );
        let v = Value::Struct {
            tag: point,
            fields: std::sync::Arc::new(vec![Value::Int(3), Value::Int(7)]),
        };
        assert_eq!(p.describe(&v), "Point with (x::3, y::7)");
        assert_eq!(p.describe(&Value::Label(ly)), "y");
    }
}
