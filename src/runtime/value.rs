use std::{collections::HashMap, fmt, sync::Arc};

use crate::runtime::{
    builtins::BuiltinFunction,
    digest::{ContentHasher, Digest},
};
use crate::syntax::{Identifier, block::Block};

const TAG_INT: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_BOOL: u8 = 0x03;
const TAG_LIST: u8 = 0x04;
const TAG_CLOSURE: u8 = 0x05;
const TAG_BUILTIN: u8 = 0x06;
const TAG_UNIT: u8 = 0x07;

/// A runtime value. Values never change after construction; lists are
/// shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    String(Arc<str>),
    Bool(bool),
    List(Arc<Vec<Value>>),
    Function(Function),
    Unit,
}

#[derive(Debug, Clone)]
pub enum Function {
    User(Arc<Closure>),
    Builtin(&'static BuiltinFunction),
}

/// A user-defined function together with the locals it captured.
#[derive(Debug)]
pub struct Closure {
    pub name: Option<Identifier>,
    pub parameters: Vec<Identifier>,
    pub body: Block,
    pub captured: HashMap<String, Value>,
    /// Canonical source text of the definition.
    pub definition: String,
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::User(a), Function::User(b)) => Arc::ptr_eq(a, b),
            (Function::Builtin(a), Function::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::User(closure) => closure.name.as_deref().unwrap_or("<anonymous>"),
            Function::Builtin(builtin) => builtin.name,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::String(_) => "String",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Function(_) => "Function",
            Value::Unit => "Unit",
        }
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// True when the value (or anything nested in it) is a function.
    pub fn contains_function(&self) -> bool {
        match self {
            Value::Function(_) => true,
            Value::List(items) => items.iter().any(Value::contains_function),
            _ => false,
        }
    }

    /// Deterministic structural hash: equal values hash equal no matter how
    /// they were built.
    pub fn content_hash(&self) -> Digest {
        let mut hasher = ContentHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into(&self, hasher: &mut ContentHasher) {
        match self {
            Value::Int(n) => {
                hasher.tag(TAG_INT).i64(*n);
            }
            Value::String(s) => {
                hasher.tag(TAG_STRING).str(s);
            }
            Value::Bool(b) => {
                hasher.tag(TAG_BOOL).tag(u8::from(*b));
            }
            Value::List(items) => {
                hasher.tag(TAG_LIST).u64(items.len() as u64);
                for item in items.iter() {
                    item.hash_into(hasher);
                }
            }
            Value::Function(Function::User(closure)) => {
                hasher.tag(TAG_CLOSURE).str(&closure.definition);
                let mut names: Vec<&String> = closure.captured.keys().collect();
                names.sort();
                hasher.u64(names.len() as u64);
                for name in names {
                    hasher.str(name);
                    closure.captured[name].hash_into(hasher);
                }
            }
            Value::Function(Function::Builtin(builtin)) => {
                hasher.tag(TAG_BUILTIN).str(builtin.name);
            }
            Value::Unit => {
                hasher.tag(TAG_UNIT);
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::list(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::String(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
            Value::Function(function) => write!(f, "<fn {}>", function.name()),
            Value::Unit => write!(f, "()"),
        }
    }
}
