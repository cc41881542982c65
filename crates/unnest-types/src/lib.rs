//! Type system for the unnest IR
//!
//! Defines module-qualified names and the type representations attached to
//! variables, fields and function signatures in the IR.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the module holding the runtime support entities
/// (the stack chain global and the generic tracer).
pub const PRIVATE_BUILTIN: &str = "private_builtin";

/// A dotted module name, e.g. `list` or `io.file`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleName(pub String);

impl ModuleName {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleName(name.into())
    }

    /// The runtime support module
    pub fn private_builtin() -> Self {
        ModuleName(PRIVATE_BUILTIN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A name qualified by the module it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub module: ModuleName,
    pub name: String,
}

impl QualifiedName {
    pub fn new(module: &ModuleName, name: impl Into<String>) -> Self {
        Self {
            module: module.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Error returned when parsing a qualified name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("qualified name `{0}` has no module part")]
    MissingModule(String),
    #[error("qualified name `{0}` has an empty component")]
    EmptyComponent(String),
}

impl FromStr for QualifiedName {
    type Err = NameError;

    /// Parses `module.path.name`; the last component is the name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, name) = s
            .rsplit_once('.')
            .ok_or_else(|| NameError::MissingModule(s.to_string()))?;
        if module.is_empty() || name.is_empty() || module.split('.').any(str::is_empty) {
            return Err(NameError::EmptyComponent(s.to_string()));
        }
        Ok(QualifiedName {
            module: ModuleName::new(module),
            name: name.to_string(),
        })
    }
}

/// Whether a synthesized record is a value type or a reference type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    /// Value type, may live on the stack
    Struct,
    /// Reference type, always heap allocated
    Class,
}

/// Reference to a class or struct type by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassRef {
    pub name: QualifiedName,
    pub kind: ClassKind,
}

/// Function signature (argument and return types)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub args: Vec<Type>,
    pub returns: Vec<Type>,
}

impl Signature {
    pub fn new(args: Vec<Type>, returns: Vec<Type>) -> Self {
        Self { args, returns }
    }
}

/// Core type representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    /// Machine integer
    Int,
    /// Floating point number
    Float,
    /// Character
    Char,
    /// Boolean
    Bool,
    /// String
    String,
    /// A source-language value type; its representation may be a heap pointer
    Value(String),
    /// Boxed word of unknown type
    Generic,
    /// Untyped pointer used for generic environment pointers and chain links
    GenericEnvPtr,
    /// Runtime type descriptor
    TypeInfo,
    /// Commit reference (the jump buffer of a try-commit)
    CommitRef,
    /// Named class or struct type
    Class(ClassRef),
    /// Pointer to another type
    Ptr(Box<Type>),
    /// Array with element type
    Array(Box<Type>),
    /// Function pointer
    Func(Box<Signature>),
    /// Not yet known; resolved by a later pass
    Unknown,
}

impl Type {
    /// Pointer to `self`
    pub fn ptr_to(self) -> Type {
        Type::Ptr(Box::new(self))
    }

    /// Check if this type is a class or struct type
    pub fn is_class(&self) -> bool {
        matches!(self, Type::Class(_))
    }

    /// Check if values of this type may hold references into the collected heap
    pub fn may_hold_heap_refs(&self) -> bool {
        match self {
            Type::Int | Type::Float | Type::Char | Type::Bool | Type::CommitRef => false,
            Type::Func(_) => false,
            Type::String
            | Type::Value(_)
            | Type::Generic
            | Type::GenericEnvPtr
            | Type::TypeInfo
            | Type::Class(_)
            | Type::Ptr(_)
            | Type::Array(_)
            | Type::Unknown => true,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::Char => f.write_str("char"),
            Type::Bool => f.write_str("bool"),
            Type::String => f.write_str("string"),
            Type::Value(name) => write!(f, "value<{}>", name),
            Type::Generic => f.write_str("box"),
            Type::GenericEnvPtr => f.write_str("void *"),
            Type::TypeInfo => f.write_str("type_info"),
            Type::CommitRef => f.write_str("commit_ref"),
            Type::Class(class) => match class.kind {
                ClassKind::Struct => write!(f, "struct {}", class.name),
                ClassKind::Class => write!(f, "class {}", class.name),
            },
            Type::Ptr(inner) => write!(f, "{} *", inner),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Func(sig) => {
                f.write_str("fn(")?;
                for (i, arg) in sig.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")?;
                match sig.returns.len() {
                    0 => Ok(()),
                    1 => write!(f, " -> {}", sig.returns[0]),
                    _ => {
                        f.write_str(" -> (")?;
                        for (i, ret) in sig.returns.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{}", ret)?;
                        }
                        f.write_str(")")
                    }
                }
            }
            Type::Unknown => f.write_str("?"),
        }
    }
}
