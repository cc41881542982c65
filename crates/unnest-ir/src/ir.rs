//! IR definitions
//!
//! The IR is a low-level, imperative representation produced by the front end:
//! modules are lists of definitions, function bodies are statement trees, and
//! every variable occurrence is an [`Lval::Var`] leaf.

use serde::{Deserialize, Serialize};
use std::fmt;
use unnest_types::{ModuleName, QualifiedName, Signature, Type};

/// Name of the implicit environment pointer local in a function that uses an environment
pub const ENV_PTR: &str = "env_ptr";

/// Name of the implicit generic environment pointer parameter of a nested function
pub const ENV_PTR_ARG: &str = "env_ptr_arg";

/// Name of the local pointing at the GC frame record in a function that links one
pub const FRAME_PTR: &str = "frame_ptr";

/// Name of the generic frame pointer parameter of a generated trace function
pub const THIS_FRAME: &str = "this_frame";

/// Name of the stack chain global in the runtime support module
pub const STACK_CHAIN: &str = "stack_chain";

/// Name of the generic tracer in the runtime support module
pub const GC_TRACE: &str = "gc_trace";

/// Source location carried through from the front end
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    pub file: String,
    pub line: u32,
}

impl Context {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Check if this context carries no location
    pub fn is_unknown(&self) -> bool {
        self.file.is_empty()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("<unknown>")
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// A complete IR module (one compilation unit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module name
    pub name: ModuleName,
    /// Modules this one refers to
    #[serde(default)]
    pub imports: Vec<ModuleName>,
    /// Top-level definitions, in order
    pub defns: Vec<Defn>,
}

/// A definition: function, data or class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defn {
    pub name: EntityName,
    #[serde(default)]
    pub context: Context,
    pub flags: DeclFlags,
    pub body: DefnBody,
}

/// The name of a defined entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityName {
    /// A type, with its arity
    Type { name: String, arity: u32 },
    /// A variable or constant
    Data(String),
    /// A function
    Function(FunctionName),
}

/// Name of a function: the label of the procedure it implements,
/// the mode number, and a sequence number for functions the front end
/// generated out of one procedure (nested continuations and the like)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionName {
    pub label: String,
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub seq: Option<u32>,
}

impl FunctionName {
    pub fn new(label: impl Into<String>, mode: u32) -> Self {
        Self {
            label: label.into(),
            mode,
            seq: None,
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Deterministic mangled form: `<label>_<mode>[_<seq>]`
    pub fn mangled(&self) -> String {
        match self.seq {
            Some(seq) => format!("{}_{}_{}", self.label, self.mode, seq),
            None => format!("{}_{}", self.label, self.mode),
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mangled())
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityName::Type { name, arity } => write!(f, "{}/{}", name, arity),
            EntityName::Data(name) => f.write_str(name),
            EntityName::Function(name) => write!(f, "{}", name),
        }
    }
}

/// Visibility of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    /// Only visible within the enclosing block
    Local,
    /// Visible within the module
    Private,
    /// Visible to everything that can see the enclosing class or module
    Public,
    /// Exported from the module
    Exported,
}

/// Storage class of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Storage {
    /// One copy per activation (or per instance, for class members)
    PerInstance,
    /// A single copy for the whole program
    OneCopy,
}

/// Whether a data definition may be modified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constness {
    Modifiable,
    Const,
}

/// Declaration flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclFlags {
    pub access: Access,
    pub storage: Storage,
    pub constness: Constness,
}

impl DeclFlags {
    /// Flags of an ordinary local variable
    pub fn local_var() -> Self {
        Self {
            access: Access::Local,
            storage: Storage::PerInstance,
            constness: Constness::Modifiable,
        }
    }

    /// Flags of a local static constant
    pub fn local_static_const() -> Self {
        Self {
            access: Access::Local,
            storage: Storage::OneCopy,
            constness: Constness::Const,
        }
    }

    /// Flags of a function nested in another function
    pub fn nested_function() -> Self {
        Self {
            access: Access::Local,
            storage: Storage::PerInstance,
            constness: Constness::Modifiable,
        }
    }

    /// Flags of a module-level definition private to the module
    pub fn private_one_copy() -> Self {
        Self {
            access: Access::Private,
            storage: Storage::OneCopy,
            constness: Constness::Modifiable,
        }
    }

    /// Flags of a public field of a record
    pub fn public_field() -> Self {
        Self {
            access: Access::Public,
            storage: Storage::PerInstance,
            constness: Constness::Modifiable,
        }
    }
}

/// Body of a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefnBody {
    Function(FunctionDefn),
    Data(DataDefn),
    Class(ClassDefn),
}

/// A function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefn {
    pub params: Params,
    /// None for external functions
    pub body: Option<Stmt>,
}

/// Function parameters and return types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub args: Vec<Argument>,
    #[serde(default)]
    pub returns: Vec<Type>,
}

impl Params {
    pub fn signature(&self) -> Signature {
        Signature::new(
            self.args.iter().map(|a| a.ty.clone()).collect(),
            self.returns.clone(),
        )
    }
}

/// A function argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub ty: Type,
    /// Tracing obligation attached by the front end
    #[serde(default)]
    pub gc: GcStatement,
}

/// A data (variable or constant) definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDefn {
    pub ty: Type,
    #[serde(default)]
    pub init: Initializer,
    /// Tracing obligation attached by the front end
    #[serde(default)]
    pub gc: GcStatement,
}

/// Initial value of a data definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    #[default]
    None,
    Single(Rval),
    Struct(Type, Vec<Initializer>),
    Array(Vec<Initializer>),
}

/// Code the collector needs to run for a variable that may hold heap pointers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum GcStatement {
    /// Nothing to trace
    #[default]
    None,
    /// Trace the variable
    Trace(Stmt),
    /// Initialise state (typically type descriptors) needed by other trace code
    Initialiser(Stmt),
}

impl GcStatement {
    pub fn is_none(&self) -> bool {
        matches!(self, GcStatement::None)
    }

    pub fn stmt(&self) -> Option<&Stmt> {
        match self {
            GcStatement::None => None,
            GcStatement::Trace(stmt) | GcStatement::Initialiser(stmt) => Some(stmt),
        }
    }
}

/// A class or struct definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDefn {
    pub kind: unnest_types::ClassKind,
    pub members: Vec<Defn>,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Block with local definitions followed by statements
    Block {
        defns: Vec<Defn>,
        stmts: Vec<Stmt>,
        #[serde(default)]
        context: Context,
    },
    /// Loop
    While {
        kind: LoopKind,
        cond: Rval,
        body: Box<Stmt>,
    },
    /// Conditional
    If {
        cond: Rval,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    /// Multi-way branch
    Switch {
        ty: Type,
        scrutinee: Rval,
        cases: Vec<SwitchCase>,
        default: SwitchDefault,
    },
    /// Function call
    Call(CallStmt),
    /// Return from the current function
    Return(Vec<Rval>),
    /// Non-local exit to the handler of the try-commit owning the commit reference
    DoCommit(Rval),
    /// Run `protected`; a commit to `reference` within it resumes at `handler`
    TryCommit {
        reference: Lval,
        protected: Box<Stmt>,
        handler: Box<Stmt>,
    },
    /// Atomic statement
    Atomic(AtomicStmt),
}

/// Whether a loop tests its condition before the first iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopKind {
    MayLoopZeroTimes,
    LoopAtLeastOnce,
}

/// A case in a switch statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub conds: Vec<CaseCond>,
    pub body: Stmt,
}

/// Condition selecting a switch case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaseCond {
    Match(Rval),
    Range(Rval, Rval),
}

/// What a switch does when no case matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwitchDefault {
    Unreachable,
    DoNothing,
    Case(Box<Stmt>),
}

/// A function call statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStmt {
    pub signature: Signature,
    pub callee: Rval,
    /// Receiver for method calls
    #[serde(default)]
    pub object: Option<Rval>,
    pub args: Vec<Rval>,
    /// Where the results are stored
    #[serde(default)]
    pub results: Vec<Lval>,
    #[serde(default)]
    pub kind: CallKind,
}

/// How control continues after a call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    #[default]
    Ordinary,
    /// The call is the last thing the caller does; its results are the caller's results
    Tail,
    /// The callee never returns
    NoReturn,
}

/// Atomic statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AtomicStmt {
    Comment(String),
    Assign(Lval, Rval),
    /// Heap-allocate an object and store its address in `target`
    NewObject {
        target: Lval,
        ty: Type,
        args: Vec<Rval>,
        arg_types: Vec<Type>,
    },
    /// Bind the fields of a cell to `bindings`, in order
    Deconstruct {
        source: Rval,
        ty: Type,
        bindings: Vec<Lval>,
    },
    /// Give the collector a chance to run
    GcCheck,
    /// Save the heap pointer
    MarkHp(Lval),
    /// Restore the heap pointer
    RestoreHp(Rval),
}

/// Storage location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lval {
    /// Field of the record at `address`
    Field {
        /// Primary tag to strip from `address`; `Some(0)` marks a direct field access
        tag: Option<u32>,
        address: Rval,
        field: FieldId,
        field_ty: Type,
        ptr_ty: Type,
    },
    /// Memory at `address`
    Mem { address: Rval, ty: Type },
    /// Variable
    Var { name: QualifiedName, ty: Type },
}

/// How a field is selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldId {
    /// By name, within the given class type
    Named { name: QualifiedName, class_ty: Type },
    /// By word offset
    Offset(Rval),
}

/// Value-producing expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rval {
    Lval(Box<Lval>),
    /// Address of a location
    MemAddr(Box<Lval>),
    Const(Const),
    Unop(Unop, Box<Rval>),
    Binop(Binop, Box<Rval>, Box<Rval>),
    /// Reinterpret the value as another type
    Cast(Type, Box<Rval>),
}

/// Constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    Int(i64),
    Float(f64),
    Char(char),
    Bool(bool),
    String(String),
    /// Null pointer of the given type
    Null(Type),
    /// All-zero value of the given type
    Zero(Type),
    /// Address of a function
    CodeAddr {
        module: ModuleName,
        name: FunctionName,
        signature: Signature,
    },
    /// Address of a module-level data definition
    DataAddr(QualifiedName),
    /// Runtime type descriptor for a named type
    TypeDescriptor(String),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unop {
    Neg,
    Not,
    BitNot,
    /// Strip the primary tag from a tagged pointer
    StripTag,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binop {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Module {
    pub fn new(name: ModuleName) -> Self {
        Self {
            name,
            imports: Vec::new(),
            defns: Vec::new(),
        }
    }
}

impl Defn {
    /// Data definition
    pub fn data(name: impl Into<String>, flags: DeclFlags, data: DataDefn, context: Context) -> Self {
        Self {
            name: EntityName::Data(name.into()),
            context,
            flags,
            body: DefnBody::Data(data),
        }
    }

    /// Function definition
    pub fn function(name: FunctionName, flags: DeclFlags, func: FunctionDefn, context: Context) -> Self {
        Self {
            name: EntityName::Function(name),
            context,
            flags,
            body: DefnBody::Function(func),
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDefn> {
        match &self.body {
            DefnBody::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataDefn> {
        match &self.body {
            DefnBody::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn function_name(&self) -> Option<&FunctionName> {
        match &self.name {
            EntityName::Function(name) => Some(name),
            _ => None,
        }
    }

    pub fn data_name(&self) -> Option<&str> {
        match &self.name {
            EntityName::Data(name) => Some(name),
            _ => None,
        }
    }

    /// Check if this is a static constant: a one-copy, const data definition
    pub fn is_static_const(&self) -> bool {
        matches!(self.body, DefnBody::Data(_))
            && self.flags.storage == Storage::OneCopy
            && self.flags.constness == Constness::Const
    }
}

impl Stmt {
    /// Block with no local definitions
    pub fn block(stmts: Vec<Stmt>, context: Context) -> Self {
        Stmt::Block {
            defns: Vec::new(),
            stmts,
            context,
        }
    }

    pub fn assign(lval: Lval, rval: Rval) -> Self {
        Stmt::Atomic(AtomicStmt::Assign(lval, rval))
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Stmt::Atomic(AtomicStmt::Comment(text.into()))
    }
}

impl Lval {
    pub fn var(name: QualifiedName, ty: Type) -> Self {
        Lval::Var { name, ty }
    }

    /// Name of the variable, if this is a variable
    pub fn var_name(&self) -> Option<&QualifiedName> {
        match self {
            Lval::Var { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl Rval {
    pub fn lval(lval: Lval) -> Self {
        Rval::Lval(Box::new(lval))
    }

    pub fn var(name: QualifiedName, ty: Type) -> Self {
        Rval::Lval(Box::new(Lval::Var { name, ty }))
    }

    pub fn mem_addr(lval: Lval) -> Self {
        Rval::MemAddr(Box::new(lval))
    }

    pub fn cast(ty: Type, rval: Rval) -> Self {
        Rval::Cast(ty, Box::new(rval))
    }

    pub fn int(value: i64) -> Self {
        Rval::Const(Const::Int(value))
    }
}

/// The stack chain global
pub fn stack_chain_var() -> Lval {
    Lval::Var {
        name: QualifiedName::new(&ModuleName::private_builtin(), STACK_CHAIN),
        ty: Type::GenericEnvPtr,
    }
}

/// Check if `name` refers to the runtime's generic tracer
pub fn is_gc_trace_primitive(module: &ModuleName, name: &FunctionName) -> bool {
    module.as_str() == unnest_types::PRIVATE_BUILTIN && name.label == GC_TRACE
}
