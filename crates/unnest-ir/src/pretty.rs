//! C-like textual rendering of the IR
//!
//! Output is a pure function of the tree, so it doubles as a stable form for
//! comparing two runs of a pass.

use crate::ir::*;
use std::fmt::{self, Display, Formatter, Write};
use unnest_types::{ModuleName, QualifiedName};

const INDENT: &str = "    ";

struct Printer<'a, 'f> {
    out: &'a mut Formatter<'f>,
    indent: usize,
    /// Names qualified by this module are printed unqualified
    module: Option<&'a ModuleName>,
}

impl<'a, 'f> Printer<'a, 'f> {
    fn new(out: &'a mut Formatter<'f>, module: Option<&'a ModuleName>) -> Self {
        Self {
            out,
            indent: 0,
            module,
        }
    }

    fn line_start(&mut self) -> fmt::Result {
        for _ in 0..self.indent {
            self.out.write_str(INDENT)?;
        }
        Ok(())
    }

    fn name(&self, name: &QualifiedName) -> String {
        match self.module {
            Some(module) if *module == name.module => name.name.clone(),
            _ => name.to_string(),
        }
    }

    fn flags(&mut self, flags: &DeclFlags) -> fmt::Result {
        let access = match flags.access {
            Access::Local => "local",
            Access::Private => "private",
            Access::Public => "public",
            Access::Exported => "exported",
        };
        self.out.write_str(access)?;
        if flags.storage == Storage::OneCopy {
            self.out.write_str(" static")?;
        }
        if flags.constness == Constness::Const {
            self.out.write_str(" const")?;
        }
        Ok(())
    }

    fn defn(&mut self, defn: &Defn) -> fmt::Result {
        self.line_start()?;
        self.flags(&defn.flags)?;
        match &defn.body {
            DefnBody::Data(data) => {
                write!(self.out, " {} {}", data.ty, defn.name)?;
                if !matches!(data.init, Initializer::None) {
                    self.out.write_str(" = ")?;
                    self.initializer(&data.init)?;
                }
                self.out.write_str(";\n")?;
                self.gc(&data.gc)
            }
            DefnBody::Function(func) => {
                write!(self.out, " fn {}(", defn.name)?;
                for (i, arg) in func.params.args.iter().enumerate() {
                    if i > 0 {
                        self.out.write_str(", ")?;
                    }
                    write!(self.out, "{} {}", arg.ty, arg.name)?;
                }
                self.out.write_str(")")?;
                match func.params.returns.as_slice() {
                    [] => {}
                    [ret] => write!(self.out, " -> {}", ret)?,
                    rets => {
                        self.out.write_str(" -> (")?;
                        for (i, ret) in rets.iter().enumerate() {
                            if i > 0 {
                                self.out.write_str(", ")?;
                            }
                            write!(self.out, "{}", ret)?;
                        }
                        self.out.write_str(")")?;
                    }
                }
                match &func.body {
                    None => self.out.write_str(";\n"),
                    Some(body) => {
                        self.out.write_str("\n")?;
                        self.stmt(body)
                    }
                }?;
                for arg in &func.params.args {
                    if !arg.gc.is_none() {
                        self.line_start()?;
                        writeln!(self.out, "// argument {}", arg.name)?;
                        self.gc(&arg.gc)?;
                    }
                }
                Ok(())
            }
            DefnBody::Class(class) => {
                let keyword = match class.kind {
                    unnest_types::ClassKind::Struct => "struct",
                    unnest_types::ClassKind::Class => "class",
                };
                writeln!(self.out, " {} {} {{", keyword, defn.name)?;
                self.indent += 1;
                for member in &class.members {
                    self.defn(member)?;
                }
                self.indent -= 1;
                self.line_start()?;
                self.out.write_str("}\n")
            }
        }
    }

    fn gc(&mut self, gc: &GcStatement) -> fmt::Result {
        let (label, stmt) = match gc {
            GcStatement::None => return Ok(()),
            GcStatement::Trace(stmt) => ("gc_trace", stmt),
            GcStatement::Initialiser(stmt) => ("gc_init", stmt),
        };
        self.indent += 1;
        self.line_start()?;
        writeln!(self.out, "{}:", label)?;
        self.indent += 1;
        self.stmt(stmt)?;
        self.indent -= 2;
        Ok(())
    }

    fn initializer(&mut self, init: &Initializer) -> fmt::Result {
        match init {
            Initializer::None => self.out.write_str("<none>"),
            Initializer::Single(rval) => self.rval(rval),
            Initializer::Struct(_, inits) | Initializer::Array(inits) => {
                self.out.write_str("{ ")?;
                for (i, init) in inits.iter().enumerate() {
                    if i > 0 {
                        self.out.write_str(", ")?;
                    }
                    self.initializer(init)?;
                }
                self.out.write_str(" }")
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> fmt::Result {
        match stmt {
            Stmt::Block { defns, stmts, .. } => {
                self.line_start()?;
                self.out.write_str("{\n")?;
                self.indent += 1;
                for defn in defns {
                    self.defn(defn)?;
                }
                for stmt in stmts {
                    self.stmt(stmt)?;
                }
                self.indent -= 1;
                self.line_start()?;
                self.out.write_str("}\n")
            }
            Stmt::While { kind, cond, body } => match kind {
                LoopKind::MayLoopZeroTimes => {
                    self.line_start()?;
                    self.out.write_str("while (")?;
                    self.rval(cond)?;
                    self.out.write_str(")\n")?;
                    self.nested(body)
                }
                LoopKind::LoopAtLeastOnce => {
                    self.line_start()?;
                    self.out.write_str("do\n")?;
                    self.nested(body)?;
                    self.line_start()?;
                    self.out.write_str("while (")?;
                    self.rval(cond)?;
                    self.out.write_str(");\n")
                }
            },
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.line_start()?;
                self.out.write_str("if (")?;
                self.rval(cond)?;
                self.out.write_str(")\n")?;
                self.nested(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.line_start()?;
                    self.out.write_str("else\n")?;
                    self.nested(else_branch)?;
                }
                Ok(())
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
                ..
            } => {
                self.line_start()?;
                self.out.write_str("switch (")?;
                self.rval(scrutinee)?;
                self.out.write_str(") {\n")?;
                for case in cases {
                    for cond in &case.conds {
                        self.line_start()?;
                        self.out.write_str("case ")?;
                        match cond {
                            CaseCond::Match(rval) => self.rval(rval)?,
                            CaseCond::Range(lo, hi) => {
                                self.rval(lo)?;
                                self.out.write_str(" ... ")?;
                                self.rval(hi)?;
                            }
                        }
                        self.out.write_str(":\n")?;
                    }
                    self.nested(&case.body)?;
                }
                self.line_start()?;
                match default {
                    SwitchDefault::Unreachable => self.out.write_str("default: unreachable;\n")?,
                    SwitchDefault::DoNothing => self.out.write_str("default: ;\n")?,
                    SwitchDefault::Case(stmt) => {
                        self.out.write_str("default:\n")?;
                        self.nested(stmt)?;
                    }
                }
                self.line_start()?;
                self.out.write_str("}\n")
            }
            Stmt::Call(call) => {
                self.line_start()?;
                match call.kind {
                    CallKind::Ordinary => {}
                    CallKind::Tail => self.out.write_str("tailcall ")?,
                    CallKind::NoReturn => self.out.write_str("noreturn ")?,
                }
                if !call.results.is_empty() {
                    for (i, result) in call.results.iter().enumerate() {
                        if i > 0 {
                            self.out.write_str(", ")?;
                        }
                        self.lval(result)?;
                    }
                    self.out.write_str(" = ")?;
                }
                if let Some(object) = &call.object {
                    self.rval(object)?;
                    self.out.write_str(".")?;
                }
                self.rval(&call.callee)?;
                self.out.write_str("(")?;
                self.rvals(&call.args)?;
                self.out.write_str(");\n")
            }
            Stmt::Return(rvals) => {
                self.line_start()?;
                if rvals.is_empty() {
                    self.out.write_str("return;\n")
                } else {
                    self.out.write_str("return ")?;
                    self.rvals(rvals)?;
                    self.out.write_str(";\n")
                }
            }
            Stmt::DoCommit(rval) => {
                self.line_start()?;
                self.out.write_str("do_commit(")?;
                self.rval(rval)?;
                self.out.write_str(");\n")
            }
            Stmt::TryCommit {
                reference,
                protected,
                handler,
            } => {
                self.line_start()?;
                self.out.write_str("try_commit (")?;
                self.lval(reference)?;
                self.out.write_str(")\n")?;
                self.nested(protected)?;
                self.line_start()?;
                self.out.write_str("on_commit\n")?;
                self.nested(handler)
            }
            Stmt::Atomic(atomic) => {
                self.line_start()?;
                self.atomic(atomic)?;
                self.out.write_str("\n")
            }
        }
    }

    /// A statement that is the body of a compound statement
    fn nested(&mut self, stmt: &Stmt) -> fmt::Result {
        if matches!(stmt, Stmt::Block { .. }) {
            self.stmt(stmt)
        } else {
            self.indent += 1;
            let result = self.stmt(stmt);
            self.indent -= 1;
            result
        }
    }

    fn atomic(&mut self, atomic: &AtomicStmt) -> fmt::Result {
        match atomic {
            AtomicStmt::Comment(text) => write!(self.out, "/* {} */", text),
            AtomicStmt::Assign(lval, rval) => {
                self.lval(lval)?;
                self.out.write_str(" = ")?;
                self.rval(rval)?;
                self.out.write_str(";")
            }
            AtomicStmt::NewObject { target, ty, args, .. } => {
                self.lval(target)?;
                write!(self.out, " = new {}(", ty)?;
                self.rvals(args)?;
                self.out.write_str(");")
            }
            AtomicStmt::Deconstruct {
                source,
                ty,
                bindings,
            } => {
                self.out.write_str("(")?;
                for (i, binding) in bindings.iter().enumerate() {
                    if i > 0 {
                        self.out.write_str(", ")?;
                    }
                    self.lval(binding)?;
                }
                write!(self.out, ") = deconstruct<{}>(", ty)?;
                self.rval(source)?;
                self.out.write_str(");")
            }
            AtomicStmt::GcCheck => self.out.write_str("gc_check();"),
            AtomicStmt::MarkHp(lval) => {
                self.out.write_str("mark_hp(")?;
                self.lval(lval)?;
                self.out.write_str(");")
            }
            AtomicStmt::RestoreHp(rval) => {
                self.out.write_str("restore_hp(")?;
                self.rval(rval)?;
                self.out.write_str(");")
            }
        }
    }

    fn rvals(&mut self, rvals: &[Rval]) -> fmt::Result {
        for (i, rval) in rvals.iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            self.rval(rval)?;
        }
        Ok(())
    }

    fn rval(&mut self, rval: &Rval) -> fmt::Result {
        match rval {
            Rval::Lval(lval) => self.lval(lval),
            Rval::MemAddr(lval) => {
                self.out.write_str("&")?;
                self.lval(lval)
            }
            Rval::Const(c) => self.constant(c),
            Rval::Unop(op, operand) => {
                let op = match op {
                    Unop::Neg => "-",
                    Unop::Not => "!",
                    Unop::BitNot => "~",
                    Unop::StripTag => "strip_tag",
                };
                self.out.write_str(op)?;
                self.out.write_str("(")?;
                self.rval(operand)?;
                self.out.write_str(")")
            }
            Rval::Binop(op, left, right) => {
                self.out.write_str("(")?;
                self.rval(left)?;
                write!(self.out, " {} ", binop_str(*op))?;
                self.rval(right)?;
                self.out.write_str(")")
            }
            Rval::Cast(ty, operand) => {
                write!(self.out, "({}) ", ty)?;
                self.rval(operand)
            }
        }
    }

    fn constant(&mut self, c: &Const) -> fmt::Result {
        match c {
            Const::Int(value) => write!(self.out, "{}", value),
            Const::Float(value) => write!(self.out, "{:?}", value),
            Const::Char(value) => write!(self.out, "{:?}", value),
            Const::Bool(value) => write!(self.out, "{}", value),
            Const::String(value) => write!(self.out, "{:?}", value),
            Const::Null(_) => self.out.write_str("NULL"),
            Const::Zero(_) => self.out.write_str("0"),
            Const::CodeAddr { module, name, .. } => {
                let qualified = QualifiedName::new(module, name.mangled());
                let shown = self.name(&qualified);
                self.out.write_str(&shown)
            }
            Const::DataAddr(name) => {
                let shown = self.name(name);
                write!(self.out, "&{}", shown)
            }
            Const::TypeDescriptor(name) => write!(self.out, "type_ctor_info<{}>", name),
        }
    }

    fn lval(&mut self, lval: &Lval) -> fmt::Result {
        match lval {
            Lval::Var { name, .. } => {
                let shown = self.name(name);
                self.out.write_str(&shown)
            }
            Lval::Mem { address, .. } => {
                self.out.write_str("*(")?;
                self.rval(address)?;
                self.out.write_str(")")
            }
            Lval::Field {
                tag,
                address,
                field,
                ..
            } => {
                match tag {
                    Some(0) => self.rval(address)?,
                    Some(tag) => {
                        write!(self.out, "untag({}, ", tag)?;
                        self.rval(address)?;
                        self.out.write_str(")")?;
                    }
                    None => {
                        self.out.write_str("untag(")?;
                        self.rval(address)?;
                        self.out.write_str(")")?;
                    }
                }
                match field {
                    FieldId::Named { name, .. } => write!(self.out, "->{}", name.name),
                    FieldId::Offset(offset) => {
                        self.out.write_str("[")?;
                        self.rval(offset)?;
                        self.out.write_str("]")
                    }
                }
            }
        }
    }
}

fn binop_str(op: Binop) -> &'static str {
    match op {
        Binop::Add => "+",
        Binop::Sub => "-",
        Binop::Mul => "*",
        Binop::Div => "/",
        Binop::Rem => "%",
        Binop::BitAnd => "&",
        Binop::BitOr => "|",
        Binop::BitXor => "^",
        Binop::Shl => "<<",
        Binop::Shr => ">>",
        Binop::Eq => "==",
        Binop::Ne => "!=",
        Binop::Lt => "<",
        Binop::Le => "<=",
        Binop::Gt => ">",
        Binop::Ge => ">=",
        Binop::And => "&&",
        Binop::Or => "||",
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for import in &self.imports {
            writeln!(f, "import {}", import)?;
        }
        let mut printer = Printer::new(f, Some(&self.name));
        for defn in &self.defns {
            printer.out.write_char('\n')?;
            printer.defn(defn)?;
        }
        Ok(())
    }
}

impl Display for Defn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Printer::new(f, None).defn(self)
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Printer::new(f, None).stmt(self)
    }
}

impl Display for Rval {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Printer::new(f, None).rval(self)
    }
}

impl Display for Lval {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Printer::new(f, None).lval(self)
    }
}
