//! Reference rewriting
//!
//! Once a variable moves into the record, every occurrence of it has to go
//! through the record pointer instead.

use std::collections::HashSet;
use unnest_ir::*;
use unnest_types::{ModuleName, QualifiedName, Type};

/// Field `field` of the record that `ptr_var` points to
///
/// The tag is `Some(0)`: the pointer is never tagged.
pub fn record_field(module: &ModuleName, ptr_var: &str, ptr_ty: &Type, field: &str, field_ty: &Type) -> Lval {
    Lval::Field {
        tag: Some(0),
        address: Rval::var(QualifiedName::new(module, ptr_var), ptr_ty.clone()),
        field: FieldId::Named {
            name: QualifiedName::new(module, field),
            class_ty: ptr_ty.clone(),
        },
        field_ty: field_ty.clone(),
        ptr_ty: ptr_ty.clone(),
    }
}

enum Mode<'a> {
    /// Route captured variables through `ptr_var`; when that is `env_ptr`,
    /// also give `env_ptr` occurrences of unknown type the record pointer type
    Capture {
        captured: &'a HashSet<String>,
        ptr_var: &'a str,
        ptr_ty: &'a Type,
    },
    /// No record was built: reads of `env_ptr` become null
    EraseEnvPtr,
}

pub struct Rewriter<'a> {
    module: &'a ModuleName,
    mode: Mode<'a>,
}

impl<'a> Rewriter<'a> {
    pub fn capture(module: &'a ModuleName, captured: &'a HashSet<String>, ptr_var: &'a str, ptr_ty: &'a Type) -> Self {
        Self {
            module,
            mode: Mode::Capture {
                captured,
                ptr_var,
                ptr_ty,
            },
        }
    }

    pub fn erase_env_ptr(module: &'a ModuleName) -> Self {
        Self {
            module,
            mode: Mode::EraseEnvPtr,
        }
    }

    fn is_env_ptr(&self, name: &QualifiedName) -> bool {
        name.module == *self.module && name.name == ENV_PTR
    }

    pub fn stmts(&self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    /// Rewrite a whole statement, including local definitions
    pub fn stmt(&self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Block { defns, stmts, .. } => {
                for defn in defns.iter_mut() {
                    self.defn(defn);
                }
                self.stmts(stmts);
            }
            Stmt::While { cond, body, .. } => {
                self.rval(cond);
                self.stmt(body);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.rval(cond);
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch);
                }
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
                ..
            } => {
                self.rval(scrutinee);
                for case in cases.iter_mut() {
                    self.case_conds(&mut case.conds);
                    self.stmt(&mut case.body);
                }
                if let SwitchDefault::Case(body) = default {
                    self.stmt(body);
                }
            }
            Stmt::Call(call) => self.call(call),
            Stmt::Return(rvals) => {
                for rval in rvals.iter_mut() {
                    self.rval(rval);
                }
            }
            Stmt::DoCommit(rval) => self.rval(rval),
            Stmt::TryCommit {
                reference,
                protected,
                handler,
            } => {
                self.lval(reference);
                self.stmt(protected);
                self.stmt(handler);
            }
            Stmt::Atomic(atomic) => self.atomic(atomic),
        }
    }

    pub fn case_conds(&self, conds: &mut [CaseCond]) {
        for cond in conds {
            match cond {
                CaseCond::Match(rval) => self.rval(rval),
                CaseCond::Range(lo, hi) => {
                    self.rval(lo);
                    self.rval(hi);
                }
            }
        }
    }

    fn call(&self, call: &mut CallStmt) {
        self.rval(&mut call.callee);
        if let Some(object) = &mut call.object {
            self.rval(object);
        }
        for arg in call.args.iter_mut() {
            self.rval(arg);
        }
        for result in call.results.iter_mut() {
            self.lval(result);
        }
    }

    fn atomic(&self, atomic: &mut AtomicStmt) {
        match atomic {
            AtomicStmt::Comment(_) | AtomicStmt::GcCheck => {}
            AtomicStmt::Assign(lval, rval) => {
                self.lval(lval);
                self.rval(rval);
            }
            AtomicStmt::NewObject { target, args, .. } => {
                self.lval(target);
                for arg in args.iter_mut() {
                    self.rval(arg);
                }
            }
            AtomicStmt::Deconstruct {
                source, bindings, ..
            } => {
                self.rval(source);
                for binding in bindings.iter_mut() {
                    self.lval(binding);
                }
            }
            AtomicStmt::MarkHp(lval) => self.lval(lval),
            AtomicStmt::RestoreHp(rval) => self.rval(rval),
        }
    }

    /// Rewrite the initializer, GC code and (for functions) the body of a definition
    pub fn defn(&self, defn: &mut Defn) {
        match &mut defn.body {
            DefnBody::Data(data) => {
                self.initializer(&mut data.init);
                self.gc(&mut data.gc);
            }
            DefnBody::Function(func) => {
                if let Some(body) = &mut func.body {
                    self.stmt(body);
                }
            }
            DefnBody::Class(_) => {}
        }
    }

    pub fn gc(&self, gc: &mut GcStatement) {
        match gc {
            GcStatement::None => {}
            GcStatement::Trace(stmt) | GcStatement::Initialiser(stmt) => self.stmt(stmt),
        }
    }

    pub fn initializer(&self, init: &mut Initializer) {
        match init {
            Initializer::None => {}
            Initializer::Single(rval) => self.rval(rval),
            Initializer::Struct(_, inits) | Initializer::Array(inits) => {
                for init in inits.iter_mut() {
                    self.initializer(init);
                }
            }
        }
    }

    pub fn rval(&self, rval: &mut Rval) {
        if let Mode::EraseEnvPtr = self.mode {
            if let Rval::Lval(lval) = rval {
                if matches!(lval.as_ref(), Lval::Var { name, .. } if self.is_env_ptr(name)) {
                    *rval = Rval::Const(Const::Null(Type::GenericEnvPtr));
                    return;
                }
            }
        }
        match rval {
            Rval::Lval(lval) | Rval::MemAddr(lval) => self.lval(lval),
            Rval::Const(_) => {}
            Rval::Unop(_, operand) | Rval::Cast(_, operand) => self.rval(operand),
            Rval::Binop(_, left, right) => {
                self.rval(left);
                self.rval(right);
            }
        }
    }

    pub fn lval(&self, lval: &mut Lval) {
        match lval {
            Lval::Field { address, field, .. } => {
                self.rval(address);
                if let FieldId::Offset(offset) = field {
                    self.rval(offset);
                }
            }
            Lval::Mem { address, .. } => self.rval(address),
            Lval::Var { name, ty } => {
                let Mode::Capture {
                    captured,
                    ptr_var,
                    ptr_ty,
                } = &self.mode
                else {
                    return;
                };
                if name.module != *self.module {
                    return;
                }
                if captured.contains(&name.name) {
                    *lval = record_field(self.module, ptr_var, ptr_ty, &name.name, ty);
                } else if *ptr_var == ENV_PTR && name.name == ENV_PTR && *ty == Type::Unknown {
                    *ty = (*ptr_ty).clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m() -> ModuleName {
        ModuleName::new("m")
    }

    fn env_ptr_ty() -> Type {
        Type::Class(unnest_types::ClassRef {
            name: QualifiedName::new(&m(), "f_0_env"),
            kind: unnest_types::ClassKind::Struct,
        })
        .ptr_to()
    }

    #[test]
    fn test_captured_var_becomes_field() {
        let module = m();
        let captured: HashSet<String> = ["x".to_string()].into_iter().collect();
        let ptr_ty = env_ptr_ty();
        let rewriter = Rewriter::capture(&module, &captured, ENV_PTR, &ptr_ty);

        let mut stmt = Stmt::assign(
            Lval::var(QualifiedName::new(&module, "y"), Type::Int),
            Rval::var(QualifiedName::new(&module, "x"), Type::Int),
        );
        rewriter.stmt(&mut stmt);

        let expected = Stmt::assign(
            Lval::var(QualifiedName::new(&module, "y"), Type::Int),
            Rval::lval(record_field(&module, ENV_PTR, &ptr_ty, "x", &Type::Int)),
        );
        assert_eq!(stmt, expected);
    }

    #[test]
    fn test_other_module_untouched() {
        let module = m();
        let captured: HashSet<String> = ["x".to_string()].into_iter().collect();
        let ptr_ty = env_ptr_ty();
        let rewriter = Rewriter::capture(&module, &captured, ENV_PTR, &ptr_ty);

        let original = Rval::var(QualifiedName::new(&ModuleName::new("lib"), "x"), Type::Int);
        let mut rval = original.clone();
        rewriter.rval(&mut rval);
        assert_eq!(rval, original);
    }

    #[test]
    fn test_env_ptr_type_resolved() {
        let module = m();
        let captured = HashSet::new();
        let ptr_ty = env_ptr_ty();
        let rewriter = Rewriter::capture(&module, &captured, ENV_PTR, &ptr_ty);

        let mut rval = Rval::var(QualifiedName::new(&module, ENV_PTR), Type::Unknown);
        rewriter.rval(&mut rval);
        assert_eq!(rval, Rval::var(QualifiedName::new(&module, ENV_PTR), ptr_ty));
    }

    #[test]
    fn test_erase_env_ptr_reads() {
        let module = m();
        let rewriter = Rewriter::erase_env_ptr(&module);
        let mut args = vec![
            Rval::var(QualifiedName::new(&module, ENV_PTR), Type::Unknown),
            Rval::int(3),
        ];
        for arg in args.iter_mut() {
            rewriter.rval(arg);
        }
        assert_eq!(args[0], Rval::Const(Const::Null(Type::GenericEnvPtr)));
        assert_eq!(args[1], Rval::int(3));
    }
}
