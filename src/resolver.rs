//! Static resolution pass.
//!
//! Walks the AST once before evaluation to:
//!
//! 1. build the lexical scope stack and compute, for every variable
//!    occurrence, the distance from the environment active at
//!    evaluation time to the environment holding the binding;
//! 2. enforce the static rules: no redeclaration in the same scope, no
//!    reading a local in its own initializer, `return` only inside
//!    functions (and valueless inside initializers), `this`/`super`
//!    only where a class context allows them;
//! 3. record each distance in the interpreter's side table, keyed by
//!    expression identity.
//!
//! References not found in any local scope are left unrecorded and the
//! evaluator falls back to the global environment. Resolution halts on
//! the first error; there is no recovery inside this pass.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::expr::Expr;
use crate::interpreter::Interpreter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// Which kind of function body is being resolved. Gates `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// Which kind of class body is being resolved. Gates `this` and
/// `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    /// false = declared, true = defined.
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'interp> Resolver<'interp> {
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    // ── Statements ───────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

            Stmt::Var { name, initializer } => {
                self.declare(name)?;

                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }

                self.define(name);

                Ok(())
            }

            Stmt::Block(statements) => {
                self.begin_scope();

                let result = self.resolve(statements);

                self.end_scope();

                result
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;

                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)
            }

            Stmt::Function(declaration) => {
                // Declared and defined eagerly so the function can
                // recurse.
                self.declare(&declaration.name)?;
                self.define(&declaration.name);

                self.resolve_function(declaration, FunctionType::Function)
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Can't return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(LoxError::resolve(
                            keyword.line,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr)?;
                }

                Ok(())
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        let enclosing_class = self.current_class;
        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        self.declare(name)?;
        self.define(name);

        let result = (|| {
            if let Some(superclass) = superclass {
                if let Expr::Variable {
                    name: super_name, ..
                } = superclass
                {
                    if super_name.lexeme == name.lexeme {
                        return Err(LoxError::resolve(
                            super_name.line,
                            "A class can't inherit from itself.",
                        ));
                    }
                }

                self.resolve_expr(superclass)?;

                // Methods of a subclass close over a scope where
                // `super` is bound.
                self.begin_scope();
                self.scope_insert("super");
            }

            self.begin_scope();
            self.scope_insert("this");

            for method in methods {
                let function_type = if method.name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };

                self.resolve_function(method, function_type)?;
            }

            self.end_scope();

            if superclass.is_some() {
                self.end_scope();
            }

            Ok(())
        })();

        self.current_class = enclosing_class;

        result
    }

    fn resolve_function(
        &mut self,
        declaration: &FunctionDecl,
        function_type: FunctionType,
    ) -> Result<()> {
        let enclosing = self.current_function;
        self.current_function = function_type;

        self.begin_scope();

        let result = (|| {
            for param in &declaration.params {
                self.declare(param)?;
                self.define(param);
            }

            self.resolve(&declaration.body)
        })();

        self.end_scope();
        self.current_function = enclosing;

        result
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => Ok(()),

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        return Err(LoxError::resolve(
                            name.line,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }

                self.resolve_local(*id, name);

                Ok(())
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);

                Ok(())
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;

                for argument in arguments {
                    self.resolve_expr(argument)?;
                }

                Ok(())
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Can't use 'this' outside of a class.",
                    ));
                }

                self.resolve_local(*id, keyword);

                Ok(())
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        return Err(LoxError::resolve(
                            keyword.line,
                            "Can't use 'super' outside of a class.",
                        ));
                    }

                    ClassType::Class => {
                        return Err(LoxError::resolve(
                            keyword.line,
                            "Can't use 'super' in a class with no superclass.",
                        ));
                    }

                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword);

                Ok(())
            }
        }
    }

    // ── Scope management ─────────────────────────────────────────────

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Insert a synthetic, already-defined binding (`this`, `super`)
    /// into the innermost scope.
    fn scope_insert(&mut self, name: &str) {
        self.scopes
            .last_mut()
            .expect("scope stack is empty")
            .insert(name.to_string(), true);
    }

    fn declare(&mut self, name: &Token) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                return Err(LoxError::resolve(
                    name.line,
                    format!("Variable '{}' already declared in this scope.", name.lexeme),
                ));
            }

            scope.insert(name.lexeme.clone(), false);
        }

        Ok(())
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Search the scope stack from innermost outward; on a hit, record
    /// the hop count in the interpreter's side table. A miss means the
    /// reference is global and nothing is recorded.
    fn resolve_local(&mut self, id: crate::expr::ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.resolve(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
