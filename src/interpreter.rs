//! Tree-walking evaluator.
//!
//! Owns the environment chain, the resolver's scope-distance table, the
//! swappable output sink and the cancellation check. `return` travels
//! as an [`Unwind`] variant distinct from errors; only the function
//! call boundary consumes it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::environment::{self, Environment};
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{NativeFunction, Value};

/// Cloneable cancellation handle.
///
/// The evaluator polls it between top-level statements; a cancelled run
/// stops with [`LoxError::Cancelled`] and leaves the interpreter ready
/// for the next run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Non-local exits bubbling through statement execution.
#[derive(Debug)]
pub enum Unwind {
    /// A `return` statement on its way to the enclosing call frame.
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(e: LoxError) -> Self {
        Unwind::Error(e)
    }
}

type EvalResult = std::result::Result<Value, Unwind>;
type ExecResult = std::result::Result<(), Unwind>;

/// A user-declared function together with its captured environment.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// A copy of this method whose closure has an extra innermost scope
    /// binding `this` to the receiver.
    fn bind(&self, instance: &Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &self.closure,
        ))));
        env.borrow_mut()
            .define("this", Value::Instance(Rc::clone(instance)));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }
}

/// A class object: method table plus optional superclass.
pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Method lookup, walking the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// A class called as a constructor takes whatever `init` takes.
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map(|init| init.arity())
            .unwrap_or(0)
    }
}

/// A class instance: mutable field map plus its class.
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }
}

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Scope distances recorded by the resolver, keyed by expression
    /// identity. Never mutated during evaluation.
    locals: HashMap<ExprId, usize>,
    stdout: Sink,
}

impl Interpreter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(NativeFunction {
                name: "clock",
                arity: 0,
                func: native_clock,
            }),
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            stdout: Arc::new(Mutex::new(sink)),
        }
    }

    /// Swap the output sink. Atomic with respect to concurrent `print`
    /// writes: both sides go through the same lock.
    pub fn set_sink(&self, sink: Box<dyn Write + Send>) {
        let mut guard = self.stdout.lock().expect("output sink lock poisoned");
        *guard = sink;
    }

    /// Resolver callback: record the scope distance for an expression.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Run a resolved program. The cancellation handle is checked
    /// between top-level statements.
    pub fn interpret(&mut self, cancel: &CancelToken, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            if cancel.is_cancelled() {
                return Err(LoxError::Cancelled);
            }

            self.execute(stmt).map_err(|unwind| match unwind {
                Unwind::Error(e) => e,
                // The resolver rejects top-level `return`; this is only
                // reachable when interpret is fed unresolved input.
                Unwind::Return(_) => LoxError::runtime(0, "'return' outside of a function."),
            })?;
        }

        Ok(())
    }

    // ── Statements ───────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                let mut sink = self.stdout.lock().expect("output sink lock poisoned");
                writeln!(sink, "{}", value).map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(declaration) => {
                let function = LoxFunction {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> ExecResult {
        debug!("Declaring class '{}'", name.lexeme);

        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                other => {
                    return Err(LoxError::runtime(
                        name.line,
                        format!("Superclass must be a class, got {}.", other.type_name()),
                    )
                    .into());
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // The methods close over an extra scope binding `super` when a
        // superclass is present.
        let previous = if let Some(superclass) = &superclass {
            let previous = Rc::clone(&self.environment);
            let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                &self.environment,
            ))));
            env.borrow_mut()
                .define("super", Value::Class(Rc::clone(superclass)));
            self.environment = env;
            Some(previous)
        } else {
            None
        };

        let mut method_table = HashMap::with_capacity(methods.len());
        for method in methods {
            let function = LoxFunction {
                declaration: Rc::clone(method),
                closure: Rc::clone(&self.environment),
                is_initializer: method.name.lexeme == "init",
            };
            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass {
            name: name.lexeme.clone(),
            superclass,
            methods: method_table,
        };

        if let Some(previous) = previous {
            self.environment = previous;
        }

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)), name.line)?;

        Ok(())
    }

    /// Run statements inside `env`, restoring the previous environment
    /// on every exit path: normal completion, `return` unwinding and
    /// runtime errors alike.
    fn execute_block(&mut self, statements: &[Stmt], env: Rc<RefCell<Environment>>) -> ExecResult {
        let previous = Rc::clone(&self.environment);
        self.environment = env;

        let mut result = Ok(());
        for stmt in statements {
            result = self.execute(stmt);
            if result.is_err() {
                break;
            }
        }

        self.environment = previous;
        result
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(token) => Ok(self.literal_value(token)?),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                Ok(self.evaluate_unary(operator, right)?)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(self.evaluate_binary(left, operator, right)?)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                // Short-circuit: hand back the operand that decided the
                // outcome, not a coerced boolean.
                match operator.token_type {
                    TokenType::OR if left.is_truthy() => Ok(left),
                    TokenType::AND if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => Ok(self.look_up_variable(*id, name)?),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        environment::assign_at(
                            &self.environment,
                            distance,
                            &name.lexeme,
                            value.clone(),
                        );
                    }
                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(&name.lexeme, value.clone(), name.line)?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee, args, paren)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                Ok(self.get_property(object, name)?)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                let instance = match object {
                    Value::Instance(instance) => instance,
                    other => {
                        return Err(LoxError::runtime(
                            name.line,
                            format!("Only instances have fields, got {}.", other.type_name()),
                        )
                        .into());
                    }
                };

                let value = self.evaluate(value)?;
                instance
                    .borrow_mut()
                    .fields
                    .insert(name.lexeme.clone(), value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => Ok(self.look_up_variable(*id, keyword)?),

            Expr::Super { id, keyword, method } => Ok(self.evaluate_super(*id, keyword, method)?),
        }
    }

    fn literal_value(&self, token: &Token) -> Result<Value> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),
            TokenType::STRING(s) => Ok(Value::String(s.clone())),
            TokenType::TRUE => Ok(Value::Bool(true)),
            TokenType::FALSE => Ok(Value::Bool(false)),
            TokenType::NIL => Ok(Value::Nil),

            other => Err(LoxError::runtime(
                token.line,
                format!("Invalid literal token {:?}.", other),
            )),
        }
    }

    fn evaluate_unary(&self, operator: &Token, right: Value) -> Result<Value> {
        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(LoxError::runtime(
                    operator.line,
                    format!("Operand must be a number, got {}.", other.type_name()),
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),

            _ => Err(LoxError::runtime(
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(&self, left: Value, operator: &Token, right: Value) -> Result<Value> {
        let numbers = |left: &Value, right: &Value| -> Result<(f64, f64)> {
            match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
                (Value::Number(_), other) | (other, _) => Err(LoxError::runtime(
                    operator.line,
                    format!("Operands must be numbers, got {}.", other.type_name()),
                )),
            }
        };

        match operator.token_type {
            TokenType::PLUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                _ => Err(LoxError::runtime(
                    operator.line,
                    format!(
                        "Operands must be two numbers or two strings, got {} and {}.",
                        left.type_name(),
                        right.type_name()
                    ),
                )),
            },

            TokenType::MINUS => {
                let (a, b) = numbers(&left, &right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = numbers(&left, &right)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = numbers(&left, &right)?;
                if b == 0.0 {
                    // 0/0 is indeterminate and yields NaN; any other
                    // dividend over zero is an error.
                    if a == 0.0 {
                        return Ok(Value::Number(f64::NAN));
                    }

                    return Err(LoxError::runtime(operator.line, "Division by zero."));
                }
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = numbers(&left, &right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = numbers(&left, &right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = numbers(&left, &right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = numbers(&left, &right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left.lox_eq(&right))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!left.lox_eq(&right))),

            _ => Err(LoxError::runtime(
                operator.line,
                format!("Invalid binary operator '{}'.", operator.lexeme),
            )),
        }
    }

    // ── Calls, properties, classes ───────────────────────────────────

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> EvalResult {
        let check_arity = |want: usize| -> Result<()> {
            if want != args.len() {
                return Err(LoxError::runtime(
                    paren.line,
                    format!("Expected {} arguments but got {}.", want, args.len()),
                ));
            }
            Ok(())
        };

        match callee {
            Value::NativeFunction(native) => {
                check_arity(native.arity)?;
                Ok((native.func)(&args)?)
            }

            Value::Function(function) => {
                check_arity(function.arity())?;
                Ok(self.call_function(&function, args)?)
            }

            Value::Class(class) => {
                check_arity(class.arity())?;
                Ok(self.instantiate(&class, args)?)
            }

            other => Err(LoxError::runtime(
                paren.line,
                format!(
                    "Can only call functions and classes, got {}.",
                    other.type_name()
                ),
            )
            .into()),
        }
    }

    /// Invoke a user function: fresh environment under the closure,
    /// positional parameter binding, body execution. `return` unwinding
    /// stops here; an initializer always yields `this`.
    fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> Result<Value> {
        debug!("Calling <fn {}>", function.name());

        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &function.closure,
        ))));
        for (param, arg) in function.declaration.params.iter().zip(args) {
            env.borrow_mut().define(&param.lexeme, arg);
        }

        match self.execute_block(&function.declaration.body, env) {
            Ok(()) => {
                if function.is_initializer {
                    Ok(environment::get_at(&function.closure, 0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Unwind::Return(value)) => {
                if function.is_initializer {
                    // A bare `return;` in init still hands back the
                    // instance under construction.
                    Ok(environment::get_at(&function.closure, 0, "this"))
                } else {
                    Ok(value)
                }
            }

            Err(Unwind::Error(e)) => Err(e),
        }
    }

    /// Class call: allocate an instance, then run `init` (possibly
    /// inherited) bound to it.
    fn instantiate(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> Result<Value> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));

        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(&instance);
            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(instance))
    }

    /// Property access: fields shadow methods; a method comes back
    /// bound to the receiver.
    fn get_property(&self, object: Value, name: &Token) -> Result<Value> {
        let instance = match object {
            Value::Instance(instance) => instance,
            other => {
                return Err(LoxError::runtime(
                    name.line,
                    format!("Only instances have properties, got {}.", other.type_name()),
                ));
            }
        };

        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method = instance.borrow().class.find_method(&name.lexeme);
        if let Some(method) = method {
            return Ok(Value::Function(Rc::new(method.bind(&instance))));
        }

        Err(LoxError::runtime(
            name.line,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    fn evaluate_super(&self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = *self
            .locals
            .get(&id)
            .expect("'super' expression left unresolved");

        let superclass = match environment::get_at(&self.environment, distance, "super") {
            Value::Class(class) => class,
            _ => unreachable!("'super' bound to a non-class"),
        };

        // `this` lives one scope inside the `super` binding.
        let object = match environment::get_at(&self.environment, distance - 1, "this") {
            Value::Instance(instance) => instance,
            _ => unreachable!("'this' bound to a non-instance"),
        };

        let Some(found) = superclass.find_method(&method.lexeme) else {
            return Err(LoxError::runtime(
                keyword.line,
                format!("Undefined property '{}'.", method.lexeme),
            ));
        };

        Ok(Value::Function(Rc::new(found.bind(&object))))
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(environment::get_at(
                &self.environment,
                distance,
                &name.lexeme,
            )),
            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }
}

fn native_clock(_args: &[Value]) -> Result<Value> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LoxError::runtime(0, format!("clock error: {}", e)))?
        .as_secs();

    // Whole seconds, so two close-in-time calls compare equal.
    Ok(Value::Number(seconds as f64))
}
