use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info, trace};
use thiserror::Error;

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::environment::{EnvId, Environments};
use crate::error::LoxError;
use crate::session::Session;
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, LoxInstance, NativeFunction, Value};

/// Ways evaluation can leave the normal path.
#[derive(Error, Debug)]
pub enum InterpretError {
    /// A runtime error; unwinds to [`Interpreter::interpret`].
    #[error(transparent)]
    Runtime(#[from] LoxError),

    /// A `return` statement; unwinds to the enclosing function call.
    #[error("Return signal with value: {0}")]
    ReturnSignal(Value),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, InterpretError>;

/// Deepest chain of pending Lox calls before "Stack overflow." is raised.
/// Each call costs several Rust frames, so the host thread needs a stack
/// sized for this many (the `lox` binary runs on a dedicated thread).
pub const MAX_CALL_DEPTH: usize = 8_000;

/// Tree‑walking evaluator.
///
/// Owns every scope (see [`Environments`]), the resolver's distance table,
/// and the writer `print` goes to.
pub struct Interpreter {
    environments: Environments,
    globals: EnvId,
    environment: EnvId,
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
    depth: usize,
}

impl Interpreter {
    /// Creates an Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates an Interpreter whose `print` statements write to `out`, and
    /// defines native functions such as `clock`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let mut environments = Environments::new();
        let globals = environments.globals();

        debug!("Defining native function 'clock'");

        environments.define(
            globals,
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: |_args: &[Value]| {
                    let timestamp: f64 = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
                        .as_secs_f64();
                    Ok(Value::Number(timestamp))
                },
            })),
        );

        Self {
            environments,
            globals,
            environment: globals,
            locals: HashMap::new(),
            out,
            depth: 0,
        }
    }

    /// Record that the variable use `id` binds `depth` scopes up.  Called by
    /// the resolver; uses it never sees are globals.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        trace!("Noting {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Drop the distances of uses that can never run again, e.g. the
    /// top level of a prompt line that has finished.
    pub fn forget(&mut self, ids: &[ExprId]) {
        for id in ids {
            self.locals.remove(id);
        }
    }

    /// Number of variable uses with a recorded distance.
    pub fn resolved_count(&self) -> usize {
        self.locals.len()
    }

    /// Resolved distance of a variable use, if it is local.
    pub fn resolved_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Number of scopes currently held by the arena, globals included.
    pub fn live_environments(&self) -> usize {
        self.environments.live()
    }

    /// Runs a program.  A runtime error stops it and is reported to
    /// `session`.
    pub fn interpret(&mut self, statements: &[Stmt], session: &mut Session) {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}
                Err(InterpretError::Runtime(e)) => {
                    debug!("Runtime error: {}", e);
                    session.report(&e);
                    return;
                }
                // The resolver rejects top-level `return`.
                Err(InterpretError::ReturnSignal(value)) => {
                    debug!("Ignoring top-level return of {}", value);
                    return;
                }
            }
        }

        info!("Interpretation completed successfully");
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Block(statements) => {
                let env = self.environments.child(self.environment);
                self.execute_block(statements, env)
            }

            Stmt::Class { name, methods } => {
                debug!("Defining class '{}'", name.lexeme);

                // Methods close over the scope the class is declared in.
                self.environments.capture(self.environment);

                let methods: HashMap<String, Rc<LoxFunction>> = methods
                    .iter()
                    .map(|decl| {
                        let is_initializer = decl.name.lexeme == "init";
                        let method =
                            LoxFunction::new(Rc::clone(decl), self.environment, is_initializer);
                        (decl.name.lexeme.clone(), Rc::new(method))
                    })
                    .collect();

                let class = LoxClass {
                    name: name.lexeme.clone(),
                    methods,
                };

                self.environments
                    .define(self.environment, &name.lexeme, Value::Class(Rc::new(class)));
                Ok(())
            }

            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                self.environments.capture(self.environment);

                let function = LoxFunction::new(Rc::clone(decl), self.environment, false);
                self.environments.define(
                    self.environment,
                    &decl.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
                Ok(())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(())
                }
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value).map_err(LoxError::from)?;
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                trace!("Returning value: {}", value);
                Err(InterpretError::ReturnSignal(value))
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                trace!("Defining variable '{}' = {}", name.lexeme, value);
                self.environments
                    .define(self.environment, &name.lexeme, value);
                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
        }
    }

    /// Runs `statements` with `environment` as the current scope, then
    /// restores the previous scope on every exit path and hands
    /// `environment` back to the arena.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvId) -> IResult<()> {
        let previous: EnvId = mem::replace(&mut self.environment, environment);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;
        self.environments.release(environment);

        result
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => self.environments.assign_at(
                        self.environment,
                        distance,
                        name,
                        value.clone(),
                    )?,
                    None => self
                        .environments
                        .assign(self.globals, name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call(callee, paren, values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => get_property(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.").into()),
            },

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have properties.").into());
                };

                let value: Value = self.evaluate(value)?;
                instance.set(&name.lexeme, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator, "Operand must be a number.").into()),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.").into()),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> IResult<Value> {
        let value = match self.locals.get(&id) {
            Some(&distance) => self.environments.get_at(self.environment, distance, name)?,
            None => self.environments.get(self.globals, name)?,
        };

        Ok(value)
    }

    /// Evaluates a binary expression; the left operand first.
    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> IResult<Value> {
        let left: Value = self.evaluate(left)?;
        let right: Value = self.evaluate(right)?;

        let value = match op.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::String(a), Value::String(b)) => {
                    let mut joined = String::with_capacity(a.len() + b.len());
                    joined.push_str(&a);
                    joined.push_str(&b);
                    Value::from(joined)
                }
                _ => {
                    return Err(LoxError::runtime(
                        op,
                        "Operands must be two numbers or two strings.",
                    )
                    .into())
                }
            },

            TokenType::EQUAL_EQUAL => Value::Bool(left == right),
            TokenType::BANG_EQUAL => Value::Bool(left != right),

            _ => {
                let (a, b) = number_operands(op, &left, &right)?;

                match op.token_type {
                    TokenType::MINUS => Value::Number(a - b),
                    TokenType::STAR => Value::Number(a * b),
                    // IEEE semantics: x / 0 is inf, -inf or nan.
                    TokenType::SLASH => Value::Number(a / b),
                    TokenType::GREATER => Value::Bool(a > b),
                    TokenType::GREATER_EQUAL => Value::Bool(a >= b),
                    TokenType::LESS => Value::Bool(a < b),
                    TokenType::LESS_EQUAL => Value::Bool(a <= b),
                    _ => return Err(LoxError::runtime(op, "Invalid binary operator.").into()),
                }
            }
        };

        Ok(value)
    }

    /// Checks the callee and arity, then dispatches to its call protocol.
    fn call(&mut self, callee: Value, paren: &Token, arguments: Vec<Value>) -> IResult<Value> {
        match callee {
            Value::Function(function) => {
                check_arity(paren, function.arity(), arguments.len())?;
                self.call_function(&function, paren, arguments)
            }

            Value::Class(class) => {
                check_arity(paren, class.arity(), arguments.len())?;
                self.call_class(class, paren, arguments)
            }

            Value::NativeFunction(native) => {
                check_arity(paren, native.arity, arguments.len())?;
                debug!("Calling native function '{}'", native.name);
                let result = (native.func)(&arguments).map_err(|msg| LoxError::runtime(paren, msg))?;
                Ok(result)
            }

            other => {
                debug!("Attempted to call a {}", other.type_name());
                Err(LoxError::runtime(paren, "Can only call functions and classes.").into())
            }
        }
    }

    /// Binds parameters in a fresh scope under the closure and runs the body.
    fn call_function(
        &mut self,
        function: &LoxFunction,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> IResult<Value> {
        debug!("Calling user-defined function '{}'", function.name());

        if self.depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(paren, "Stack overflow.").into());
        }

        self.depth += 1;
        let result = self.run_function(function, arguments);
        self.depth -= 1;

        result
    }

    fn run_function(&mut self, function: &LoxFunction, arguments: Vec<Value>) -> IResult<Value> {
        // A bound method gets the single-binding `this` scope first.
        let this_scope: Option<EnvId> = function.this.as_ref().map(|instance| {
            let scope = self.environments.child(function.closure);
            self.environments
                .define(scope, "this", Value::Instance(Rc::clone(instance)));
            scope
        });

        let environment = self
            .environments
            .child(this_scope.unwrap_or(function.closure));

        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            self.environments
                .define(environment, &param.lexeme, argument);
        }

        let result = self.execute_block(&function.declaration.body, environment);

        if let Some(scope) = this_scope {
            self.environments.release(scope);
        }

        let returned: Value = match result {
            Ok(()) => Value::Nil,
            Err(InterpretError::ReturnSignal(value)) => value,
            Err(e) => return Err(e),
        };

        // An initializer always yields its instance, even after a bare `return`.
        if function.is_initializer {
            if let Some(instance) = &function.this {
                return Ok(Value::Instance(Rc::clone(instance)));
            }
        }

        Ok(returned)
    }

    /// Allocates an instance and runs `init` on it when the class has one.
    fn call_class(
        &mut self,
        class: Rc<LoxClass>,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> IResult<Value> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Rc::new(LoxInstance::new(Rc::clone(&class)));

        if let Some(initializer) = class.find_method("init") {
            self.call_function(&initializer.bind(Rc::clone(&instance)), paren, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Field first, then a method bound to `instance`.
fn get_property(instance: &Rc<LoxInstance>, name: &Token) -> IResult<Value> {
    if let Some(value) = instance.field(&name.lexeme) {
        return Ok(value);
    }

    if let Some(method) = instance.class.find_method(&name.lexeme) {
        let bound = method.bind(Rc::clone(instance));
        return Ok(Value::Function(Rc::new(bound)));
    }

    Err(LoxError::runtime(name, format!("Undefined property '{}'.", name.lexeme)).into())
}

fn number_operands(op: &Token, left: &Value, right: &Value) -> IResult<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(op, "Operands must be numbers.").into()),
    }
}

fn check_arity(paren: &Token, arity: usize, given: usize) -> IResult<()> {
    if arity == given {
        return Ok(());
    }

    Err(LoxError::runtime(
        paren,
        format!("Expected {} arguments but got {}.", arity, given),
    )
    .into())
}
