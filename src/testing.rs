//! Reference engine for exercising the sandbox without a production runtime.
//!
//! [`CalcEngine`] implements the [`ScriptEngine`] contract over a small
//! integer expression language: literals, `+ - * /`, parentheses, variables
//! resolved through the two-tier frame, assignments (which always land in the
//! primary scope), and `;`-separated statements evaluating to the last value.
//! Two builtins exist for driving the wrapper's edge cases:
//!
//! - `spin(ms)` busy-waits, honoring the run's time limit and interrupt flag,
//! - `call(name)` invokes a registered host function, which is how the test
//!   suite triggers genuinely nested executions against a context.
//!
//! This is test support shared by the test suite, benches, and demo programs.
//! It is not a hardened interpreter and is not meant to run untrusted input.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::{Result, SandboxError};
use crate::sandbox::engine::{ExecRequest, ResolutionFrame, ScriptEngine};

/// Host function callable from scripts via `call(name)`.
pub type HostFn = dyn Fn() -> anyhow::Result<i64> + Send + Sync;

/// Handle for signaling an external interrupt to running scripts.
///
/// Stands in for a SIGINT watcher: runs started with `break_on_interrupt`
/// abort with [`SandboxError::Interrupted`] once the flag is raised; other
/// runs ignore it.
#[derive(Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Raise the interrupt flag.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Lower the interrupt flag.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Integer expression engine implementing the sandbox's collaborator
/// contract. Cheap to clone; clones share the interrupt flag and the host
/// function table.
#[derive(Clone, Default)]
pub struct CalcEngine {
    interrupt: Arc<AtomicBool>,
    host_fns: Arc<RwLock<HashMap<String, Arc<HostFn>>>>,
}

impl CalcEngine {
    /// Create an engine with no host functions registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for raising this engine's interrupt flag.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: Arc::clone(&self.interrupt),
        }
    }

    /// Register a host function reachable from scripts as `call(name)`.
    pub fn register_host_fn(
        &self,
        name: impl Into<String>,
        f: impl Fn() -> anyhow::Result<i64> + Send + Sync + 'static,
    ) {
        self.host_fns.write().unwrap().insert(name.into(), Arc::new(f));
    }
}

impl ScriptEngine for CalcEngine {
    type Compiled = CalcProgram;
    type Value = i64;

    fn compile(&self, source: &str) -> Result<CalcProgram> {
        let tokens = tokenize(source)?;
        Parser { tokens, pos: 0 }.parse_program()
    }

    fn execute(
        &self,
        compiled: &CalcProgram,
        frame: ResolutionFrame<i64>,
        request: &ExecRequest<'_>,
    ) -> Result<i64> {
        let evaluation = Evaluation {
            engine: self,
            frame: &frame,
            deadline: request.time_limit.map(|limit| Instant::now() + limit),
            time_limit: request.time_limit,
            break_on_interrupt: request.break_on_interrupt,
            unit: request.unit_label(),
        };
        evaluation.run(compiled)
    }

    fn cache_version(&self) -> u32 {
        1
    }
}

/// A parsed program: statements separated by `;`, value of the last one.
#[derive(Debug, Clone)]
pub struct CalcProgram {
    stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
enum Stmt {
    Assign(String, Expr),
    Expr(Expr),
}

#[derive(Debug, Clone)]
enum Expr {
    Number(i64),
    Var(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(i64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Assign,
    Semi,
    Comma,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' => {
                let mut value: i64 = 0;
                while let Some(&(_, d)) = chars.peek() {
                    let Some(digit) = d.to_digit(10) else { break };
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i64::from(digit)))
                        .ok_or_else(|| {
                            SandboxError::Compile(format!("numeric literal too large at byte {pos}"))
                        })?;
                    chars.next();
                }
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Assign);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semi);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            other => {
                return Err(SandboxError::Compile(format!(
                    "unexpected character `{other}` at byte {pos}"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(SandboxError::Compile(format!(
                "expected {what}, found {token:?}"
            ))),
            None => Err(SandboxError::Compile(format!(
                "expected {what}, found end of input"
            ))),
        }
    }

    fn parse_program(mut self) -> Result<CalcProgram> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            stmts.push(self.parse_stmt()?);
            match self.peek() {
                Some(Token::Semi) => {
                    self.pos += 1;
                }
                None => break,
                Some(token) => {
                    return Err(SandboxError::Compile(format!(
                        "expected `;` between statements, found {token:?}"
                    )))
                }
            }
        }
        if stmts.is_empty() {
            return Err(SandboxError::Compile("empty program".to_string()));
        }
        Ok(CalcProgram { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        if let Some(Token::Ident(name)) = self.tokens.get(self.pos) {
            if let Some(Token::Assign) = self.tokens.get(self.pos + 1) {
                let name = name.clone();
                self.pos += 2;
                return Ok(Stmt::Assign(name, self.parse_expr()?));
            }
        }
        Ok(Stmt::Expr(self.parse_expr()?))
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Minus) => Ok(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(Expr::Number(0)),
                rhs: Box::new(self.parse_factor()?),
            }),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        loop {
                            args.push(self.parse_expr()?);
                            match self.peek() {
                                Some(Token::Comma) => {
                                    self.pos += 1;
                                }
                                _ => break,
                            }
                        }
                    }
                    self.expect(Token::RParen, "`)`")?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(token) => Err(SandboxError::Compile(format!("unexpected token {token:?}"))),
            None => Err(SandboxError::Compile("unexpected end of input".to_string())),
        }
    }
}

struct Evaluation<'a> {
    engine: &'a CalcEngine,
    frame: &'a ResolutionFrame<i64>,
    deadline: Option<Instant>,
    time_limit: Option<Duration>,
    break_on_interrupt: bool,
    unit: &'a str,
}

impl Evaluation<'_> {
    fn run(&self, program: &CalcProgram) -> Result<i64> {
        let mut last = 0;
        for stmt in &program.stmts {
            self.check_limits()?;
            last = match stmt {
                Stmt::Assign(name, expr) => {
                    let value = self.eval(expr)?;
                    self.frame.assign(name.clone(), value);
                    value
                }
                Stmt::Expr(expr) => self.eval(expr)?,
            };
        }
        Ok(last)
    }

    fn check_limits(&self) -> Result<()> {
        if self.break_on_interrupt && self.engine.interrupt.load(Ordering::SeqCst) {
            return Err(SandboxError::Interrupted);
        }
        if let (Some(deadline), Some(limit)) = (self.deadline, self.time_limit) {
            if Instant::now() >= deadline {
                return Err(SandboxError::Timeout(limit));
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<i64> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Var(name) => self
                .frame
                .lookup(name)
                .ok_or_else(|| self.fault(format!("undefined variable `{name}`"))),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                match op {
                    BinOp::Add => lhs
                        .checked_add(rhs)
                        .ok_or_else(|| self.fault("integer overflow".to_string())),
                    BinOp::Sub => lhs
                        .checked_sub(rhs)
                        .ok_or_else(|| self.fault("integer overflow".to_string())),
                    BinOp::Mul => lhs
                        .checked_mul(rhs)
                        .ok_or_else(|| self.fault("integer overflow".to_string())),
                    BinOp::Div => {
                        if rhs == 0 {
                            Err(self.fault("division by zero".to_string()))
                        } else {
                            lhs.checked_div(rhs)
                                .ok_or_else(|| self.fault("integer overflow".to_string()))
                        }
                    }
                }
            }
            Expr::Call { name, args } => match name.as_str() {
                "spin" => self.builtin_spin(args),
                "call" => self.builtin_call(args),
                other => Err(self.fault(format!("unknown function `{other}`"))),
            },
        }
    }

    /// Busy-wait for the given number of milliseconds, checking the deadline
    /// and interrupt flag throughout.
    fn builtin_spin(&self, args: &[Expr]) -> Result<i64> {
        let [arg] = args else {
            return Err(self.fault("spin() expects exactly one argument".to_string()));
        };
        let ms = self.eval(arg)?;
        let until = Instant::now() + Duration::from_millis(ms.max(0) as u64);
        while Instant::now() < until {
            self.check_limits()?;
            std::thread::yield_now();
        }
        Ok(0)
    }

    /// Invoke a registered host function by name.
    fn builtin_call(&self, args: &[Expr]) -> Result<i64> {
        let [Expr::Var(fn_name)] = args else {
            return Err(self.fault("call() expects a host function name".to_string()));
        };
        let host_fn = {
            let host_fns = self.engine.host_fns.read().unwrap();
            host_fns.get(fn_name).cloned()
        };
        // The table lock is released before invoking: host functions may
        // re-enter the sandbox.
        let host_fn =
            host_fn.ok_or_else(|| self.fault(format!("unknown host function `{fn_name}`")))?;
        host_fn().map_err(SandboxError::Host)
    }

    fn fault(&self, message: String) -> SandboxError {
        SandboxError::Execution {
            unit: self.unit.to_string(),
            message,
        }
    }
}
