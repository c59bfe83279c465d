// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Scope scripts: a small statement language for driving variable scopes.
//!
//! ```text
//! # comments run to the end of the line
//! scope encoder reuse=auto dtype=float64 {
//!     scope default layer { get w shape=4,2 init=glorot; get b shape=2 }
//!     scope default layer freeze { get w shape=2,2 }
//!     partitioned table shape=100,8 shards=4
//! }
//! with encoder/layer reuse=reuse { get w; print }
//! get step shape=1 dtype=int64 local
//! op matmul
//! ```
//!
//! Statements are separated by newlines or `;`. Every statement that
//! resolves something appends one line per result to the output.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;
use varscope_core::{
    DataType, FixedSizePartitioner, Initializer, MemoryStore, MinMaxPartitioner, NameScopeStack,
    NamingContext,
    Regularizer, Reuse, ScopeConfig, ScopeOptions, ScopeStore, Shape, VariableOptions,
    VariableRequest, VariableScope, getter_fn,
};

/// Errors raised while parsing or running a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Malformed script text
    #[error("SyntaxError: {message} (line {line})")]
    Syntax {
        /// What went wrong
        message: String,
        /// 1-based source line
        line: usize,
    },

    /// `with` named a scope that was never entered
    #[error("ReferenceError: no scope named '{0}' has been entered")]
    UnknownScope(String),

    /// Scope or store failure
    #[error(transparent)]
    Scope(#[from] varscope_core::Error),

    /// Script file could not be read
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, ScriptError>;

fn syntax(message: impl Into<String>, line: usize) -> ScriptError {
    ScriptError::Syntax {
        message: message.into(),
        line,
    }
}

// ============================================================================
// Syntax tree
// ============================================================================

/// A `key=value` pair or a bare flag following a statement name.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    /// Setting name
    pub key: String,
    /// Value after `=`, absent for flags
    pub value: Option<String>,
    /// Source line
    pub line: usize,
}

impl Setting {
    fn value(&self) -> Result<&str> {
        self.value
            .as_deref()
            .ok_or_else(|| syntax(format!("'{}' requires a value", self.key), self.line))
    }

    fn parse<T>(&self, what: &str) -> Result<T>
    where
        T: std::str::FromStr,
    {
        let value = self.value()?;
        value
            .parse()
            .map_err(|_| syntax(format!("invalid {} '{}' for '{}'", what, value, self.key), self.line))
    }

    fn is_flag(&self, name: &str) -> bool {
        self.key == name && self.value.is_none()
    }
}

/// One statement of a scope script.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `scope [default] NAME settings { body }`
    Scope {
        /// Scope name, or prefix when `default_name` is set
        name: String,
        /// Allocate a unique name from `name`
        default_name: bool,
        /// Scope overrides
        settings: Vec<Setting>,
        /// Statements run inside the scope
        body: Vec<Statement>,
    },
    /// `with PATH settings { body }`, re-entering a scope entered earlier
    With {
        /// Full name of the scope
        path: String,
        /// Scope overrides
        settings: Vec<Setting>,
        /// Statements run inside the scope
        body: Vec<Statement>,
    },
    /// `get NAME settings`
    Get {
        /// Local variable name
        name: String,
        /// Resolution arguments
        settings: Vec<Setting>,
    },
    /// `partitioned NAME settings`
    Partitioned {
        /// Local variable name
        name: String,
        /// Resolution arguments
        settings: Vec<Setting>,
    },
    /// `op NAME`: allocate an op name in the active naming context
    Op {
        /// Base op name
        name: String,
    },
    /// `print`: describe the current scope
    Print,
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Open,
    Close,
    End,
}

fn tokenize(source: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        let code = text.split('#').next().unwrap_or("");
        let mut word = String::new();
        for c in code.chars() {
            let token = match c {
                '{' => Some(Token::Open),
                '}' => Some(Token::Close),
                ';' => Some(Token::End),
                c if c.is_whitespace() => None,
                c => {
                    word.push(c);
                    continue;
                }
            };
            if !word.is_empty() {
                tokens.push((Token::Word(std::mem::take(&mut word)), line));
            }
            if let Some(token) = token {
                tokens.push((token, line));
            }
        }
        if !word.is_empty() {
            tokens.push((Token::Word(word), line));
        }
        tokens.push((Token::End, line));
    }
    tokens
}

// ============================================================================
// Parser
// ============================================================================

/// Parses a script into statements.
pub fn parse(source: &str) -> Result<Vec<Statement>> {
    let mut parser = Parser {
        tokens: tokenize(source),
        pos: 0,
    };
    parser.block(None)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    /// Parses statements up to the end of input, or up to the `}` closing a
    /// block opened on line `opened`.
    fn block(&mut self, opened: Option<usize>) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            match (self.peek(), opened) {
                (None, None) => return Ok(statements),
                (None, Some(line)) => return Err(syntax("unclosed '{'", line)),
                (Some(Token::End), _) => self.pos += 1,
                (Some(Token::Close), Some(_)) => {
                    self.pos += 1;
                    return Ok(statements);
                }
                (Some(Token::Close), None) => return Err(syntax("unexpected '}'", self.line())),
                (Some(Token::Open), _) => return Err(syntax("unexpected '{'", self.line())),
                (Some(Token::Word(_)), _) => statements.push(self.statement()?),
            }
        }
    }

    fn word(&mut self, what: &str) -> Result<String> {
        match self.tokens.get(self.pos) {
            Some((Token::Word(word), _)) => {
                self.pos += 1;
                Ok(word.clone())
            }
            _ => Err(syntax(format!("expected {}", what), self.line())),
        }
    }

    fn settings(&mut self) -> Vec<Setting> {
        let mut settings = Vec::new();
        while let Some((Token::Word(word), line)) = self.tokens.get(self.pos) {
            let (key, value) = match word.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (word.clone(), None),
            };
            settings.push(Setting {
                key,
                value,
                line: *line,
            });
            self.pos += 1;
        }
        settings
    }

    fn body(&mut self) -> Result<Vec<Statement>> {
        let line = self.line();
        match self.peek() {
            Some(Token::Open) => {
                self.pos += 1;
                self.block(Some(line))
            }
            _ => Err(syntax("expected '{'", line)),
        }
    }

    fn statement(&mut self) -> Result<Statement> {
        let line = self.line();
        let keyword = self.word("a statement")?;
        let statement = match keyword.as_str() {
            "scope" => {
                let mut name = self.word("a scope name")?;
                let mut default_name = false;
                if name == "default" {
                    if let Some(Token::Word(next)) = self.peek() {
                        if !next.contains('=') {
                            name = next.clone();
                            default_name = true;
                            self.pos += 1;
                        }
                    }
                }
                let settings = self.settings();
                let body = self.body()?;
                Statement::Scope {
                    name,
                    default_name,
                    settings,
                    body,
                }
            }
            "with" => {
                let path = self.word("a scope path")?;
                let settings = self.settings();
                let body = self.body()?;
                Statement::With {
                    path,
                    settings,
                    body,
                }
            }
            "get" => Statement::Get {
                name: self.word("a variable name")?,
                settings: self.settings(),
            },
            "partitioned" => Statement::Partitioned {
                name: self.word("a variable name")?,
                settings: self.settings(),
            },
            "op" => Statement::Op {
                name: self.word("an op name")?,
            },
            "print" => Statement::Print,
            other => return Err(syntax(format!("unknown statement '{}'", other), line)),
        };
        match self.peek() {
            None | Some(Token::End) | Some(Token::Close) => Ok(statement),
            Some(_) => Err(syntax(
                format!("unexpected input after '{}' statement", keyword),
                self.line(),
            )),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

fn parse_shape(setting: &Setting) -> Result<Shape> {
    let value = setting.value()?;
    if value == "scalar" {
        return Ok(Shape::scalar());
    }
    if value == "?" {
        return Ok(Shape::unknown());
    }
    value
        .split(',')
        .map(|dim| match dim.trim() {
            "?" => Ok(-1),
            dim => dim.parse::<i64>().ok().filter(|d| *d >= 0).ok_or_else(|| {
                syntax(format!("invalid dimension '{}' in shape", dim), setting.line)
            }),
        })
        .collect::<Result<Vec<i64>>>()
        .map(Shape::new)
}

fn parse_initializer(setting: &Setting) -> Result<Initializer> {
    let value = setting.value()?;
    let mut parts = value.split(':');
    let kind = parts.next().unwrap_or_default();
    let args: Vec<f64> = parts
        .map(|part| part.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| syntax(format!("invalid initializer '{}'", value), setting.line))?;

    let initializer = match (kind, args.as_slice()) {
        ("zeros", []) => Initializer::Zeros,
        ("ones", []) => Initializer::Ones,
        ("glorot", []) => Initializer::GlorotUniform { seed: None },
        ("const", [value]) => Initializer::Constant { value: *value },
        ("uniform", [min, max]) => Initializer::RandomUniform {
            min: *min,
            max: *max,
            seed: None,
        },
        ("normal", [mean, stddev]) => Initializer::RandomNormal {
            mean: *mean,
            stddev: *stddev,
            seed: None,
        },
        ("truncated", [mean, stddev]) => Initializer::TruncatedNormal {
            mean: *mean,
            stddev: *stddev,
            seed: None,
        },
        _ => return Err(syntax(format!("invalid initializer '{}'", value), setting.line)),
    };
    Ok(initializer)
}

fn unknown_setting(setting: &Setting, statement: &str) -> ScriptError {
    syntax(
        format!("unknown setting '{}' for '{}'", setting.key, statement),
        setting.line,
    )
}

fn scope_options(settings: &[Setting]) -> Result<ScopeOptions> {
    let mut options = ScopeOptions::new();
    for setting in settings {
        options = match setting.key.as_str() {
            "reuse" => options.reuse(setting.parse("reuse mode")?),
            "dtype" => options.data_type(setting.parse::<DataType>("data type")?),
            "init" => options.initializer(parse_initializer(setting)?),
            "l1" => options.regularizer(Regularizer::L1 {
                scale: setting.parse("scale")?,
            }),
            "l2" => options.regularizer(Regularizer::L2 {
                scale: setting.parse("scale")?,
            }),
            "shards" => options.partitioner(FixedSizePartitioner::new(setting.parse("shard count")?)),
            "max_shards" => {
                options.partitioner(MinMaxPartitioner::new(setting.parse("shard count")?))
            }
            "device" => {
                let device = setting.value()?.to_string();
                options.caching_device(move |_: &str| device.clone())
            }
            _ if setting.is_flag("pure") => options.pure_naming(),
            _ if setting.is_flag("freeze") => {
                options.getter(getter_fn(|mut request: VariableRequest, base| {
                    request.trainable = false;
                    base.call(request)
                }))
            }
            _ => return Err(unknown_setting(setting, "scope")),
        };
    }
    Ok(options)
}

fn variable_options(settings: &[Setting], statement: &str) -> Result<VariableOptions> {
    let mut options = VariableOptions::new();
    for setting in settings {
        options = match setting.key.as_str() {
            "shape" => options.shape(parse_shape(setting)?),
            "dtype" => options.data_type(setting.parse::<DataType>("data type")?),
            "init" => options.initializer(parse_initializer(setting)?),
            "l1" => options.regularizer(Regularizer::L1 {
                scale: setting.parse("scale")?,
            }),
            "l2" => options.regularizer(Regularizer::L2 {
                scale: setting.parse("scale")?,
            }),
            "reuse" => options.reuse(setting.parse::<Reuse>("reuse mode")?),
            "trainable" => options.trainable(setting.parse("boolean")?),
            "collection" => options.collection(setting.value()?),
            "shards" if statement == "partitioned" => {
                options.partitioner(FixedSizePartitioner::new(setting.parse("shard count")?))
            }
            "max_shards" if statement == "partitioned" => {
                options.partitioner(MinMaxPartitioner::new(setting.parse("shard count")?))
            }
            _ if statement == "get" && setting.is_flag("local") => options,
            _ => return Err(unknown_setting(setting, statement)),
        };
    }
    Ok(options)
}

// ============================================================================
// Interpreter
// ============================================================================

/// Runs scope scripts against one scope store and one in-memory variable
/// store. Variables persist across calls to [`eval`](Self::eval).
pub struct Interpreter {
    scopes: ScopeStore,
    store: MemoryStore,
    naming: Rc<NameScopeStack>,
    entered: RefCell<FxHashMap<String, VariableScope>>,
}

impl Interpreter {
    /// Creates an interpreter whose root scope follows `config`.
    pub fn new(config: &ScopeConfig) -> Self {
        let naming = Rc::new(NameScopeStack::new());
        let scopes = ScopeStore::with_config(config).with_naming(naming.clone());
        Self {
            scopes,
            store: MemoryStore::new(),
            naming,
            entered: RefCell::new(FxHashMap::default()),
        }
    }

    /// The variable store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Parses and runs `source`, returning the output lines.
    pub fn eval(&self, source: &str) -> Result<Vec<String>> {
        let mut output = Vec::new();
        self.eval_into(source, &mut output)?;
        Ok(output)
    }

    /// Parses and runs `source`, appending output lines to `output` as they
    /// are produced. Lines written before a failure are kept.
    pub fn eval_into(&self, source: &str, output: &mut Vec<String>) -> Result<()> {
        let program = parse(source)?;
        debug!(statements = program.len(), "running scope script");
        self.run(&program, output)
    }

    fn run(&self, statements: &[Statement], output: &mut Vec<String>) -> Result<()> {
        for statement in statements {
            self.execute(statement, output)?;
        }
        Ok(())
    }

    fn execute(&self, statement: &Statement, output: &mut Vec<String>) -> Result<()> {
        match statement {
            Statement::Scope {
                name,
                default_name,
                settings,
                body,
            } => {
                let mut options = scope_options(settings)?;
                if *default_name {
                    options = options.default_name();
                }
                self.scopes.enter(name, options, |scopes| {
                    let current = scopes.current();
                    self.entered
                        .borrow_mut()
                        .insert(current.full_name().to_string(), current);
                    self.run(body, output)
                })
            }
            Statement::With {
                path,
                settings,
                body,
            } => {
                let scope = self
                    .entered
                    .borrow()
                    .get(path)
                    .cloned()
                    .ok_or_else(|| ScriptError::UnknownScope(path.clone()))?;
                let options = scope_options(settings)?;
                self.scopes
                    .enter_with_scope(&scope, options, |_| self.run(body, output))
            }
            Statement::Get { name, settings } => {
                let options = variable_options(settings, "get")?;
                let variable = if settings.iter().any(|s| s.is_flag("local")) {
                    self.scopes.get_local_variable(&self.store, name, options)?
                } else {
                    self.scopes.get_variable(&self.store, name, options)?
                };
                output.push(variable.to_string());
                Ok(())
            }
            Statement::Partitioned { name, settings } => {
                let options = variable_options(settings, "partitioned")?;
                let variable = self
                    .scopes
                    .get_partitioned_variable(&self.store, name, options)?;
                output.push(variable.to_string());
                output.extend(variable.iter().map(|slice| format!("  {}", slice)));
                Ok(())
            }
            Statement::Op { name } => {
                output.push(self.naming.op_name(name));
                Ok(())
            }
            Statement::Print => {
                let current = self.scopes.current();
                let path = match current.full_name() {
                    "" => "<root>",
                    path => path,
                };
                output.push(format!(
                    "scope {} reuse={} naming={}",
                    path,
                    current.reuse(),
                    self.naming.current()
                ));
                Ok(())
            }
        }
    }
}
