// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL (Read-Eval-Print Loop) for scope scripts.

use crate::script::{Interpreter, ScriptError};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::path::PathBuf;
use varscope_core::ScopeConfig;

/// REPL configuration constants
const HISTORY_FILE: &str = ".varscope_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// Statement keywords
const KEYWORDS: &[&str] = &["scope", "default", "with", "get", "partitioned", "op", "print"];

/// Flags and setting names
const SETTINGS: &[&str] = &[
    "local",
    "pure",
    "freeze",
    "reuse=",
    "dtype=",
    "shape=",
    "init=",
    "l1=",
    "l2=",
    "shards=",
    "max_shards=",
    "device=",
    "trainable=",
    "collection=",
];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Vars,
    Reset,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let parts: Vec<&str> = rest.splitn(2, char::is_whitespace).collect();
        let cmd = parts.first()?.to_lowercase();
        let arg = parts.get(1).copied();

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "vars" | "variables" => Some((ReplCommand::Vars, arg)),
            "reset" => Some((ReplCommand::Reset, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Load and execute a scope script"),
            (".vars [collection]", "List variables, optionally of one collection"),
            (".reset", "Drop all variables and scopes"),
        ]
    }
}

/// Helper struct for rustyline that provides completion, hints, and validation
struct ScopeHelper {
    /// Keywords, settings and commands for completion
    words: Vec<String>,
}

impl ScopeHelper {
    fn new() -> Self {
        let words = KEYWORDS
            .iter()
            .chain(SETTINGS)
            .copied()
            .map(String::from)
            .chain(
                ReplCommand::all_commands()
                    .iter()
                    .filter_map(|(cmd, _)| cmd.split_whitespace().next())
                    .map(String::from),
            )
            .collect();

        Self { words }
    }
}

/// Start of the word ending at the end of `line`.
fn word_start(line: &str) -> usize {
    line.rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl Completer for ScopeHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(&line[..pos]);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches: Vec<Pair> = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for ScopeHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| w[word.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for ScopeHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim_start().starts_with('.') {
            return Cow::Owned(line.magenta().to_string());
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut word = String::new();

        for c in line.chars() {
            if c == '{' || c == '}' || c == ';' || c.is_whitespace() || c == '#' {
                if !word.is_empty() {
                    result.push_str(&highlight_word(&word));
                    word.clear();
                }
                let colored = match c {
                    '{' | '}' => c.to_string().yellow().to_string(),
                    ';' => c.to_string().dimmed().to_string(),
                    _ => c.to_string(),
                };
                result.push_str(&colored);
            } else {
                word.push(c);
            }
        }

        if !word.is_empty() {
            result.push_str(&highlight_word(&word));
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        return word.magenta().bold().to_string();
    }
    if let Some((key, value)) = word.split_once('=') {
        return format!("{}{}{}", key.cyan(), "=".dimmed(), highlight_value(value));
    }
    if SETTINGS.contains(&word) {
        return word.cyan().to_string();
    }
    word.to_string()
}

fn highlight_value(value: &str) -> String {
    if value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '?' | ':' | '-'))
    {
        value.yellow().to_string()
    } else {
        value.green().to_string()
    }
}

impl Validator for ScopeHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();

        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        if input.trim_end().ends_with('\\') {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

/// Check if every `{` is closed, ignoring comments
fn is_balanced(input: &str) -> bool {
    let mut depth: usize = 0;

    for line in input.lines() {
        let code = line.split('#').next().unwrap_or("");
        for c in code.chars() {
            match c {
                '{' => depth += 1,
                '}' => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return true, // Unbalanced but we should let the parser handle the error
                },
                _ => {}
            }
        }
    }

    depth == 0
}

impl Helper for ScopeHelper {}

/// The interactive REPL for scope scripts
pub struct Repl {
    config: ScopeConfig,
    interpreter: Interpreter,
    editor: Editor<ScopeHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(config: ScopeConfig) -> rustyline::Result<Self> {
        let editor_config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(editor_config)?;
        editor.set_helper(Some(ScopeHelper::new()));

        // Determine history file path
        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("varscope")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let _ = editor.load_history(&history_path);

        Ok(Self {
            interpreter: Interpreter::new(&config),
            config,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "varscope>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();

                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    if trimmed.starts_with('.') {
                        eprintln!(
                            "{}: unknown command '{}'",
                            "Error".red().bold(),
                            trimmed.cyan()
                        );
                        continue;
                    }

                    self.eval_and_print(&line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        let version = env!("CARGO_PKG_VERSION");
        println!();
        println!(
            "  {} {} {}",
            "varscope".bright_cyan().bold(),
            "v".dimmed(),
            version.bright_yellow()
        );
        println!("  {}", "Hierarchical variable scopes".dimmed());
        println!();
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => {
                self.print_help();
                CommandResult::Continue
            }
            ReplCommand::Exit => CommandResult::Exit,
            ReplCommand::Clear => {
                print!("\x1B[2J\x1B[H");
                CommandResult::Continue
            }
            ReplCommand::Version => {
                println!();
                println!(
                    "{}: {}",
                    "varscope".bright_cyan().bold(),
                    env!("CARGO_PKG_VERSION").yellow()
                );
                println!();
                CommandResult::Continue
            }
            ReplCommand::Load => {
                if let Some(path) = arg {
                    self.load_file(path);
                } else {
                    eprintln!(
                        "{}: {} {}",
                        "Error".red().bold(),
                        ".load".cyan(),
                        "requires a file path".dimmed()
                    );
                }
                CommandResult::Continue
            }
            ReplCommand::Vars => {
                self.print_variables(arg.map(str::trim));
                CommandResult::Continue
            }
            ReplCommand::Reset => {
                self.interpreter = Interpreter::new(&self.config);
                println!("{}", "All variables and scopes dropped".dimmed());
                CommandResult::Continue
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();

        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:20} {}", cmd.cyan(), desc.dimmed());
        }

        println!();
        println!("{}", "Statements:".white().bold());
        println!();
        for (usage, desc) in [
            ("scope [default] NAME .. { }", "Enter a scope"),
            ("with PATH .. { }", "Re-enter a scope entered earlier"),
            ("get NAME .. [local]", "Resolve a variable"),
            ("partitioned NAME ..", "Resolve a partitioned variable"),
            ("op NAME", "Allocate an op name"),
            ("print", "Describe the current scope"),
        ] {
            println!("  {:30} {}", usage.magenta(), desc.dimmed());
        }

        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!();
        println!(
            "  {:20} {}",
            "Ctrl+C".yellow(),
            "Cancel current input".dimmed()
        );
        println!("  {:20} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:20} {}", "Tab".yellow(), "Autocomplete".dimmed());
        println!();
    }

    fn print_variables(&self, collection: Option<&str>) {
        let store = self.interpreter.store();
        let variables = match collection {
            Some(collection) if !collection.is_empty() => store.collection(collection),
            _ => store
                .names()
                .iter()
                .filter_map(|name| store.variable(name))
                .collect(),
        };

        if variables.is_empty() {
            println!("{}", "(no variables)".dimmed());
            return;
        }
        for variable in variables {
            println!("{}", format_line(&variable.to_string()));
        }
    }

    fn load_file(&mut self, path: &str) {
        match std::fs::read_to_string(path.trim()) {
            Ok(source) => self.eval_and_print(&source),
            Err(e) => print_error(&ScriptError::from(e)),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        let mut output = Vec::new();
        let result = self.interpreter.eval_into(input, &mut output);
        for line in &output {
            println!("{}", format_line(line));
        }
        if let Err(e) = result {
            print_error(&e);
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Color the leading name of an output line
pub fn format_line(line: &str) -> String {
    let indent = line.len() - line.trim_start().len();
    let (head, rest) = line[indent..]
        .split_once(' ')
        .unwrap_or((&line[indent..], ""));
    format!(
        "{}{} {}",
        &line[..indent],
        head.bright_white().bold(),
        rest.dimmed()
    )
}

/// Print a formatted error message
pub fn print_error(error: &ScriptError) {
    let error_str = error.to_string();

    // Split error type from message
    if let Some(colon_pos) = error_str.find(':') {
        let (error_type, message) = error_str.split_at(colon_pos);
        eprintln!("{}{}", error_type.red().bold(), message);
    } else {
        eprintln!("{}", error_str.red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert!(matches!(
            ReplCommand::parse(".help"),
            Some((ReplCommand::Help, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".exit"),
            Some((ReplCommand::Exit, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".load model.scope"),
            Some((ReplCommand::Load, Some("model.scope")))
        ));
        assert!(matches!(
            ReplCommand::parse(".vars local_variables"),
            Some((ReplCommand::Vars, Some("local_variables")))
        ));
        assert!(ReplCommand::parse("scope a { }").is_none());
        assert!(ReplCommand::parse(".bogus").is_none());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("scope a { get w }"));
        assert!(is_balanced("get w # { not code"));
        assert!(!is_balanced("scope a {"));
        assert!(!is_balanced("scope a { scope b { }"));
        assert!(is_balanced("get w }"));
    }

    #[test]
    fn test_completion_words() {
        let helper = ScopeHelper::new();
        assert!(helper.words.iter().any(|w| w == "partitioned"));
        assert!(helper.words.iter().any(|w| w == "shape="));
        assert!(helper.words.iter().any(|w| w == ".load"));
    }
}
