// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL (Read-Eval-Print Loop) for tern.
//!
//! Every entry is compiled as its own program; host bindings are the only
//! state shared between entries.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use tern_engine::{Engine, EngineConfig, Error, Value};

const HISTORY_FILE: &str = ".tern_history";
const MAX_HISTORY_SIZE: usize = 1000;

const KEYWORDS: &[&str] = &[
    "break", "const", "else", "for", "function", "if", "let", "return", "var", "while",
];

const LITERALS: &[&str] = &["true", "false", "null"];

const TYPES: &[&str] = &[
    "int", "integer", "float", "double", "number", "string", "str", "bool", "boolean", "any",
    "array", "list", "object", "set",
];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Disassemble,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let (cmd, arg) = match rest.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        let command = match cmd.to_lowercase().as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "version" | "v" => ReplCommand::Version,
            "load" | "l" => ReplCommand::Load,
            "dis" | "disassemble" => ReplCommand::Disassemble,
            _ => return None,
        };
        Some((command, arg))
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Load and execute a script file"),
            (".dis <code>", "Show the bytecode compiled for <code>"),
        ]
    }
}

/// Completion, hints, highlighting and multi-line validation for rustyline.
struct TernHelper {
    /// Keywords, type names, host names and REPL commands
    words: Vec<String>,
}

impl TernHelper {
    fn new(engine: &Engine) -> Self {
        let mut words: Vec<String> = KEYWORDS
            .iter()
            .chain(LITERALS)
            .chain(TYPES)
            .map(|word| word.to_string())
            .collect();
        words.extend(engine.environment().names().map(String::from));
        words.extend(["math.pi", "math.sqrt", "math.max", "math.min"].map(String::from));
        words.extend(
            ReplCommand::all_commands()
                .iter()
                .filter_map(|(cmd, _)| cmd.split_whitespace().next())
                .map(String::from),
        );
        words.sort();
        words.dedup();
        Self { words }
    }

    fn matches<'a>(&'a self, word: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.words
            .iter()
            .filter(move |candidate| candidate.starts_with(word) && candidate.len() > word.len())
    }
}

/// Byte offset where the word ending at `pos` starts.
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '$' && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl Completer for TernHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[word_start(line, pos)..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .matches(word)
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate[word.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for TernHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }
        let word = &line[word_start(line, pos)..];
        if word.len() < 2 {
            return None;
        }
        self.matches(word)
            .next()
            .map(|candidate| (&candidate[word.len()..]).dimmed().to_string())
    }
}

impl Highlighter for TernHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut current_word = String::new();

        for c in line.chars() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                current_word.push(c);
                continue;
            }
            if !current_word.is_empty() {
                result.push_str(&highlight_word(&current_word));
                current_word.clear();
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' | '#' => c.yellow().to_string(),
                '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '?' => {
                    c.cyan().to_string()
                }
                '"' | '\'' | '`' => c.green().to_string(),
                '.' if line.starts_with('.') => c.magenta().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }

        if !current_word.is_empty() {
            result.push_str(&highlight_word(&current_word));
        }
        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if LITERALS.contains(&word) {
        word.blue().to_string()
    } else if TYPES.contains(&word) {
        word.cyan().to_string()
    } else if word.starts_with(|c: char| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for TernHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        if input.trim_start().starts_with('.') {
            return Ok(ValidationResult::Valid(None));
        }
        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        let trimmed = input.trim_end();
        let dangling = ['\\', '+', '-', '*', '/', '%', '=', ',', '&', '|', '?', ':'];
        let postfix = trimmed.ends_with("++") || trimmed.ends_with("--");
        if trimmed.ends_with(dangling) && !postfix {
            return Ok(ValidationResult::Incomplete);
        }
        Ok(ValidationResult::Valid(None))
    }
}

/// Whether every bracket opened outside a string or comment is closed.
///
/// A stray closer counts as balanced so the parser can report it.
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = None;
    let mut escape_next = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string.is_some() {
            escape_next = true;
            continue;
        }

        match in_string {
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' | '`' => in_string = Some(c),
                '/' if chars.peek() == Some(&'/') => {
                    // Line comment runs to the newline
                    for next in chars.by_ref() {
                        if next == '\n' {
                            break;
                        }
                    }
                }
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                ')' | ']' | '}' => {
                    if stack.pop() != Some(c) {
                        return true;
                    }
                }
                _ => {}
            },
        }
    }

    stack.is_empty() && in_string.is_none()
}

impl Helper for TernHelper {}

/// The interactive REPL
pub struct Repl {
    engine: Engine,
    editor: Editor<TernHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance running programs under `config`
    pub fn new(config: EngineConfig) -> rustyline::Result<Self> {
        let editor_config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let engine = Engine::with_config(config);
        let mut editor = Editor::with_config(editor_config)?;
        editor.set_helper(Some(TernHelper::new(&engine)));

        let history_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(HISTORY_FILE);
        if let Err(err) = editor.load_history(&history_path) {
            tracing::debug!("no history loaded from {}: {}", history_path.display(), err);
        }

        Ok(Self {
            engine,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "tern>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if trimmed.starts_with('.') {
                        match ReplCommand::parse(trimmed) {
                            Some((cmd, arg)) => match self.execute_command(cmd, arg) {
                                CommandResult::Continue => continue,
                                CommandResult::Exit => break,
                            },
                            None => {
                                eprintln!(
                                    "{}: unknown command '{}', try {}",
                                    "Error".red().bold(),
                                    trimmed.cyan(),
                                    ".help".cyan()
                                );
                                continue;
                            }
                        }
                    }

                    self.eval_and_print(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
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

        if let Err(err) = self.editor.save_history(&self.history_path) {
            tracing::warn!("failed to save history to {}: {}", self.history_path.display(), err);
        }
        println!();
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {}{}",
            "tern".bright_cyan().bold(),
            "v".dimmed(),
            env!("CARGO_PKG_VERSION").bright_yellow()
        );
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
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!("{} {}", "tern".bright_cyan().bold(), env!("CARGO_PKG_VERSION").yellow());
            }
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(Path::new(path)),
                None => missing_argument(".load", "a file path"),
            },
            ReplCommand::Disassemble => match arg {
                Some(code) => match self.engine.compile(code) {
                    Ok(program) => print!("{}", program.dimmed()),
                    Err(e) => print_error(&e),
                },
                None => missing_argument(".dis", "some code"),
            },
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();
        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }
        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!();
        println!("  {:16} {}", "Ctrl+C".yellow(), "Cancel current input".dimmed());
        println!("  {:16} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:16} {}", "Tab".yellow(), "Autocomplete".dimmed());
        println!();
    }

    fn load_file(&mut self, path: &Path) {
        match self.engine.eval_file(path) {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&e),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        match self.engine.eval(input) {
            Ok(value) => println!("{}", format_value(&value)),
            Err(e) => print_error(&e),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

fn missing_argument(command: &str, what: &str) {
    eprintln!(
        "{}: {} {}",
        "Error".red().bold(),
        command.cyan(),
        format!("requires {}", what).dimmed()
    );
}

/// Format a value for display with syntax coloring
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".blue().dimmed().to_string(),
        Value::Boolean(b) => b.yellow().to_string(),
        Value::Int(n) => n.yellow().to_string(),
        Value::Float(n) => n.yellow().to_string(),
        Value::String(s) => format!("{:?}", s).green().to_string(),
        Value::Function(_) | Value::Native(_) => value.magenta().to_string(),
        Value::List(_) | Value::Object(_) | Value::Set(_) => value.cyan().to_string(),
    }
}

/// Print an error with its kind highlighted
pub(crate) fn print_error(error: &Error) {
    let error_str = error.to_string();
    match error_str.split_once(':') {
        Some((kind, message)) => eprintln!("{}:{}", kind.red().bold(), message),
        None => eprintln!("{}", error_str.red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert_eq!(ReplCommand::parse(".help"), Some((ReplCommand::Help, None)));
        assert_eq!(ReplCommand::parse(".exit"), Some((ReplCommand::Exit, None)));
        assert_eq!(
            ReplCommand::parse(".load test.tern"),
            Some((ReplCommand::Load, Some("test.tern")))
        );
        assert_eq!(
            ReplCommand::parse(".dis let x = 1;"),
            Some((ReplCommand::Disassemble, Some("let x = 1;")))
        );
        assert_eq!(ReplCommand::parse(".load   "), Some((ReplCommand::Load, None)));
        assert!(ReplCommand::parse("not a command").is_none());
        assert!(ReplCommand::parse(".bogus").is_none());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("(1 + 2)"));
        assert!(is_balanced("let p = { a: 1 };"));
        assert!(is_balanced("function f() { return 1; }"));
        assert!(!is_balanced("(1 + 2"));
        assert!(!is_balanced("while (true) {"));
        assert!(!is_balanced("#{1, 2"));
        assert!(is_balanced("'string with (unbalanced'"));
        assert!(is_balanced("1; // comment with {"));
    }

    #[test]
    fn test_word_start() {
        assert_eq!(word_start("let x = ma", 10), 8);
        assert_eq!(word_start("math.sq", 7), 0);
        assert_eq!(word_start("", 0), 0);
    }

    #[test]
    fn test_helper_knows_builtins() {
        let helper = TernHelper::new(&Engine::new());
        assert!(helper.words.iter().any(|w| w == "print"));
        assert!(helper.words.iter().any(|w| w == ".dis"));
        assert_eq!(helper.matches("whi").next().map(String::as_str), Some("while"));
    }
}
