use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, IsTerminal, Write};

use crate::domain::models::MissingFileRecord;

pub const ANSWERS_ENV: &str = "FILEBROKE_ANSWERS";

/// Source of operator answers.
pub trait Prompter {
    /// Shows `prompt` and returns the trimmed answer, or `None` once the
    /// operator's input is exhausted.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Line-oriented prompter; prompts go to stderr so stdout stays machine-readable.
pub struct LinePrompter<R> {
    reader: R,
    echo: bool,
}

impl<R: BufRead> LinePrompter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            echo: false,
        }
    }
}

impl LinePrompter<Cursor<Vec<u8>>> {
    /// Canned answers, one per line; each answer is echoed after its prompt.
    pub fn scripted(answers: &str) -> Self {
        Self {
            reader: Cursor::new(answers.as_bytes().to_vec()),
            echo: true,
        }
    }
}

impl<R: BufRead> Prompter for LinePrompter<R> {
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stderr = io::stderr();
        write!(stderr, "{prompt}")?;
        stderr.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            if self.echo {
                writeln!(stderr)?;
            }
            return Ok(None);
        }
        let answer = line.trim().to_string();
        if self.echo {
            writeln!(stderr, "{answer}")?;
        }
        Ok(Some(answer))
    }
}

/// Line editor for an operator at a terminal. rustyline draws its prompt on
/// stdout, so this is only used when stdout is a terminal too.
pub struct EditorPrompter {
    editor: DefaultEditor,
}

impl EditorPrompter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Prompter for EditorPrompter {
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Picks where operator answers come from. Records arriving on stdin leave
/// only the controlling terminal for answers.
pub fn operator_prompter(records_on_stdin: bool) -> Result<Box<dyn Prompter>> {
    if let Ok(answers) = env::var(ANSWERS_ENV) {
        return Ok(Box::new(LinePrompter::scripted(&answers)));
    }

    if !records_on_stdin && io::stdin().is_terminal() && io::stdout().is_terminal() {
        return Ok(Box::new(EditorPrompter::new()?));
    }

    match File::open("/dev/tty") {
        Ok(tty) => Ok(Box::new(LinePrompter::new(BufReader::new(tty)))),
        Err(_) if !records_on_stdin => Ok(Box::new(LinePrompter::new(io::stdin().lock()))),
        Err(e) => {
            tracing::warn!("no terminal for operator input ({e}); prompts will see end of input");
            Ok(Box::new(LinePrompter::new(io::empty())))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Process,
    Skip,
    ProcessAll,
    IgnoreAll,
    Quit,
}

/// Per-record menu. Empty input skips; end of input quits.
pub fn menu_choice(prompter: &mut dyn Prompter, record: &MissingFileRecord) -> Result<MenuChoice> {
    eprintln!("\n[y] process  [n] skip  [a] process ALL  [i] ignore ALL  [q] quit  [p] print record");
    loop {
        let Some(answer) = prompter.ask("Choice (y/n/a/i/q/p): ")? else {
            return Ok(MenuChoice::Quit);
        };
        match answer.to_lowercase().as_str() {
            "y" | "yes" => return Ok(MenuChoice::Process),
            "n" | "no" | "" => return Ok(MenuChoice::Skip),
            "a" => return Ok(MenuChoice::ProcessAll),
            "i" => return Ok(MenuChoice::IgnoreAll),
            "q" => return Ok(MenuChoice::Quit),
            "p" => {
                let json = serde_json::to_string_pretty(record).context("Failed to print record")?;
                eprintln!("{json}");
            }
            other => eprintln!("Unknown choice '{other}'."),
        }
    }
}

/// Yes/no question defaulting to no.
pub fn confirm(prompter: &mut dyn Prompter, question: &str) -> Result<bool> {
    loop {
        let Some(input) = prompter.ask(question)? else {
            return Ok(false);
        };
        let input = input.to_lowercase();

        if input == "y" || input == "yes" {
            return Ok(true);
        } else if input == "n" || input == "no" || input.is_empty() {
            return Ok(false);
        } else {
            eprintln!("Please enter 'y' or 'n'.");
        }
    }
}
