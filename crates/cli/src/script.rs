//! Line-oriented sheet scripts.
//!
//! ```text
//! # comment
//! set A1 =B1*2
//! set B1 21
//! get A1
//! clear B1
//! print values
//! size
//! ```
//!
//! Each line is applied independently. A rejected line is reported with its
//! line number and the run goes on with the next one.

use std::fmt;
use std::io::{self, BufRead, Write};

use log::{debug, info};

use gridcalc_engine::{Position, Sheet, SheetError};

use crate::config::{OutputConfig, Show};
use crate::render::Printer;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { pos: Position, text: String },
    Clear(Position),
    Get(Position),
    Print(Show),
    Size,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptErrorKind {
    /// The line is not a valid command.
    Syntax(String),
    /// The sheet rejected the command.
    Sheet(SheetError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub line: usize,
    pub kind: ScriptErrorKind,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ScriptErrorKind::Syntax(msg) => write!(f, "line {}: {}", self.line, msg),
            ScriptErrorKind::Sheet(err) => write!(f, "line {}: {}", self.line, err),
        }
    }
}

impl std::error::Error for ScriptError {}

fn parse_position(token: &str) -> Result<Position, String> {
    token
        .parse()
        .map_err(|_| format!("invalid cell reference '{}'", token))
}

fn single_position(keyword: &str, args: &str) -> Result<Position, String> {
    let mut tokens = args.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(token), None) => parse_position(token),
        _ => Err(format!("usage: {} <cell>", keyword)),
    }
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
///
/// For `set`, everything after the single separator following the cell
/// reference is the cell text, kept verbatim (including leading spaces).
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (keyword, args) = trimmed
        .split_once(char::is_whitespace)
        .unwrap_or((trimmed, ""));

    let command = match keyword {
        "set" => {
            let args = args.trim_start();
            let (cell, text) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
            if cell.is_empty() {
                return Err("usage: set <cell> <text>".to_string());
            }
            Command::Set {
                pos: parse_position(cell)?,
                text: text.to_string(),
            }
        }
        "clear" => Command::Clear(single_position(keyword, args)?),
        "get" => Command::Get(single_position(keyword, args)?),
        "print" => match args.trim() {
            "values" => Command::Print(Show::Values),
            "texts" => Command::Print(Show::Texts),
            "both" => Command::Print(Show::Both),
            other => {
                return Err(format!(
                    "print expects 'values', 'texts' or 'both', got '{}'",
                    other
                ))
            }
        },
        "size" if args.trim().is_empty() => Command::Size,
        "size" => return Err("usage: size".to_string()),
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(command))
}

/// Applies script commands to a sheet it owns.
pub struct Interpreter<'a> {
    sheet: Sheet,
    printer: Printer<'a>,
}

/// What happened over one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub commands: usize,
    pub failures: Vec<ScriptError>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<'a> Interpreter<'a> {
    pub fn new(output: &'a OutputConfig) -> Self {
        Self {
            sheet: Sheet::new(),
            printer: Printer::new(output),
        }
    }

    /// Apply one command. Output goes to `out`; sheet rejections come back as errors.
    pub fn execute<W: Write>(
        &mut self,
        command: &Command,
        out: &mut W,
    ) -> io::Result<Result<(), SheetError>> {
        match command {
            Command::Set { pos, text } => Ok(self.sheet.set_cell(*pos, text)),
            Command::Clear(pos) => Ok(self.sheet.clear_cell(*pos)),
            Command::Get(pos) => {
                let value = match self.sheet.value(*pos) {
                    Ok(value) => value,
                    Err(e) => return Ok(Err(e)),
                };
                let text = match self.sheet.text(*pos) {
                    Ok(text) => text,
                    Err(e) => return Ok(Err(e)),
                };
                self.printer.cell(*pos, &value, &text, out)?;
                Ok(Ok(()))
            }
            Command::Print(show) => {
                self.printer.sheet(&self.sheet, *show, out)?;
                Ok(Ok(()))
            }
            Command::Size => {
                self.printer.size(&self.sheet, out)?;
                Ok(Ok(()))
            }
        }
    }

    /// Run every line of `input`. Failing lines are written to `errors` as
    /// they happen and collected in the summary. Only I/O failures abort.
    pub fn run<R, W, E>(&mut self, input: R, out: &mut W, errors: &mut E) -> io::Result<RunSummary>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        let mut summary = RunSummary::default();

        for (index, line) in input.lines().enumerate() {
            let line = line?;
            let line_no = index + 1;

            let failure = match parse_line(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => {
                    summary.commands += 1;
                    debug!("line {}: {:?}", line_no, command);
                    self.execute(&command, out)?.err().map(ScriptErrorKind::Sheet)
                }
                Err(msg) => Some(ScriptErrorKind::Syntax(msg)),
            };

            if let Some(kind) = failure {
                let err = ScriptError {
                    line: line_no,
                    kind,
                };
                writeln!(errors, "error: {}", err)?;
                summary.failures.push(err);
            }
        }

        info!(
            "script finished: {} commands, {} failed",
            summary.commands,
            summary.failures.len()
        );
        Ok(summary)
    }
}

/// The demo sheet shown by `gridcalc example`.
pub fn example_sheet() -> Result<Sheet, SheetError> {
    const CELLS: [(&str, &str); 8] = [
        ("A1", "=(1+2)*3"),
        ("B1", "=1+(2*3)"),
        ("A2", "some"),
        ("B2", "text"),
        ("C2", "here"),
        ("C3", "'and'"),
        ("D3", "'here"),
        ("B5", "=1/0"),
    ];

    let mut sheet = Sheet::new();
    for (cell, text) in CELLS {
        sheet.set_cell(cell.parse()?, text)?;
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use gridcalc_engine::{Size, Value};

    fn pos(a1: &str) -> Position {
        Position::from_a1(a1)
    }

    fn run_script(config: &OutputConfig, script: &str) -> (String, String, RunSummary) {
        let mut interpreter = Interpreter::new(config);
        let mut out = Vec::new();
        let mut errors = Vec::new();
        let summary = interpreter
            .run(script.as_bytes(), &mut out, &mut errors)
            .unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(errors).unwrap(),
            summary,
        )
    }

    #[test]
    fn test_parse_set_keeps_text_verbatim() {
        assert_eq!(
            parse_line("set A1  hello world ").unwrap(),
            Some(Command::Set {
                pos: pos("A1"),
                text: " hello world ".to_string()
            })
        );
    }

    #[test]
    fn test_parse_set_without_text_is_empty() {
        assert_eq!(
            parse_line("set B2").unwrap(),
            Some(Command::Set {
                pos: pos("B2"),
                text: String::new()
            })
        );
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("  # note").unwrap(), None);
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(parse_line("clear C3").unwrap(), Some(Command::Clear(pos("C3"))));
        assert_eq!(parse_line("get A1\r").unwrap(), Some(Command::Get(pos("A1"))));
        assert_eq!(parse_line("print texts").unwrap(), Some(Command::Print(Show::Texts)));
        assert_eq!(parse_line("size").unwrap(), Some(Command::Size));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("set").is_err());
        assert!(parse_line("set a1 x").is_err());
        assert!(parse_line("clear").is_err());
        assert!(parse_line("get A1 B1").is_err());
        assert!(parse_line("print everything").is_err());
        assert!(parse_line("size A1").is_err());
        assert!(parse_line("delete A1").unwrap_err().contains("unknown command"));
    }

    #[test]
    fn test_run_prints_values() {
        let config = OutputConfig::default();
        let (out, errors, summary) = run_script(
            &config,
            "set A1 =B1*2\nset B1 21\nget A1\nsize\nprint values\n",
        );
        assert!(summary.is_success(), "{}", errors);
        assert_eq!(summary.commands, 5);
        assert_eq!(out, "A1\t42\t=B1*2\n(1, 2)\n(1, 2)\n42\t21\n");
    }

    #[test]
    fn test_run_continues_after_failures() {
        let config = OutputConfig::default();
        let (out, errors, summary) = run_script(
            &config,
            "set A1 =B1\n\nset B1 =A1\nset C1 =1+\nbogus\nget A1\n",
        );

        let lines: Vec<usize> = summary.failures.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(matches!(
            summary.failures[0].kind,
            ScriptErrorKind::Sheet(SheetError::CircularDependency(_))
        ));
        assert!(errors.contains("error: line 3: Circular reference: B1 → A1 → B1"));
        assert!(errors.contains("error: line 5: unknown command 'bogus'"));
        assert_eq!(out, "A1\t0\t=B1\n");
    }

    #[test]
    fn test_run_json_output() {
        let config = OutputConfig {
            format: OutputFormat::Json,
            ..OutputConfig::default()
        };
        let (out, _, summary) = run_script(&config, "set A1 '7\nget A1\nsize\n");
        assert!(summary.is_success());

        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["position"], "A1");
        assert_eq!(lines[0]["value"], "7");
        assert_eq!(lines[0]["text"], "'7");
        assert_eq!(lines[1]["rows"], 1);
    }

    #[test]
    fn test_example_sheet() {
        let sheet = example_sheet().unwrap();
        assert_eq!(sheet.printable_size(), Size::new(5, 4));
        assert_eq!(sheet.value(pos("A1")).unwrap(), Value::Number(9.0));
        assert_eq!(sheet.value(pos("C3")).unwrap(), Value::Text("and'".to_string()));
        assert_eq!(sheet.text(pos("B1")).unwrap(), "=1+2*3");
        assert!(sheet.value(pos("B5")).unwrap().is_error());
    }
}
