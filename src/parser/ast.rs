// ── AST types ──────────────────────────────────────────────────────────────

/// One stage of a pipeline as handed to the launcher.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ParsedCommand {
    /// `argv[0]` is the program name; never empty.
    pub argv: Vec<String>,
    /// `<  file`
    pub input: Option<String>,
    /// `>  file` or `>> file`
    pub output: Option<String>,
    /// Set by `>>`.
    pub append: bool,
}

impl ParsedCommand {
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// A pipeline is one or more commands connected by `|`.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Pipeline {
    pub commands: Vec<ParsedCommand>, // length ≥ 1
    /// Trailing `&`.
    pub background: bool,
}
