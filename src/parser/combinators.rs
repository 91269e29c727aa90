use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt},
    sequence::{delimited, preceded},
    IResult,
    Parser,
};

use super::ast::{ParsedCommand, Pipeline};

// ── Low-level nom parsers ──────────────────────────────────────────────────

pub fn parse_double_quoted(input: &str) -> IResult<&str, String> {
    let (input, content) = delimited(char('"'), opt(is_not("\"")), char('"')).parse(input)?;
    Ok((input, content.unwrap_or_default().to_string()))
}

pub fn parse_single_quoted(input: &str) -> IResult<&str, String> {
    let (input, content) = delimited(char('\''), opt(is_not("'")), char('\'')).parse(input)?;
    Ok((input, content.unwrap_or_default().to_string()))
}

pub fn parse_unquoted_string(input: &str) -> IResult<&str, String> {
    // Stop at whitespace, quotes, and the pipe / separator / redirect characters
    let (input, content) = is_not(" \t\r\n\"';|&><").parse(input)?;
    Ok((input, content.to_string()))
}

pub fn parse_word(input: &str) -> IResult<&str, String> {
    alt((parse_double_quoted, parse_single_quoted, parse_unquoted_string)).parse(input)
}

// ── Redirect parsing ──────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum RedirectKind {
    Input,
    Truncate,
    Append,
}

/// Parse a single redirect operator (`>>`, `>`, or `<`) followed by a filename.
fn parse_redirect(input: &str) -> IResult<&str, (RedirectKind, String)> {
    let (input, _) = multispace0(input)?;
    let (input, kind) = alt((
        map(tag(">>"), |_| RedirectKind::Append),
        map(char('>'), |_| RedirectKind::Truncate),
        map(char('<'), |_| RedirectKind::Input),
    ))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, file) = parse_word(input)?;
    Ok((input, (kind, file)))
}

// ── Single command (with redirects) ───────────────────────────────────────

pub fn parse_single_command(input: &str) -> IResult<&str, ParsedCommand> {
    let (mut rest, _) = multispace0(input)?;

    let (after_name, name) = parse_word(rest)?;
    rest = after_name;

    let mut cmd = ParsedCommand {
        argv: vec![name],
        ..ParsedCommand::default()
    };

    // Arguments and redirects interleave until a separator, a pipe or the end.
    loop {
        if let Ok((after_redir, (kind, file))) = parse_redirect(rest) {
            match kind {
                RedirectKind::Input => cmd.input = Some(file),
                RedirectKind::Truncate | RedirectKind::Append => {
                    cmd.output = Some(file);
                    cmd.append = kind == RedirectKind::Append;
                }
            }
            rest = after_redir;
            continue;
        }

        if let Ok((after_arg, arg)) = preceded(multispace1, parse_word).parse(rest) {
            cmd.argv.push(arg);
            rest = after_arg;
            continue;
        }

        break;
    }

    let (rest, _) = multispace0(rest)?;

    Ok((rest, cmd))
}

// ── Pipeline expression (cmd | cmd | …) ──────────────────────────────────

/// Parse a pipeline: `command (| command)*`.
pub fn parse_pipeline_expr(input: &str) -> IResult<&str, Pipeline> {
    let (mut rest, first) = parse_single_command(input)?;
    let mut commands = vec![first];

    loop {
        let Some(after_pipe) = rest.trim_start().strip_prefix('|') else {
            break;
        };
        let (after_cmd, cmd) = parse_single_command(after_pipe)?;
        commands.push(cmd);
        rest = after_cmd;
    }

    Ok((
        rest,
        Pipeline {
            commands,
            background: false,
        },
    ))
}

// ── Separator parsing ─────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Separator {
    /// `;`: run the pipeline in the foreground
    Semi,
    /// `&`: run the pipeline in the background
    Amp,
}

/// Parse a pipeline terminator: `;` or `&`.
pub fn parse_separator(input: &str) -> IResult<&str, Separator> {
    let (input, _) = multispace0(input)?;
    alt((
        map(char(';'), |_| Separator::Semi),
        map(char('&'), |_| Separator::Amp),
    ))
    .parse(input)
}
