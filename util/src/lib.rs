use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use anyhow::{Context, Result};
use miette::{GraphicalReportHandler, GraphicalTheme};
use nom::{
    character::complete::digit1,
    combinator::map_res,
    error::{FromExternalError, ParseError},
    IResult,
};
use nom_locate::LocatedSpan;
use nom_supreme::{
    error::{ErrorTree, GenericErrorTree, StackContext},
    final_parser::final_parser,
};

// Thanks to FasterThanLime! https://fasterthanli.me/series/advent-of-code-2022/part-11

pub type Span<'a> = LocatedSpan<&'a str>;

/// Result of a line parser built on [`Span`].
pub type ParseResult<'a, T> = IResult<Span<'a>, T, ErrorTree<Span<'a>>>;

#[derive(thiserror::Error, Debug, miette::Diagnostic)]
#[error("bad input")]
struct BadInput<'a> {
    #[source_code]
    src: &'a str,

    #[label("{kind}")]
    bad_bit: miette::SourceSpan,

    kind: String,
}

/// A line rejected by [`parse_nice`], with a rendered diagnostic pointing at the
/// offending column.
#[derive(thiserror::Error, Debug)]
#[error("{report}")]
pub struct LineParseError {
    pub line: String,
    pub offset: usize,
    pub kind: String,
    report: String,
}

impl LineParseError {
    fn new(line: &str, offset: usize, kind: String) -> Self {
        let report = if line.is_empty() {
            format!("bad input: {kind} (empty line)")
        } else {
            let err = BadInput {
                src: line,
                bad_bit: miette::SourceSpan::new(offset.into(), 0.into()),
                kind: kind.clone(),
            };
            let mut s = String::new();
            match GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
                .render_report(&mut s, &err)
            {
                Ok(()) => s,
                Err(_) => format!("bad input: {kind} at offset {offset} in {line:?}"),
            }
        };

        Self {
            line: line.to_string(),
            offset,
            kind,
            report,
        }
    }
}

pub fn parse_unsigned<'a, E>(i: Span<'a>) -> IResult<Span<'a>, u64, E>
where
    E: ParseError<Span<'a>> + FromExternalError<Span<'a>, std::num::ParseIntError>,
{
    map_res(digit1, |i: Span<'a>| i.fragment().parse::<u64>())(i)
}

struct Failure {
    offset: usize,
    kind: String,
    context: Option<&'static str>,
}

impl Failure {
    fn label(self) -> String {
        match self.context {
            Some(context) => format!("{} in {context}", self.kind),
            None => self.kind,
        }
    }
}

// Alt branches are reported by whichever got furthest into the line. On a tie
// a failure inside a named context wins, then the earliest branch.
fn furthest_failure(e: ErrorTree<Span>) -> Option<Failure> {
    match e {
        GenericErrorTree::Base { location, kind } => Some(Failure {
            offset: location.location_offset(),
            kind: kind.to_string(),
            context: None,
        }),
        GenericErrorTree::Stack { base, contexts } => {
            let mut failure = furthest_failure(*base)?;
            if failure.context.is_none() {
                failure.context = contexts.iter().find_map(|(_, c)| match c {
                    StackContext::Context(name) => Some(*name),
                    StackContext::Kind(_) => None,
                });
            }
            Some(failure)
        }
        GenericErrorTree::Alt(alternatives) => alternatives
            .into_iter()
            .filter_map(furthest_failure)
            .reduce(|best, next| {
                if (next.offset, next.context.is_some()) > (best.offset, best.context.is_some()) {
                    next
                } else {
                    best
                }
            }),
    }
}

pub fn parse_nice<'a, T, F>(l: &'a str, parse_fun: F) -> Result<T, LineParseError>
where
    F: FnMut(Span<'a>) -> ParseResult<'a, T>,
{
    let line_span = Span::new(l);
    let line: Result<_, ErrorTree<Span>> = final_parser(parse_fun)(line_span);
    line.map_err(|e| match furthest_failure(e) {
        Some(failure) => LineParseError::new(l, failure.offset, failure.label()),
        None => LineParseError::new(l, 0, "unrecognized line".to_string()),
    })
}

/// Reads the whole input, from `path` when given and from stdin otherwise.
pub fn read_input_as_string(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Unable to read input file {}", path.display())),
        None => {
            let mut input = String::new();
            io::stdin()
                .lock()
                .read_to_string(&mut input)
                .context("Unable to read input from stdin")?;
            Ok(input)
        }
    }
}
