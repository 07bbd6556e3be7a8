use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{char, space0, space1},
    combinator::{map, value},
    error::context,
    sequence::{delimited, preceded, separated_pair, terminated},
};
use thiserror::Error;
use tracing::{debug, trace};
use util::{parse_nice, parse_unsigned, LineParseError, ParseResult, Span};

use crate::inode::{Inode, InodeId, Tree, TreeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdTarget {
    Root,
    Parent,
    Child(String),
}

impl From<String> for CdTarget {
    fn from(arg: String) -> Self {
        if arg == "/" {
            CdTarget::Root
        } else if arg == ".." {
            CdTarget::Parent
        } else {
            CdTarget::Child(arg)
        }
    }
}

/// One line of a terminal transcript: a command or a line of `ls` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Cd(CdTarget),
    Ls,
    Dir(String),
    File { name: String, size: u64 },
}

fn parse_token(i: Span) -> ParseResult<String> {
    map(take_till1(|c: char| c.is_whitespace()), |s: Span| {
        s.fragment().to_string()
    })(i)
}

fn parse_cd(i: Span) -> ParseResult<Line> {
    map(preceded(terminated(tag("cd"), space1), parse_token), |arg| {
        Line::Cd(arg.into())
    })(i)
}

fn parse_ls(i: Span) -> ParseResult<Line> {
    value(Line::Ls, tag("ls"))(i)
}

fn parse_command(i: Span) -> ParseResult<Line> {
    preceded(terminated(char('$'), space1), alt((parse_cd, parse_ls)))(i)
}

fn parse_listing(i: Span) -> ParseResult<Line> {
    alt((
        map(
            separated_pair(context("file size", parse_unsigned), space1, parse_token),
            |(size, name)| Line::File { name, size },
        ),
        map(preceded(terminated(tag("dir"), space1), parse_token), Line::Dir),
    ))(i)
}

// Listing first: on a tie at the start of the line the size is what's wrong.
fn parse_line(i: Span) -> ParseResult<Line> {
    delimited(space0, alt((parse_listing, parse_command)), space0)(i)
}

impl Line {
    pub fn parse(l: &str) -> Result<Self, LineParseError> {
        parse_nice(l, parse_line)
    }
}

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("Malformed transcript line {line_no}")]
    Malformed {
        line_no: usize,
        #[source]
        source: LineParseError,
    },

    #[error("Inconsistent transcript at line {line_no} ({line:?})")]
    Structure {
        line_no: usize,
        line: String,
        #[source]
        source: TreeError,
    },
}

/// The tree built from a transcript together with the index of every directory
/// by absolute path.
#[derive(Debug, Clone)]
pub struct Filesystem {
    tree: Tree,
    index: BTreeMap<String, InodeId>,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem {
    pub fn new() -> Self {
        let tree = Tree::new();
        let index = BTreeMap::from([("/".to_string(), tree.root())]);
        Self { tree, index }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn dir(&self, path: &str) -> Option<InodeId> {
        self.index.get(path).copied()
    }

    pub fn directories(&self) -> impl Iterator<Item = (&str, InodeId)> + '_ {
        self.index.iter().map(|(path, &id)| (path.as_str(), id))
    }

    pub fn dir_sizes(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.directories()
            .map(|(path, id)| (path, self.tree.size(id)))
    }

    pub fn used_space(&self) -> u64 {
        self.tree.size(self.tree.root())
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[derive(Debug)]
pub struct Interpreter {
    cwd: String,
    fs: Filesystem,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            cwd: "/".to_string(),
            fs: Filesystem::new(),
        }
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    fn current_dir(&self) -> Result<InodeId, TreeError> {
        self.fs
            .dir(&self.cwd)
            .ok_or_else(|| TreeError::UnknownDirectory(self.cwd.clone()))
    }

    fn cd(&mut self, target: CdTarget) -> Result<(), TreeError> {
        match target {
            CdTarget::Root => self.cwd = "/".to_string(),
            CdTarget::Parent => {
                if self.cwd == "/" {
                    return Err(TreeError::CdAboveRoot);
                }
                let slash = self.cwd.rfind('/').unwrap_or(0);
                self.cwd.truncate(slash);
                if self.cwd.is_empty() {
                    self.cwd.push('/');
                }
            }
            CdTarget::Child(name) => {
                if name.contains('/') {
                    return Err(TreeError::InvalidName(name));
                }
                let dir = self.current_dir()?;
                let path = join_path(&self.cwd, &name);

                match self.fs.tree.child(dir, &name) {
                    Some(id) if !self.fs.tree.get(id).is_dir() => {
                        return Err(TreeError::NotADirectory(path));
                    }
                    Some(_) => {}
                    None => {
                        let id = self.fs.tree.insert(dir, Inode::new_dir(name))?;
                        debug!(%path, "created directory");
                        self.fs.index.insert(path.clone(), id);
                    }
                }
                self.cwd = path;
            }
        }

        Ok(())
    }

    pub fn apply(&mut self, line: Line) -> Result<(), TreeError> {
        match line {
            Line::Cd(target) => self.cd(target),
            // Directories only come into existence through `cd`.
            Line::Ls | Line::Dir(_) => Ok(()),
            Line::File { name, size } => {
                let dir = self.current_dir()?;
                self.fs
                    .tree
                    .insert(dir, Inode::new_file(name, size))
                    .map(|_| ())
                    .map_err(|e| match e {
                        TreeError::DuplicateName { name, .. } => TreeError::DuplicateName {
                            dir: self.cwd.clone(),
                            name,
                        },
                        e => e,
                    })
            }
        }
    }

    pub fn finish(self) -> Filesystem {
        self.fs
    }
}

pub fn parse_transcript(
    input: impl Iterator<Item = impl Into<String>>,
) -> Result<Filesystem, TranscriptError> {
    let mut interpreter = Interpreter::new();

    for (i, line) in input.enumerate() {
        let line: String = line.into();
        let line_no = i + 1;

        let parsed =
            Line::parse(&line).map_err(|source| TranscriptError::Malformed { line_no, source })?;
        trace!(line_no, cwd = interpreter.cwd(), ?parsed, "interpreting");

        interpreter
            .apply(parsed)
            .map_err(|source| TranscriptError::Structure {
                line_no,
                line: line.clone(),
                source,
            })?;
    }

    Ok(interpreter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TEST_INPUT: &str = include_str!("../data/test_input");

    fn parse_lines(lines: &[&str]) -> Result<Filesystem, TranscriptError> {
        parse_transcript(lines.iter().copied())
    }

    #[rstest]
    #[case("$ cd /", Line::Cd(CdTarget::Root))]
    #[case("$ cd ..", Line::Cd(CdTarget::Parent))]
    #[case("$ cd a.b", Line::Cd(CdTarget::Child("a.b".to_string())))]
    #[case("$   cd   e  ", Line::Cd(CdTarget::Child("e".to_string())))]
    #[case("$ ls", Line::Ls)]
    #[case("dir d", Line::Dir("d".to_string()))]
    #[case("14848514 b.txt", Line::File { name: "b.txt".to_string(), size: 14848514 })]
    #[case("0 empty", Line::File { name: "empty".to_string(), size: 0 })]
    fn line_parse_ok(#[case] input: &str, #[case] expected: Line) {
        let res = Line::parse(input);
        assert!(res.is_ok());
        assert_eq!(res.unwrap(), expected);
    }

    #[rstest]
    #[case("", 0)]
    #[case("$ cd", 4)]
    #[case("$ cd a b", 7)]
    #[case("$ ls -l", 5)]
    #[case("$ rm a", 2)]
    #[case("b.txt 14848514", 0)]
    #[case("-5 b.txt", 0)]
    #[case("14848514", 8)]
    #[case("1 a b", 4)]
    fn line_parse_malformed(#[case] input: &str, #[case] offset: usize) {
        let res = Line::parse(input);
        assert!(res.is_err());
        assert_eq!(res.unwrap_err().offset, offset);
    }

    #[test]
    fn example_sizes() {
        let fs = parse_transcript(TEST_INPUT.lines()).unwrap();
        let size_of = |path: &str| fs.tree().size(fs.dir(path).unwrap());

        assert_eq!(size_of("/a/e"), 584);
        assert_eq!(size_of("/a"), 94853);
        assert_eq!(size_of("/d"), 24933642);
        assert_eq!(size_of("/"), 48381165);
        assert_eq!(fs.used_space(), 48381165);
    }

    fn walk_dirs(tree: &Tree, id: InodeId, path: String, out: &mut Vec<(String, InodeId)>) {
        if let Inode::Dir { contents, .. } = tree.get(id) {
            for &c in contents {
                walk_dirs(tree, c, join_path(&path, tree.get(c).name()), out);
            }
            out.push((path, id));
        }
    }

    #[test]
    fn index_has_every_directory_once() {
        let fs = parse_transcript(TEST_INPUT.lines()).unwrap();

        let mut reachable = vec![];
        walk_dirs(fs.tree(), fs.tree().root(), "/".to_string(), &mut reachable);
        reachable.sort();

        let indexed = fs
            .directories()
            .map(|(path, id)| (path.to_string(), id))
            .collect::<Vec<_>>();

        assert_eq!(indexed, reachable);
        assert_eq!(
            indexed.iter().map(|(path, _)| path.as_str()).collect::<Vec<_>>(),
            vec!["/", "/a", "/a/e", "/d"]
        );
    }

    #[test]
    fn dir_size_equals_children_sum() {
        let fs = parse_transcript(TEST_INPUT.lines()).unwrap();
        let tree = fs.tree();

        for (path, id) in fs.directories() {
            if let Inode::Dir { contents, .. } = tree.get(id) {
                let children: u64 = contents.iter().map(|&c| tree.size(c)).sum();
                assert_eq!(tree.size(id), children, "size mismatch for {path}");
            } else {
                panic!("{path} is indexed but is not a directory");
            }
        }
    }

    #[test]
    fn only_root_directory() {
        let fs = parse_lines(&["$ cd /", "$ ls", "14848514 b.txt", "8504156 c.dat", "dir d"])
            .unwrap();

        assert_eq!(fs.used_space(), 23352670);
        assert_eq!(fs.directories().count(), 1);
        assert!(!fs.tree().contains(fs.tree().root(), "d"));
    }

    #[test]
    fn repeated_cd_is_idempotent() {
        let fs = parse_lines(&[
            "$ cd /", "$ cd a", "$ ls", "10 x", "$ cd ..", "$ cd a", "$ cd /", "$ cd a",
        ])
        .unwrap();

        assert_eq!(fs.directories().count(), 2);
        assert_eq!(fs.tree().to_string().lines().count(), 3);
        assert_eq!(fs.tree().size(fs.dir("/a").unwrap()), 10);
    }

    #[test]
    fn cd_parent_pops_one_segment() {
        let mut interpreter = Interpreter::new();
        for line in ["$ cd a", "$ cd b", "$ cd c"] {
            interpreter.apply(Line::parse(line).unwrap()).unwrap();
        }
        assert_eq!(interpreter.cwd(), "/a/b/c");

        interpreter.apply(Line::Cd(CdTarget::Parent)).unwrap();
        assert_eq!(interpreter.cwd(), "/a/b");
        interpreter.apply(Line::Cd(CdTarget::Parent)).unwrap();
        interpreter.apply(Line::Cd(CdTarget::Parent)).unwrap();
        assert_eq!(interpreter.cwd(), "/");
    }

    #[test]
    fn cd_above_root() {
        let res = parse_lines(&["$ cd /", "$ cd a", "$ cd ..", "$ cd .."]);

        assert!(matches!(
            res,
            Err(TranscriptError::Structure {
                line_no: 4,
                source: TreeError::CdAboveRoot,
                ..
            })
        ));
    }

    #[test]
    fn cd_into_file() {
        let res = parse_lines(&["$ cd /", "$ ls", "12 a", "$ cd a"]);

        match res {
            Err(TranscriptError::Structure {
                line_no: 4,
                source: TreeError::NotADirectory(path),
                ..
            }) => assert_eq!(path, "/a"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn cd_multi_segment_path() {
        let res = parse_lines(&["$ cd /", "$ cd a/b"]);

        assert!(matches!(
            res,
            Err(TranscriptError::Structure {
                line_no: 2,
                source: TreeError::InvalidName(_),
                ..
            })
        ));
    }

    #[test]
    fn duplicate_file() {
        let res = parse_lines(&["$ cd /", "$ cd a", "$ ls", "1 x", "$ ls", "1 x"]);

        match res {
            Err(TranscriptError::Structure {
                line_no: 6,
                source: TreeError::DuplicateName { dir, name },
                ..
            }) => {
                assert_eq!(dir, "/a");
                assert_eq!(name, "x");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn file_named_like_existing_dir() {
        let res = parse_lines(&["$ cd /", "$ cd a", "$ cd ..", "$ ls", "5 a"]);

        assert!(matches!(
            res,
            Err(TranscriptError::Structure {
                line_no: 5,
                source: TreeError::DuplicateName { .. },
                ..
            })
        ));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let res = parse_lines(&["$ cd /", "$ ls", "lots b.txt"]);

        match res {
            Err(TranscriptError::Malformed { line_no, source }) => {
                assert_eq!(line_no, 3);
                assert_eq!(source.line, "lots b.txt");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[rstest]
    #[case("xx a", 0)]
    #[case("99999999999999999999999 a", 0)]
    fn bad_file_size_is_named(#[case] input: &str, #[case] offset: usize) {
        let err = Line::parse(input).unwrap_err();

        assert_eq!(err.offset, offset);
        assert!(err.kind.contains("file size"), "kind was {:?}", err.kind);
        assert!(!err.kind.contains('$'), "kind was {:?}", err.kind);
    }

    #[rstest]
    #[case(&["$ cd /", "$ ls", "18446744073709551615 a", "1 b"], 4)]
    #[case(&["$ cd /", "$ ls", "18446744073709551615 a", "$ cd x", "$ ls", "1 b"], 6)]
    #[case(&["$ cd /", "$ cd x", "$ ls", "9223372036854775808 a", "$ cd /", "$ cd y", "$ ls", "9223372036854775808 b"], 8)]
    fn total_size_overflow(#[case] lines: &[&str], #[case] line_no: usize) {
        let res = parse_lines(lines);

        match res {
            Err(TranscriptError::Structure {
                line_no: at,
                source: TreeError::SizeOverflow { name, .. },
                ..
            }) => {
                assert_eq!(at, line_no);
                assert_eq!(name, "b");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn total_size_up_to_max() {
        let fs = parse_lines(&["$ cd /", "$ ls", "18446744073709551614 a", "$ cd x", "$ ls", "1 b"])
            .unwrap();

        assert_eq!(fs.used_space(), u64::MAX);
        assert_eq!(fs.tree().size(fs.dir("/x").unwrap()), 1);
    }
}
