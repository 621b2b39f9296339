//! # Weighted-Linear File I/O
//!
//! Writing instances in the local-search solver's text format and parsing its log.
//!
//! An instance reads
//!
//! ```text
//! variable x in {1, 2, 3}
//! c1: weight = 4 type = linear
//!      1(x, 1) 2(x, 2) <= 1
//! c2: weight = inf type = alldiff x y ;
//! ```
//!
//! and the parts of the log that are read look like
//!
//! ```text
//! # penalty = 0/607 (hard/soft)
//! # cpu time = 0.05/7.61(s)
//! # iteration = 6612/2831424
//! [best solution]
//! x: 1
//! [Violated constraints]
//! c1: 2
//! ```

use std::{
    collections::BTreeMap,
    io::{self, BufRead, Write},
};

use itertools::Itertools;
use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{satisfy, u64},
    combinator::{all_consuming, opt, recognize, value},
    number::complete::double,
    sequence::{pair, separated_pair, tuple},
    IResult,
};
use thiserror::Error;

use super::{ScopConstraint, ScopInstance, ScopVariable};

/// Errors when reading a solver log
#[derive(Error, Debug)]
pub enum Error {
    /// An expected item never appeared in the log
    #[error("{0} not found in solver log")]
    Missing(&'static str),
    /// A number in the log does not fit
    #[error("invalid number in solver log line `{0}`")]
    InvalidNumber(String),
    /// Reading failed
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything read from a solver log
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolverLog {
    /// Total penalty of hard constraints
    pub hard_penalty: u64,
    /// Total weighted penalty of soft constraints
    pub soft_penalty: u64,
    /// CPU time until the best solution was found, in milliseconds
    pub last_improved_cpu_ms: u64,
    /// Total CPU time, in milliseconds
    pub cpu_ms: u64,
    /// Iteration at which the best solution was found
    pub last_improved_iteration: u64,
    /// Total iterations
    pub iterations: u64,
    /// Value label of each variable in the best solution
    pub solution: BTreeMap<String, String>,
    /// Violation amount of each violated constraint
    pub violated: BTreeMap<String, i64>,
}

/// Writes one variable declaration
///
/// # Errors
///
/// If writing fails.
pub fn write_variable<W: Write>(writer: &mut W, var: &ScopVariable) -> io::Result<()> {
    writeln!(
        writer,
        "variable {} in {{{}}}",
        var.name,
        var.domain.iter().format(", ")
    )
}

/// Writes one constraint
///
/// # Errors
///
/// If writing fails.
pub fn write_constraint<W: Write>(writer: &mut W, cons: &ScopConstraint) -> io::Result<()> {
    match cons {
        ScopConstraint::Linear {
            name,
            weight,
            terms,
            rel,
            rhs,
        } => {
            // every fifth term starts a new indented line
            let mut tokens = Vec::with_capacity(terms.len() + terms.len() / 5 + 1);
            for (idx, term) in terms.iter().enumerate() {
                if idx % 5 == 0 {
                    tokens.push("\n    ".to_string());
                }
                tokens.push(term.to_string());
            }
            writeln!(
                writer,
                "{name}: weight = {weight} type = linear {} {rel} {rhs}",
                tokens.iter().format(" ")
            )
        }
        ScopConstraint::AllDifferent {
            name,
            weight,
            variables,
        } => writeln!(
            writer,
            "{name}: weight = {weight} type = alldiff {} ;",
            variables.iter().format(" ")
        ),
    }
}

/// Writes an instance, variables first
///
/// # Errors
///
/// If writing fails.
pub fn write_instance<W: Write>(writer: &mut W, inst: &ScopInstance) -> io::Result<()> {
    for var in inst.variables() {
        write_variable(writer, var)?;
    }
    for cons in inst.constraints() {
        write_constraint(writer, cons)?;
    }
    writer.flush()
}

/// Parses a solver log. Items are searched in order, skipping any lines before them.
///
/// # Errors
///
/// [`Error::Missing`] if an item is absent, [`Error::InvalidNumber`] or [`Error::Io`].
pub fn parse_log<R: BufRead>(reader: R) -> Result<SolverLog, Error> {
    let mut lines = reader.lines();
    let mut log = SolverLog::default();

    let (hard, soft) = find_line(&mut lines, penalty_line, "penalty")?;
    log.hard_penalty = hard;
    log.soft_penalty = soft;

    let (last, total) = find_line(&mut lines, cpu_time_line, "cpu time")?;
    log.last_improved_cpu_ms = secs_to_ms(last)?;
    log.cpu_ms = secs_to_ms(total)?;

    let (last, total) = find_line(&mut lines, iteration_line, "iteration")?;
    log.last_improved_iteration = last;
    log.iterations = total;

    find_line(
        &mut lines,
        |l| value((), tag("[best solution]"))(l),
        "best solution",
    )?;
    let trailer = read_entries(&mut lines, |name, val| {
        log.solution.insert(name.to_string(), val.to_string());
        Ok(())
    })?;

    // the line ending the solution section may already be the next header
    if !trailer.is_some_and(|l| l.trim_end() == "[Violated constraints]") {
        find_line(
            &mut lines,
            |l| value((), tag("[Violated constraints]"))(l),
            "violated constraints",
        )?;
    }
    read_entries(&mut lines, |name, val| {
        let amount = val
            .parse()
            .map_err(|_| Error::InvalidNumber(format!("{name}: {val}")))?;
        log.violated.insert(name.to_string(), amount);
        Ok(())
    })?;
    Ok(log)
}

/// Skips lines until one matches `parser` completely
fn find_line<I, O, P>(lines: &mut I, mut parser: P, what: &'static str) -> Result<O, Error>
where
    I: Iterator<Item = io::Result<String>>,
    P: FnMut(&str) -> IResult<&str, O>,
{
    for line in lines {
        let line = line?;
        if let Ok(("", out)) = parser(line.trim_end()) {
            return Ok(out);
        }
    }
    Err(Error::Missing(what))
}

/// Reads `name: value` lines until the first line of another shape, which is returned
fn read_entries<I, F>(lines: &mut I, mut entry: F) -> Result<Option<String>, Error>
where
    I: Iterator<Item = io::Result<String>>,
    F: FnMut(&str, &str) -> Result<(), Error>,
{
    for line in lines {
        let line = line?;
        if let Ok((_, (name, val))) = all_consuming(entry_line)(line.trim_end()) {
            entry(name, val)?;
            continue;
        }
        return Ok(Some(line));
    }
    Ok(None)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn secs_to_ms(secs: f64) -> Result<u64, Error> {
    if !secs.is_finite() || secs < 0. {
        return Err(Error::InvalidNumber(secs.to_string()));
    }
    Ok((secs * 1000.).round() as u64)
}

/// `# penalty = H/S (hard/soft)`
fn penalty_line(input: &str) -> IResult<&str, (u64, u64)> {
    let (input, (_, hs, _)) = tuple((
        tag("# penalty = "),
        separated_pair(u64, tag("/"), u64),
        tag(" (hard/soft)"),
    ))(input)?;
    Ok((input, hs))
}

/// `# cpu time = a/b(s)`
fn cpu_time_line(input: &str) -> IResult<&str, (f64, f64)> {
    let (input, (_, ab, _)) = tuple((
        tag("# cpu time = "),
        separated_pair(double, tag("/"), double),
        tag("(s)"),
    ))(input)?;
    Ok((input, ab))
}

/// `# iteration = a/b`
fn iteration_line(input: &str) -> IResult<&str, (u64, u64)> {
    let (input, (_, ab)) =
        pair(tag("# iteration = "), separated_pair(u64, tag("/"), u64))(input)?;
    Ok((input, ab))
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// An identifier `[a-zA-Z]\w*`
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(is_word),
    ))(input)
}

/// `Name: value`, where a value may be negative
fn entry_line(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        identifier,
        tag(": "),
        recognize(pair(opt(tag("-")), take_while1(is_word))),
    )(input)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{
        cpu_time_line, entry_line, parse_log, penalty_line, write_constraint, write_instance,
        Error,
    };
    use crate::scop::{Relation, ScopConstraint, ScopInstance, ScopTerm, ScopVariable, Weight};

    fn term(coeff: i64, var: &str, val: i64) -> ScopTerm {
        ScopTerm {
            coeff,
            variable: var.to_string(),
            value: val.to_string(),
        }
    }

    #[test]
    fn line_parsers() {
        assert_eq!(
            penalty_line("# penalty = 0/607 (hard/soft)"),
            Ok(("", (0, 607)))
        );
        assert_eq!(
            cpu_time_line("# cpu time = 0.05/7.61(s)"),
            Ok(("", (0.05, 7.61)))
        );
        assert_eq!(entry_line("X01_02: AB"), Ok(("", ("X01_02", "AB"))));
        assert!(entry_line("1x: 3").is_err());
        assert_eq!(entry_line("x: -12"), Ok(("", ("x", "-12"))));
        assert!(entry_line("x: -").is_err());
    }

    #[test]
    fn write_linear_breaks_lines() {
        let cons = ScopConstraint::Linear {
            name: "c".to_string(),
            weight: Weight::Hard,
            terms: (0..6).map(|v| term(v + 1, "x", v)).collect(),
            rel: Relation::Le,
            rhs: 3,
        };
        let mut buf = vec![];
        write_constraint(&mut buf, &cons).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "c: weight = inf type = linear \n     1(x, 0) 2(x, 1) 3(x, 2) 4(x, 3) 5(x, 4) \n     \
             6(x, 5) <= 3\n"
        );
    }

    #[test]
    fn write_whole_instance() {
        let mut inst = ScopInstance::new();
        for name in ["x", "y"] {
            inst.add_variable(ScopVariable {
                name: name.to_string(),
                domain: vec!["1".to_string(), "2".to_string(), "3".to_string()],
            })
            .unwrap();
        }
        inst.add_constraint(ScopConstraint::AllDifferent {
            name: "ad".to_string(),
            weight: Weight::Hard,
            variables: vec!["x".to_string(), "y".to_string()],
        })
        .unwrap();
        inst.add_constraint(ScopConstraint::Linear {
            name: "s".to_string(),
            weight: Weight::Soft(4),
            terms: vec![term(1, "x", 1), term(2, "y", 2)],
            rel: Relation::Ge,
            rhs: 1,
        })
        .unwrap();
        let mut buf = vec![];
        write_instance(&mut buf, &inst).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "variable x in {1, 2, 3}\n\
             variable y in {1, 2, 3}\n\
             ad: weight = inf type = alldiff x y ;\n\
             s: weight = 4 type = linear \n     1(x, 1) 2(y, 2) >= 1\n"
        );
    }

    #[test]
    fn parse_full_log() {
        let data = "\
scop ver 1.0
# random seed = 1
# penalty = 0/607 (hard/soft)
# cpu time = 0.05/7.61(s)
# iteration = 6612/2831424

[best solution]
x: 1
y_2: 3
[Violated constraints]
c1: 2
c2: 5

trailing noise
";
        let log = parse_log(Cursor::new(data)).unwrap();
        assert_eq!(log.hard_penalty, 0);
        assert_eq!(log.soft_penalty, 607);
        assert_eq!(log.last_improved_cpu_ms, 50);
        assert_eq!(log.cpu_ms, 7610);
        assert_eq!(log.last_improved_iteration, 6612);
        assert_eq!(log.iterations, 2_831_424);
        assert_eq!(log.solution.get("y_2").map(String::as_str), Some("3"));
        assert_eq!(log.solution.len(), 2);
        assert_eq!(log.violated.get("c2"), Some(&5));
        assert_eq!(log.violated.len(), 2);
    }

    #[test]
    fn negative_values() {
        let data = "# penalty = 0/0 (hard/soft)\n# cpu time = 0/0(s)\n# iteration = 0/0\n\
                    [best solution]\na: -1\nb: 2\nc: -30\n[Violated constraints]\n";
        let log = parse_log(Cursor::new(data)).unwrap();
        assert_eq!(log.solution.len(), 3);
        assert_eq!(log.solution.get("a").map(String::as_str), Some("-1"));
        assert_eq!(log.solution.get("c").map(String::as_str), Some("-30"));
    }

    #[test]
    fn sections_separated_by_blank_line() {
        let data = "# penalty = 1/2 (hard/soft)\n# cpu time = 1/2(s)\n# iteration = 3/4\n\
                    [best solution]\nx: 0\n\n[Violated constraints]\n";
        let log = parse_log(Cursor::new(data)).unwrap();
        assert_eq!(log.cpu_ms, 2000);
        assert!(log.violated.is_empty());
    }

    #[test]
    fn missing_items() {
        let res = parse_log(Cursor::new("# penalty = 0/1 (hard/soft)\n"));
        assert!(matches!(res, Err(Error::Missing("cpu time"))));
        let data = "# penalty = 0/1 (hard/soft)\n# cpu time = 0.1/0.2(s)\n# iteration = 1/2\n\
                    [best solution]\nx: 1\n";
        let res = parse_log(Cursor::new(data));
        assert!(matches!(res, Err(Error::Missing("violated constraints"))));
    }
}
