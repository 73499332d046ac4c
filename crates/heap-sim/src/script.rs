//! Script operations accepted on the command line.
//!
//! | syntax | operation |
//! |--------|-----------|
//! | `m:SIZE` | `malloc(SIZE)` |
//! | `c:COUNT:SIZE` | `calloc(COUNT, SIZE)` |
//! | `a:ALIGN:SIZE` | `aligned_alloc(ALIGN, SIZE)` |
//! | `r:ID:SIZE` | `realloc(#ID, SIZE)` |
//! | `f:ID` | `free(#ID)` |
//!
//! Every allocating operation is assigned the next slot id, starting at 0.
//! `realloc` keeps the slot id of the reallocated pointer.

use std::{fmt, num::ParseIntError, str::FromStr};

use snafu::{OptionExt as _, ResultExt as _, Snafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Malloc { size: usize },
    Calloc { count: usize, size: usize },
    AlignedAlloc { align: usize, size: usize },
    Realloc { id: usize, size: usize },
    Free { id: usize },
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malloc { size } => write!(f, "malloc({size})"),
            Self::Calloc { count, size } => write!(f, "calloc({count}, {size})"),
            Self::AlignedAlloc { align, size } => write!(f, "aligned_alloc({align}, {size})"),
            Self::Realloc { id, size } => write!(f, "realloc(#{id}, {size})"),
            Self::Free { id } => write!(f, "free(#{id})"),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ParseOpError {
    #[snafu(display("unknown operation `{op}`"))]
    UnknownOp { op: String },
    #[snafu(display("operation `{op}` expects {expected} arguments, found {found}"))]
    ArgumentCount {
        op: String,
        expected: usize,
        found: usize,
    },
    #[snafu(display("invalid number `{value}`"))]
    InvalidNumber {
        value: String,
        #[snafu(source)]
        source: ParseIntError,
    },
}

fn parse_number(value: &str) -> Result<usize, ParseOpError> {
    let parsed = if let Some(hex) = value.strip_prefix("0x") {
        usize::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    parsed.context(InvalidNumberSnafu { value })
}

fn wrong_count(op: &str, expected: usize, found: usize) -> Result<Op, ParseOpError> {
    ArgumentCountSnafu {
        op,
        expected,
        found,
    }
    .fail()
}

impl FromStr for Op {
    type Err = ParseOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().context(UnknownOpSnafu { op: s })?;
        let args = parts.map(parse_number).collect::<Result<Vec<_>, _>>()?;

        let op = match (name, args.as_slice()) {
            ("m", &[size]) => Self::Malloc { size },
            ("c", &[count, size]) => Self::Calloc { count, size },
            ("a", &[align, size]) => Self::AlignedAlloc { align, size },
            ("r", &[id, size]) => Self::Realloc { id, size },
            ("f", &[id]) => Self::Free { id },
            ("m" | "f", _) => return wrong_count(s, 1, args.len()),
            ("c" | "a" | "r", _) => return wrong_count(s, 2, args.len()),
            _ => return UnknownOpSnafu { op: s }.fail(),
        };
        Ok(op)
    }
}
