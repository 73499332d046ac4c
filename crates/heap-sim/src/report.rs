use std::{error::Error, fmt};

use heap::Location;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(whatever, display("{message}"))]
pub struct GenericError {
    message: String,
    #[snafu(implicit)]
    location: Location,
    #[snafu(source(from(Box<dyn Error>, Some)))]
    source: Option<Box<dyn Error>>,
}

/// Prints an error followed by its chain of sources.
pub struct Report {
    error: GenericError,
}

impl Report {
    pub fn new(error: GenericError) -> Self {
        Self { error }
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.error)?;
        writeln!(f, "  at {}", self.error.location)?;
        let mut source = self.error.source();
        if source.is_some() {
            writeln!(f)?;
            writeln!(f, "Caused by:")?;
        }
        let mut index = 0;
        while let Some(s) = source {
            writeln!(f, "{index:4}: {s}")?;
            source = s.source();
            index += 1;
        }
        Ok(())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use snafu::ResultExt as _;

    use super::*;
    use crate::script::Op;

    #[test]
    fn test_report_chain() {
        let result = "m:big"
            .parse::<Op>()
            .whatever_context::<_, GenericError>("failed to parse script");
        let report = Report::new(result.unwrap_err()).to_string();

        let lines = report.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Error: failed to parse script");
        assert!(lines[1].starts_with("  at "));
        assert_eq!(lines[3], "Caused by:");
        assert_eq!(lines[4], "   0: invalid number `big`");
        assert!(lines[5].starts_with("   1: "));
    }
}
