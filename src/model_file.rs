//! Run-period rewrite of the building model file.
//!
//! The model is a plain-text, line-oriented format whose `RunPeriod`
//! section declares the simulated time window. Before invocation the
//! template is copied line by line; inside the section, any line carrying
//! a known marker comment (`!- Begin Year` and friends) is replaced with
//! the override built from the twin's computed dates. Everything else
//! passes through verbatim. Single pass, deterministic.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{Datelike, NaiveDate};

/// Section head that opens a run-period block.
const SECTION_HEAD: &str = "RunPeriod";

/// Marker comments recognized inside the run-period section.
pub const BEGIN_YEAR: &str = "!- Begin Year";
pub const BEGIN_MONTH: &str = "!- Begin Month";
pub const BEGIN_DAY: &str = "!- Begin Day of Month";
pub const END_YEAR: &str = "!- End Year";
pub const END_MONTH: &str = "!- End Month";
pub const END_DAY: &str = "!- End Day of Month";
pub const START_WEEKDAY: &str = "!- Day of Week for Start Day";

/// Builds the marker → replacement-line map for a simulation window.
///
/// Field values are left-aligned the way model editors emit them, with
/// the marker comment restored after the value.
pub fn override_map(start: NaiveDate, end: NaiveDate) -> Vec<(String, String)> {
    let field = |value: String, marker: &str| format!("  {value:<34}{marker}");
    vec![
        (BEGIN_YEAR.into(), field(format!("{},", start.year()), BEGIN_YEAR)),
        (BEGIN_MONTH.into(), field(format!("{},", start.month()), BEGIN_MONTH)),
        (BEGIN_DAY.into(), field(format!("{},", start.day()), BEGIN_DAY)),
        (END_YEAR.into(), field(format!("{},", end.year()), END_YEAR)),
        (END_MONTH.into(), field(format!("{},", end.month()), END_MONTH)),
        (END_DAY.into(), field(format!("{},", end.day()), END_DAY)),
        (
            START_WEEKDAY.into(),
            field(format!("{},", start.format("%A")), START_WEEKDAY),
        ),
    ]
}

/// Copies `input` to `output`, substituting marker-keyed lines inside the
/// run-period section.
///
/// # Errors
///
/// Returns any I/O error from reading or writing.
pub fn rewrite(
    input: impl BufRead,
    mut output: impl Write,
    overrides: &[(String, String)],
) -> io::Result<()> {
    let mut in_run_period = false;
    for line in input.lines() {
        let line = line?;
        if !in_run_period {
            if line.trim_start().starts_with(SECTION_HEAD) {
                in_run_period = true;
            }
            writeln!(output, "{line}")?;
            continue;
        }

        match overrides.iter().find(|(marker, _)| line.contains(marker)) {
            Some((_, replacement)) => writeln!(output, "{replacement}")?,
            None => writeln!(output, "{line}")?,
        }
        // The section's last field line carries the terminator.
        if line.contains(';') {
            in_run_period = false;
        }
    }
    Ok(())
}

/// Rewrites `template` into `out_path` with the given overrides.
///
/// # Errors
///
/// Returns any I/O error from opening, reading, or writing the files.
pub fn rewrite_file(
    template: &Path,
    out_path: &Path,
    overrides: &[(String, String)],
) -> io::Result<()> {
    let input = BufReader::new(File::open(template)?);
    let mut output = BufWriter::new(File::create(out_path)?);
    rewrite(input, &mut output, overrides)?;
    output.flush()
}
