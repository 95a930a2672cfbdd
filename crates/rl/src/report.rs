//! Tab-separated performance and trajectory output.

use std::io::{self, Write};

use crate::bacterial_env::History;
use crate::train::EpisodeSummary;

/// Sentinel for an event that never happened.
pub const NOT_REACHED: &str = "N/A";

pub const TRAINING_HEADER: &str = "episode\texplore_rate\te_return\tt5p\ttTiny\ttotal_drug_in";

pub const TESTING_HEADER: &str = "exp_ID\te_return\tt5p\ttTiny\ttotal_drug_in";

pub const TRAJECTORY_HEADER: &str = "t\tE\tZ\tM\tD";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeRecord {
    pub episode: usize,
    pub explore_rate: f64,
    pub summary: EpisodeSummary,
}

/// Receives one record per training episode.
pub trait PerformanceSink {
    /// # Errors
    ///
    /// Write failures of the underlying output.
    fn record(&mut self, record: &EpisodeRecord) -> io::Result<()>;
}

impl PerformanceSink for Vec<EpisodeRecord> {
    fn record(&mut self, record: &EpisodeRecord) -> io::Result<()> {
        self.push(*record);
        Ok(())
    }
}

fn event(t: Option<f64>) -> String {
    t.map_or_else(|| NOT_REACHED.to_owned(), |t| t.to_string())
}

/// Training performance table, one row per episode.
pub struct TsvReport<W: Write> {
    out: W,
}

impl<W: Write> TsvReport<W> {
    /// Writes the header row.
    ///
    /// # Errors
    ///
    /// Write failures.
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{TRAINING_HEADER}")?;
        Ok(Self { out })
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PerformanceSink for TsvReport<W> {
    fn record(&mut self, r: &EpisodeRecord) -> io::Result<()> {
        let s = &r.summary;
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            r.episode,
            r.explore_rate,
            s.e_return,
            event(s.first_five_percent),
            event(s.first_tiny),
            s.total_drug_in
        )?;
        self.out.flush()
    }
}

/// Writes the single-row evaluation summary of an experiment.
///
/// # Errors
///
/// Write failures.
pub fn write_testing_perf<W: Write>(mut out: W, exp_id: &str, s: &EpisodeSummary) -> io::Result<()> {
    writeln!(out, "{TESTING_HEADER}")?;
    writeln!(
        out,
        "{exp_id}\t{}\t{}\t{}\t{}",
        s.e_return,
        event(s.first_five_percent),
        event(s.first_tiny),
        s.total_drug_in
    )
}

/// Writes every trajectory sample as `t E Z M D` with `M = E + Z`.
///
/// # Errors
///
/// Write failures.
pub fn write_trajectory<W: Write>(mut out: W, history: &History) -> io::Result<()> {
    writeln!(out, "{TRAJECTORY_HEADER}")?;
    for (t, y) in history.times().iter().zip(history.states()) {
        writeln!(out, "{t:.5}\t{:.5}\t{:.5}\t{:.5}\t{:.5}", y.e, y.z, y.total_density(), y.d)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_events_use_sentinel() {
        let mut report = TsvReport::new(Vec::new()).unwrap();
        let summary = EpisodeSummary {
            e_return: 1.5,
            first_five_percent: Some(12.25),
            first_tiny: None,
            total_drug_in: 9.0,
            ..EpisodeSummary::default()
        };
        report.record(&EpisodeRecord { episode: 3, explore_rate: 0.5, summary }).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], TRAINING_HEADER);
        assert_eq!(lines[1], "3\t0.5\t1.5\t12.25\tN/A\t9");
    }

    #[test]
    fn testing_row_follows_header() {
        let mut buf = Vec::new();
        write_testing_perf(&mut buf, "exp7", &EpisodeSummary::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, format!("{TESTING_HEADER}\nexp7\t0\tN/A\tN/A\t0\n"));
    }
}
