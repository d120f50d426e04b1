//! State-data reporters for NCMC switching steps
//!
//! Reports are emitted as separator-joined rows prefixed by a title, so NCMC
//! and MD output can share one stream and still be told apart.

use log::info;
use std::io::{self, Write};

/// One λ step of an NCMC cycle
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Cycle counter of the engine
    pub iteration: u64,

    /// Schedule index reached by this step
    pub step: usize,

    pub lambda: f64,

    /// Work accumulated so far in this cycle (kJ/mol)
    pub protocol_work: f64,

    /// Potential energy after the λ change (kJ/mol)
    pub potential_energy: f64,
}

/// Receives step reports from the engine
pub trait NcmcReporter {
    /// Report every `report_interval()` schedule steps; 0 is treated as 1
    fn report_interval(&self) -> usize;

    fn report(&mut self, report: &StepReport) -> io::Result<()>;

    fn wants(&self, step: usize) -> bool {
        step % self.report_interval().max(1) == 0
    }
}

/// Which columns appear in a report row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportColumns {
    pub iteration: bool,
    pub step: bool,
    pub lambda: bool,
    pub protocol_work: bool,
    pub potential_energy: bool,
}

impl Default for ReportColumns {
    fn default() -> Self {
        Self {
            iteration: true,
            step: true,
            lambda: true,
            protocol_work: true,
            potential_energy: true,
        }
    }
}

impl ReportColumns {
    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = Vec::new();
        if self.iteration {
            headers.push("Iter");
        }
        if self.step {
            headers.push("Step");
        }
        if self.lambda {
            headers.push("alchemicalLambda");
        }
        if self.protocol_work {
            headers.push("protocolWork");
        }
        if self.potential_energy {
            headers.push("Potential Energy (kJ/mole)");
        }
        headers
    }

    pub fn values(&self, report: &StepReport) -> Vec<String> {
        let mut values = Vec::new();
        if self.iteration {
            values.push(report.iteration.to_string());
        }
        if self.step {
            values.push(report.step.to_string());
        }
        if self.lambda {
            values.push(format!("{:.6}", report.lambda));
        }
        if self.protocol_work {
            values.push(format!("{:.6}", report.protocol_work));
        }
        if self.potential_energy {
            values.push(format!("{:.6}", report.potential_energy));
        }
        values
    }
}

/// Writes reports to any `Write` sink, with a quoted header row first
pub struct StateDataReporter<W: Write> {
    out: W,
    interval: usize,
    title: String,
    separator: String,
    columns: ReportColumns,
    header_written: bool,
}

impl<W: Write> StateDataReporter<W> {
    pub fn new(out: W, interval: usize, title: &str) -> Self {
        Self {
            out,
            interval,
            title: title.to_string(),
            separator: "\t".to_string(),
            columns: ReportColumns::default(),
            header_written: false,
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn with_columns(mut self, columns: ReportColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> NcmcReporter for StateDataReporter<W> {
    fn report_interval(&self) -> usize {
        self.interval
    }

    fn report(&mut self, report: &StepReport) -> io::Result<()> {
        if !self.header_written {
            let quoted: Vec<String> = self
                .columns
                .headers()
                .iter()
                .map(|h| format!("\"{}\"", h))
                .collect();
            writeln!(self.out, "#{}", quoted.join(&self.separator))?;
            self.header_written = true;
        }
        writeln!(
            self.out,
            "{}: {}",
            self.title,
            self.columns.values(report).join(&self.separator)
        )?;
        self.out.flush()
    }
}

/// Streams reports through the `log` facade at info level
pub struct LogReporter {
    interval: usize,
    title: String,
    separator: String,
    columns: ReportColumns,
    header_logged: bool,
}

impl LogReporter {
    pub fn new(interval: usize, title: &str) -> Self {
        Self {
            interval,
            title: title.to_string(),
            separator: "\t".to_string(),
            columns: ReportColumns::default(),
            header_logged: false,
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }
}

impl NcmcReporter for LogReporter {
    fn report_interval(&self) -> usize {
        self.interval
    }

    fn report(&mut self, report: &StepReport) -> io::Result<()> {
        if !self.header_logged {
            info!("#{}", self.columns.headers().join(&self.separator));
            self.header_logged = true;
        }
        info!(
            "{}: {}",
            self.title,
            self.columns.values(report).join(&self.separator)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(step: usize) -> StepReport {
        StepReport {
            iteration: 3,
            step,
            lambda: 0.25,
            protocol_work: -1.5,
            potential_energy: -120.0,
        }
    }

    #[test]
    fn test_state_data_rows() {
        let mut reporter = StateDataReporter::new(Vec::new(), 1, "ncmc").with_separator(",");
        reporter.report(&sample(1)).unwrap();
        reporter.report(&sample(2)).unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "#\"Iter\",\"Step\",\"alchemicalLambda\",\"protocolWork\",\"Potential Energy (kJ/mole)\""
        );
        assert_eq!(lines[1], "ncmc: 3,1,0.250000,-1.500000,-120.000000");
    }

    #[test]
    fn test_column_selection() {
        let columns = ReportColumns {
            iteration: false,
            step: false,
            lambda: true,
            protocol_work: true,
            potential_energy: false,
        };
        let mut reporter = StateDataReporter::new(Vec::new(), 1, "md").with_columns(columns);
        reporter.report(&sample(0)).unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.ends_with("md: 0.250000\t-1.500000\n"));
    }

    #[test]
    fn test_interval() {
        let reporter = StateDataReporter::new(Vec::new(), 5, "ncmc");
        assert!(reporter.wants(0));
        assert!(!reporter.wants(3));
        assert!(reporter.wants(10));

        let every = LogReporter::new(0, "ncmc");
        assert!(every.wants(7));
    }
}
