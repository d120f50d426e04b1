//! Structure input and simulation output
//!
//! Structures are read from XYZ files in ångström and converted to nm.
//! The comment line may carry a periodic box as `box=a,b,c` (ångström).
//! Atom lines are `symbol x y z [charge]`.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::configuration::Configuration;
use crate::ncmc::session::{CycleRecord, MoveStatistics};
use crate::ncmc::{CycleOutcome, Direction};
use crate::particle::{Element, Particle};

/// Nanometers per ångström
const NM_PER_ANGSTROM: f64 = 0.1;

/// Errors that can occur during file I/O operations
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}

/// Particles and coordinates read from a structure file
#[derive(Debug, Clone)]
pub struct Structure {
    pub title: String,
    pub particles: Vec<Particle>,
    pub configuration: Configuration,
}

/// Parse an XYZ file
pub fn parse_xyz<P: AsRef<Path>>(path: P) -> Result<Structure, IoError> {
    let file = File::open(path.as_ref())?;
    read_xyz(BufReader::new(file))
}

/// Parse XYZ text from any buffered reader
pub fn read_xyz<R: BufRead>(reader: R) -> Result<Structure, IoError> {
    let mut lines = reader.lines();

    let count_line = lines
        .next()
        .ok_or_else(|| IoError::InvalidFormat("empty XYZ file".to_string()))??;
    let count: usize = count_line.trim().parse().map_err(|_| IoError::Parse {
        line: 1,
        message: format!("Invalid atom count: {}", count_line.trim()),
    })?;
    let title = lines.next().transpose()?.unwrap_or_default();
    let periodic_box = parse_box(&title)?;

    let mut particles = Vec::with_capacity(count);
    let mut positions = Vec::with_capacity(count);
    for (offset, line) in lines.enumerate() {
        let line = line?;
        let line_number = offset + 3;
        if line.trim().is_empty() {
            continue;
        }
        if particles.len() == count {
            break;
        }

        let (particle, position) = parse_atom_line(&line, line_number, particles.len())?;
        particles.push(particle);
        positions.push(position);
    }

    if particles.len() != count {
        return Err(IoError::InvalidFormat(format!(
            "expected {} atoms, found {}",
            count,
            particles.len()
        )));
    }

    let mut configuration = Configuration::new(positions);
    if let Some(lengths) = periodic_box {
        configuration = configuration.with_box(lengths);
    }
    Ok(Structure {
        title: title.trim().to_string(),
        particles,
        configuration,
    })
}

fn parse_atom_line(
    line: &str,
    line_number: usize,
    index: usize,
) -> Result<(Particle, Vector3<f64>), IoError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(IoError::Parse {
            line: line_number,
            message: format!("Expected 'symbol x y z [charge]': {}", line),
        });
    }

    let coordinate = |i: usize| -> Result<f64, IoError> {
        fields[i].parse::<f64>().map_err(|_| IoError::Parse {
            line: line_number,
            message: format!("Invalid coordinate: {}", fields[i]),
        })
    };
    let position = Vector3::new(coordinate(1)?, coordinate(2)?, coordinate(3)?) * NM_PER_ANGSTROM;

    let charge = match fields.get(4) {
        Some(value) => value.parse::<f64>().map_err(|_| IoError::Parse {
            line: line_number,
            message: format!("Invalid charge: {}", value),
        })?,
        None => 0.0,
    };

    let element = Element::from_symbol(fields[0]);
    let name = format!("{}{}", fields[0], index + 1);
    Ok((Particle::new(element, &name, charge), position))
}

fn parse_box(comment: &str) -> Result<Option<Vector3<f64>>, IoError> {
    let field = match comment
        .split_whitespace()
        .find_map(|token| token.strip_prefix("box="))
    {
        Some(field) => field,
        None => return Ok(None),
    };

    let lengths: Vec<f64> = field
        .split(',')
        .map(|v| v.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| IoError::Parse {
            line: 2,
            message: format!("Invalid box specification: {}", field),
        })?;
    if lengths.len() != 3 || lengths.iter().any(|&l| !(l > 0.0)) {
        return Err(IoError::Parse {
            line: 2,
            message: format!("Box needs three positive lengths: {}", field),
        });
    }
    Ok(Some(
        Vector3::new(lengths[0], lengths[1], lengths[2]) * NM_PER_ANGSTROM,
    ))
}

/// Multi-frame XYZ trajectory writer
pub struct XyzWriter<W: Write> {
    out: W,
    frames: usize,
}

impl XyzWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> XyzWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, frames: 0 }
    }

    /// Append one frame; positions are in nm
    pub fn write_frame(
        &mut self,
        particles: &[Particle],
        positions: &[Vector3<f64>],
        comment: &str,
    ) -> Result<(), IoError> {
        if particles.len() != positions.len() {
            return Err(IoError::InvalidFormat(format!(
                "{} particles but {} positions",
                particles.len(),
                positions.len()
            )));
        }

        writeln!(self.out, "{}", particles.len())?;
        writeln!(self.out, "{}", comment.replace('\n', " "))?;
        for (particle, position) in particles.iter().zip(positions) {
            let p = position / NM_PER_ANGSTROM;
            writeln!(
                self.out,
                "{:<2} {:12.6} {:12.6} {:12.6} {:9.5}",
                particle.element.symbol(),
                p.x,
                p.y,
                p.z,
                particle.charge
            )?;
        }
        self.frames += 1;
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn flush(&mut self) -> Result<(), IoError> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One row of the per-cycle work table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRow {
    pub iteration: u64,
    pub direction: Direction,
    pub outcome: CycleOutcome,
    pub work: Option<f64>,
    pub perturbation_energy: Option<f64>,
    pub acceptance_probability: Option<f64>,
}

impl From<&CycleRecord> for WorkRow {
    fn from(record: &CycleRecord) -> Self {
        Self {
            iteration: record.iteration,
            direction: record.direction,
            outcome: record.outcome,
            work: record.work,
            perturbation_energy: record.perturbation_energy,
            acceptance_probability: record.acceptance_probability,
        }
    }
}

/// Write one CSV row per cycle; failed cycles leave work columns empty
pub fn write_work_records<W: Write>(records: &[CycleRecord], out: W) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(WorkRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_work_csv<P: AsRef<Path>>(records: &[CycleRecord], path: P) -> Result<(), IoError> {
    write_work_records(records, File::create(path)?)
}

/// Read a work table written by [`write_work_csv`]
pub fn read_work_csv<P: AsRef<Path>>(path: P) -> Result<Vec<WorkRow>, IoError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Write the session statistics as pretty-printed JSON
pub fn write_statistics<P: AsRef<Path>>(statistics: &MoveStatistics, path: P) -> Result<(), IoError> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, statistics)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Cursor;
    use tempfile::tempdir;

    const WATER: &str = "3\nwater box=20.0,20.0,20.0\nO 0.0 0.0 0.0 -0.834\nH 0.9572 0.0 0.0 0.417\nH -0.24 0.927 0.0 0.417\n";

    #[test]
    fn test_read_xyz() {
        let structure = read_xyz(Cursor::new(WATER)).unwrap();
        assert_eq!(structure.particles.len(), 3);
        assert_eq!(structure.particles[0].element, Element::Oxygen);
        assert_eq!(structure.particles[1].name, "H2");
        assert_approx_eq!(structure.particles[0].charge, -0.834);
        assert_approx_eq!(structure.configuration.positions[1].x, 0.09572);
        assert_eq!(
            structure.configuration.periodic_box,
            Some(Vector3::new(2.0, 2.0, 2.0))
        );
    }

    #[test]
    fn test_read_xyz_without_charges_or_box() {
        let structure = read_xyz(Cursor::new("1\n\nAr 1.0 2.0 3.0\n")).unwrap();
        assert_eq!(structure.particles[0].charge, 0.0);
        assert!(structure.configuration.periodic_box.is_none());
    }

    #[test]
    fn test_read_xyz_errors() {
        assert!(matches!(
            read_xyz(Cursor::new("two\n\n")),
            Err(IoError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            read_xyz(Cursor::new("2\n\nAr 0 0 0\n")),
            Err(IoError::InvalidFormat(_))
        ));
        assert!(matches!(
            read_xyz(Cursor::new("1\n\nAr 0 zero 0\n")),
            Err(IoError::Parse { line: 3, .. })
        ));
        assert!(read_xyz(Cursor::new("1\nbox=1,2\nAr 0 0 0\n")).is_err());
    }

    #[test]
    fn test_xyz_frames_read_back() {
        let structure = read_xyz(Cursor::new(WATER)).unwrap();
        let mut writer = XyzWriter::new(Vec::new());
        writer
            .write_frame(
                &structure.particles,
                &structure.configuration.positions,
                "frame 0",
            )
            .unwrap();
        writer
            .write_frame(
                &structure.particles,
                &structure.configuration.positions,
                "frame 1",
            )
            .unwrap();
        assert_eq!(writer.frames(), 2);

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 10);
        let first = read_xyz(Cursor::new(text)).unwrap();
        assert_approx_eq!(first.configuration.positions[2].y, 0.0927, 1e-7);
    }

    #[test]
    fn test_work_csv() {
        let records = vec![
            CycleRecord {
                iteration: 0,
                outcome: CycleOutcome::Accepted,
                work: Some(-1.25),
                perturbation_energy: Some(0.5),
                acceptance_probability: Some(1.0),
                direction: Direction::Forward,
                error: None,
            },
            CycleRecord {
                iteration: 1,
                outcome: CycleOutcome::IntegratorFailure,
                work: None,
                perturbation_energy: None,
                acceptance_probability: None,
                direction: Direction::Forward,
                error: Some("non-finite energy".to_string()),
            },
        ];

        let dir = tempdir().unwrap();
        let path = dir.path().join("work.csv");
        write_work_csv(&records, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "iteration,direction,outcome,work,perturbation_energy,acceptance_probability"
        );
        assert_eq!(lines[1], "0,forward,accepted,-1.25,0.5,1.0");
        assert_eq!(lines[2], "1,forward,integrator_failure,,,");

        let rows = read_work_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].work, Some(-1.25));
        assert_eq!(rows[1].outcome, CycleOutcome::IntegratorFailure);
        assert!(rows[1].acceptance_probability.is_none());
    }

    #[test]
    fn test_read_work_csv_rejects_bad_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "iteration,direction,outcome,work,perturbation_energy,acceptance_probability\n\
             0,sideways,accepted,1.0,,1.0\n",
        )
        .unwrap();
        assert!(matches!(read_work_csv(&path), Err(IoError::Csv(_))));
    }

    #[test]
    fn test_write_statistics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        write_statistics(&MoveStatistics::new(), &path).unwrap();

        let parsed: MoveStatistics =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.proposed(), 0);
    }
}
