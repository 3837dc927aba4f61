use crate::error::{CliError, Result};
use essdyn::core::error::DynamicsError;
use essdyn::core::sources::{Frame, TopologySource, TrajectorySource};
use std::path::Path;

/// A whole trajectory loaded from CSV: one frame per row, coordinates
/// interleaved as `x1,y1,z1,x2,...`.
pub struct CsvTrajectory {
    frames: Vec<Frame>,
}

impl CsvTrajectory {
    pub fn load(path: &Path) -> Result<Self> {
        let frames = read_numeric_rows(path)?;
        if frames.is_empty() {
            return Err(CliError::FileParsing {
                path: path.to_path_buf(),
                message: "trajectory holds no frames".into(),
            });
        }

        let frame_len = frames[0].len();
        if frame_len == 0 || frame_len % 3 != 0 {
            return Err(CliError::FileParsing {
                path: path.to_path_buf(),
                message: format!("frame length {frame_len} is not a multiple of 3"),
            });
        }
        for (row, frame) in frames.iter().enumerate() {
            if frame.len() != frame_len {
                return Err(CliError::FileParsing {
                    path: path.to_path_buf(),
                    message: format!(
                        "row {} holds {} values, expected {frame_len}",
                        row + 1,
                        frame.len()
                    ),
                });
            }
        }

        Ok(Self { frames })
    }

    pub fn first_frame(&self) -> &[f64] {
        &self.frames[0]
    }

    pub fn num_atoms(&self) -> usize {
        self.frames[0].len() / 3
    }
}

impl TrajectorySource for CsvTrajectory {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> std::result::Result<Frame, DynamicsError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(DynamicsError::IndexOutOfRange {
                index,
                len: self.frames.len(),
            })
    }
}

/// Per-atom masses loaded from CSV, one mass per row in topology order.
pub struct CsvTopology {
    masses: Vec<f64>,
}

impl CsvTopology {
    pub fn load(path: &Path) -> Result<Self> {
        let rows = read_numeric_rows(path)?;
        let mut masses = Vec::with_capacity(rows.len());
        for (row, values) in rows.iter().enumerate() {
            if values.len() != 1 {
                return Err(CliError::FileParsing {
                    path: path.to_path_buf(),
                    message: format!("row {} holds {} values, expected 1", row + 1, values.len()),
                });
            }
            masses.push(values[0]);
        }
        if masses.is_empty() {
            return Err(CliError::FileParsing {
                path: path.to_path_buf(),
                message: "mass file holds no atoms".into(),
            });
        }
        Ok(Self { masses })
    }
}

impl TopologySource for CsvTopology {
    fn num_atoms(&self) -> usize {
        self.masses.len()
    }

    fn mass(&self, atom_index: usize) -> f64 {
        self.masses[atom_index]
    }
}

/// Reads a single-frame reference structure: one CSV row of interleaved
/// coordinates.
pub fn read_reference(path: &Path) -> Result<Frame> {
    let rows = read_numeric_rows(path)?;
    match rows.len() {
        1 => Ok(rows.into_iter().next().expect("one row")),
        n => Err(CliError::FileParsing {
            path: path.to_path_buf(),
            message: format!("reference must hold exactly one row, found {n}"),
        }),
    }
}

pub fn write_eigenvalues(path: &Path, values: &[f64]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for value in values {
        writer.write_record([format!("{value}")])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the eigenvector matrix: 3N rows, one column per eigenpair in the
/// order the pairs are given (largest first).
pub fn write_eigenvectors(path: &Path, vectors: &[Vec<f64>], dim: usize) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for row in 0..dim {
        let record: Vec<String> = vectors
            .iter()
            .map(|vector| format!("{}", vector[row]))
            .collect();
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one structure as a single CSV row, the same shape a reference or
/// trajectory frame is read in.
pub fn write_structure(path: &Path, coordinates: &[f64]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let record: Vec<String> = coordinates.iter().map(|v| format!("{v}")).collect();
    writer.write_record(record)?;
    writer.flush()?;
    Ok(())
}

fn read_numeric_rows(path: &Path) -> Result<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let mut values = Vec::with_capacity(record.len());
        for (col, field) in record.iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            let value: f64 = field.parse().map_err(|_| CliError::FileParsing {
                path: path.to_path_buf(),
                message: format!("row {}, column {}: '{field}' is not a number", row + 1, col + 1),
            })?;
            values.push(value);
        }
        if !values.is_empty() {
            rows.push(values);
        }
    }
    Ok(rows)
}
