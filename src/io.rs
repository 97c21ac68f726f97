// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Narrow I/O contracts. `limbtrace` does not ship file-format parsers
//! or the external RFM subprocess bridge (both are out of scope); these
//! traits are the seam an embedding application implements against real
//! files. One reference, whitespace-delimited ASCII implementation of
//! each is provided, mostly to give the ambient test-tooling stack
//! (`tempfile`, `indoc`) real surface to exercise.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::atmosphere::{Atmosphere, CloudParams, SurfaceParams};

/// Version tag for [`BinAtmosphere`]'s packed record, bumped on any
/// layout change.
const BIN_ATMOSPHERE_VERSION: u32 = 1;

/// Errors from the reference I/O implementations.
#[derive(Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed record on line {0}: {1}")]
    Malformed(usize, String),
}

/// Supplies an [`Atmosphere`] from some external source (a file, a
/// climatology table, a database row).
pub trait AtmosphereSource {
    fn read_atmosphere(&mut self) -> Result<Atmosphere, IoError>;
}

/// Writes an [`Atmosphere`] to some external sink.
pub trait AtmosphereSink {
    fn write_atmosphere(&mut self, atm: &Atmosphere) -> Result<(), IoError>;
}

/// Supplies an observation set: one altitude/wavenumber grid per
/// measurement and the corresponding measured radiances.
pub trait ObservationSource {
    fn read_observations(&mut self) -> Result<Vec<Vec<f64>>, IoError>;
}

/// Writes an observation set.
pub trait ObservationSink {
    fn write_observations(&mut self, obs: &[Vec<f64>]) -> Result<(), IoError>;
}

/// Writes a tagged matrix (e.g. the retrieval's posterior covariance or
/// averaging kernel) to some external sink.
pub trait MatrixSink {
    fn write_matrix(&mut self, matrix: &nalgebra::DMatrix<f64>) -> Result<(), IoError>;
}

/// Supplies a single `(channel, gas)` absorption table, deferring the
/// per-(d,g) file layout (ascii or binary, per `spec.md` §6) to the
/// caller; `limbtrace` only consumes the resulting [`GasTable`].
pub trait LutSource {
    fn read_gas_table(&mut self) -> Result<crate::lut::GasTable, IoError>;
}

/// A minimal whitespace-delimited ASCII atmosphere format: one header
/// line with the level count, then one line per level with
/// `z p t q0 q1 ...`.
pub struct AsciiAtmosphere<S> {
    stream: S,
}

impl<S> AsciiAtmosphere<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S: Read> AtmosphereSource for AsciiAtmosphere<S> {
    fn read_atmosphere(&mut self) -> Result<Atmosphere, IoError> {
        let mut text = String::new();
        self.stream.read_to_string(&mut text)?;
        let mut lines = text.lines().enumerate();

        let (_, header) = lines
            .next()
            .ok_or_else(|| IoError::Malformed(0, "missing header".to_string()))?;
        let num_levels: usize = header
            .trim()
            .parse()
            .map_err(|_| IoError::Malformed(1, "expected level count".to_string()))?;

        let mut z = Vec::with_capacity(num_levels);
        let mut p = Vec::with_capacity(num_levels);
        let mut t = Vec::with_capacity(num_levels);
        let mut q: Vec<Vec<f64>> = Vec::new();

        for _ in 0..num_levels {
            let (lineno, line) = lines
                .next()
                .ok_or_else(|| IoError::Malformed(0, "unexpected end of file".to_string()))?;
            let fields: Vec<f64> = line
                .split_whitespace()
                .map(|f| f.parse())
                .collect::<Result<_, _>>()
                .map_err(|_| IoError::Malformed(lineno + 1, line.to_string()))?;
            if fields.len() < 3 {
                return Err(IoError::Malformed(lineno + 1, line.to_string()));
            }
            z.push(fields[0]);
            p.push(fields[1]);
            t.push(fields[2]);
            for (gas, &value) in fields[3..].iter().enumerate() {
                if q.len() <= gas {
                    q.push(Vec::with_capacity(num_levels));
                }
                q[gas].push(value);
            }
        }

        Ok(Atmosphere {
            z,
            p,
            t,
            q,
            k: vec![],
            cloud: CloudParams::default(),
            surface: SurfaceParams::default(),
        })
    }
}

impl<S: Write> AtmosphereSink for AsciiAtmosphere<S> {
    fn write_atmosphere(&mut self, atm: &Atmosphere) -> Result<(), IoError> {
        writeln!(self.stream, "{}", atm.z.len())?;
        for i in 0..atm.z.len() {
            write!(self.stream, "{} {} {}", atm.z[i], atm.p[i], atm.t[i])?;
            for gas in &atm.q {
                write!(self.stream, " {}", gas[i])?;
            }
            writeln!(self.stream)?;
        }
        Ok(())
    }
}

/// The binary variant of the atmosphere file: a versioned packed record
/// of `(z, p, t)` level arrays followed by one array per absorbing gas,
/// all little-endian `f64`. Cloud and surface blocks are not carried;
/// callers that need them fall back to the ASCII variant or attach
/// defaults after reading.
pub struct BinAtmosphere<S> {
    stream: S,
}

impl<S> BinAtmosphere<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S: Read> AtmosphereSource for BinAtmosphere<S> {
    fn read_atmosphere(&mut self) -> Result<Atmosphere, IoError> {
        let version = self.stream.read_u32::<LittleEndian>()?;
        if version != BIN_ATMOSPHERE_VERSION {
            return Err(IoError::Malformed(
                0,
                format!("unsupported binary atmosphere version {version}"),
            ));
        }
        let num_levels = self.stream.read_u32::<LittleEndian>()? as usize;
        let num_gases = self.stream.read_u32::<LittleEndian>()? as usize;

        let mut read_array = |n: usize| -> Result<Vec<f64>, IoError> {
            (0..n)
                .map(|_| self.stream.read_f64::<LittleEndian>().map_err(IoError::from))
                .collect()
        };

        let z = read_array(num_levels)?;
        let p = read_array(num_levels)?;
        let t = read_array(num_levels)?;
        let q = (0..num_gases)
            .map(|_| read_array(num_levels))
            .collect::<Result<_, _>>()?;

        Ok(Atmosphere {
            z,
            p,
            t,
            q,
            k: vec![],
            cloud: CloudParams::default(),
            surface: SurfaceParams::default(),
        })
    }
}

impl<S: Write> AtmosphereSink for BinAtmosphere<S> {
    fn write_atmosphere(&mut self, atm: &Atmosphere) -> Result<(), IoError> {
        self.stream.write_u32::<LittleEndian>(BIN_ATMOSPHERE_VERSION)?;
        self.stream.write_u32::<LittleEndian>(atm.z.len() as u32)?;
        self.stream.write_u32::<LittleEndian>(atm.q.len() as u32)?;
        for value in atm.z.iter().chain(&atm.p).chain(&atm.t) {
            self.stream.write_f64::<LittleEndian>(*value)?;
        }
        for gas in &atm.q {
            for value in gas {
                self.stream.write_f64::<LittleEndian>(*value)?;
            }
        }
        Ok(())
    }
}
