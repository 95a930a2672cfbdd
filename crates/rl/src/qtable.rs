//! Dense `(state x action)` value table and its on-disk form.
//!
//! Files start with a fixed [`Header`] followed by the row-major values as
//! little-endian `f64`, so a save/load round trip is bit-exact on any host.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, QTableError};

const MAGIC: [u8; 8] = *b"POLINQT1";

/// Counts are stored little-endian.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Header {
    magic: [u8; 8],
    n_states: u64,
    n_actions: u64,
}

/// Rule for picking among equal maxima of a row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lowest action index.
    #[default]
    First,
    /// Uniformly among the tied actions, drawn from the agent's RNG.
    Random,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QTable {
    n_states: usize,
    n_actions: usize,
    values: Vec<f64>,
}

impl QTable {
    #[must_use]
    pub fn zeros(n_states: usize, n_actions: usize) -> Self {
        Self { n_states, n_actions, values: vec![0.0; n_states * n_actions] }
    }

    /// # Errors
    ///
    /// [`AgentError::ShapeMismatch`] unless `values.len() == n_states * n_actions`.
    pub fn from_vec(n_states: usize, n_actions: usize, values: Vec<f64>) -> Result<Self, AgentError> {
        let expected = n_states * n_actions;
        if values.len() != expected {
            return Err(AgentError::ShapeMismatch { expected, got: values.len() });
        }
        Ok(Self { n_states, n_actions, values })
    }

    #[must_use]
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    #[must_use]
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// # Errors
    ///
    /// [`AgentError::StateOutOfRange`].
    pub fn row(&self, state: usize) -> Result<&[f64], AgentError> {
        self.check_state(state)?;
        Ok(&self.values[state * self.n_actions..(state + 1) * self.n_actions])
    }

    /// # Errors
    ///
    /// Out-of-range state or action.
    pub fn get(&self, state: usize, action: usize) -> Result<f64, AgentError> {
        let i = self.offset(state, action)?;
        Ok(self.values[i])
    }

    /// # Errors
    ///
    /// Out-of-range state or action.
    pub fn set(&mut self, state: usize, action: usize, value: f64) -> Result<(), AgentError> {
        let i = self.offset(state, action)?;
        self.values[i] = value;
        Ok(())
    }

    /// Largest value in a row.
    ///
    /// # Errors
    ///
    /// [`AgentError::StateOutOfRange`].
    pub fn max(&self, state: usize) -> Result<f64, AgentError> {
        Ok(self.row(state)?.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Greedy action of a row under `tie_break`.
    ///
    /// # Errors
    ///
    /// [`AgentError::StateOutOfRange`], or [`AgentError::ActionOutOfRange`]
    /// for a table without actions.
    pub fn argmax(&self, state: usize, tie_break: TieBreak, rng: &mut fastrand::Rng) -> Result<usize, AgentError> {
        let row = self.row(state)?;
        if row.is_empty() {
            return Err(AgentError::ActionOutOfRange { action: 0, n_actions: 0 });
        }
        let mut best = 0;
        for (a, v) in row.iter().enumerate().skip(1) {
            if *v > row[best] {
                best = a;
            }
        }
        match tie_break {
            TieBreak::First => Ok(best),
            TieBreak::Random => {
                let top = row[best];
                let tied: Vec<usize> = (0..row.len()).filter(|&a| row[a] == top).collect();
                Ok(tied[rng.usize(..tied.len())])
            }
        }
    }

    /// # Errors
    ///
    /// I/O failures.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), QTableError> {
        let header = Header {
            magic: MAGIC,
            n_states: (self.n_states as u64).to_le(),
            n_actions: (self.n_actions as u64).to_le(),
        };
        w.write_all(bytemuck::bytes_of(&header))?;
        for v in &self.values {
            w.write_all(&v.to_le_bytes())?;
        }
        w.flush()?;
        Ok(())
    }

    /// # Errors
    ///
    /// I/O failures, a foreign file ([`QTableError::BadMagic`]) or an
    /// impossible shape.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self, QTableError> {
        let mut raw = [0u8; std::mem::size_of::<Header>()];
        r.read_exact(&mut raw)?;
        let header: Header = bytemuck::pod_read_unaligned(&raw);
        if header.magic != MAGIC {
            return Err(QTableError::BadMagic);
        }
        let n_states = usize::try_from(u64::from_le(header.n_states)).map_err(|_| QTableError::BadMagic)?;
        let n_actions = usize::try_from(u64::from_le(header.n_actions)).map_err(|_| QTableError::BadMagic)?;
        let len = n_states.checked_mul(n_actions).ok_or(QTableError::BadMagic)?;
        let mut values = Vec::with_capacity(len.min(1 << 16));
        let mut word = [0u8; 8];
        for _ in 0..len {
            r.read_exact(&mut word)?;
            values.push(f64::from_le_bytes(word));
        }
        Ok(Self::from_vec(n_states, n_actions, values)?)
    }

    /// # Errors
    ///
    /// See [`QTable::write_to`].
    pub fn save(&self, path: &Path) -> Result<(), QTableError> {
        self.write_to(BufWriter::new(File::create(path)?))
    }

    /// # Errors
    ///
    /// See [`QTable::read_from`].
    pub fn load(path: &Path) -> Result<Self, QTableError> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    fn check_state(&self, state: usize) -> Result<(), AgentError> {
        if state >= self.n_states {
            return Err(AgentError::StateOutOfRange { state, n_states: self.n_states });
        }
        Ok(())
    }

    fn offset(&self, state: usize, action: usize) -> Result<usize, AgentError> {
        self.check_state(state)?;
        if action >= self.n_actions {
            return Err(AgentError::ActionOutOfRange { action, n_actions: self.n_actions });
        }
        Ok(state * self.n_actions + action)
    }
}

/// Directory of per-episode checkpoints,
/// `QLearningAgent_values.ep{N}.qtable`.
#[derive(Clone, Debug)]
pub struct CheckpointDir {
    root: PathBuf,
}

impl CheckpointDir {
    const PREFIX: &'static str = "QLearningAgent_values.ep";
    const SUFFIX: &'static str = ".qtable";

    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, episode: usize) -> PathBuf {
        self.root.join(format!("{}{episode}{}", Self::PREFIX, Self::SUFFIX))
    }

    /// # Errors
    ///
    /// Directory creation or write failures.
    pub fn save(&self, episode: usize, table: &QTable) -> Result<PathBuf, QTableError> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(episode);
        table.save(&path)?;
        Ok(path)
    }

    /// # Errors
    ///
    /// See [`QTable::load`].
    pub fn load(&self, episode: usize) -> Result<QTable, QTableError> {
        QTable::load(&self.path_for(episode))
    }

    /// Highest checkpointed episode, if any.
    ///
    /// # Errors
    ///
    /// Failure to list the directory.
    pub fn latest(&self) -> Result<Option<usize>, QTableError> {
        if !self.root.is_dir() {
            return Ok(None);
        }
        let mut latest = None;
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let episode = name
                .to_str()
                .and_then(|n| n.strip_prefix(Self::PREFIX))
                .and_then(|n| n.strip_suffix(Self::SUFFIX))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(ep) = episode {
                latest = latest.max(Some(ep));
            }
        }
        Ok(latest)
    }
}
