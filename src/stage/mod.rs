//! Trainable, composable data-transform stages.
//!
//! A [`Stage`] is the unit a pipeline trains and runs: it can learn from a
//! sample collection, project single samples, clone itself into an
//! independent trainable copy, and persist its learned state to a byte
//! stream. Composers in this module wrap other stages: [`downsample`]
//! reduces training data first, [`independent`] fans a multi-part sample
//! out over per-part clones, and [`shared`] lets many pipeline instances
//! share one stage keyed by description.

pub mod center;
pub mod downsample;
pub mod factory;
pub mod identity;
pub mod independent;
pub mod shared;

use std::io::{Read, Write};

use thiserror::Error;

use crate::sample::{Sample, SampleCollection};

/// Errors surfaced by stage lifecycle operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// Stream error while saving or loading stage state.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Persisted stage state did not match what the stage expects.
    #[error("corrupt stage state: {0}")]
    Corrupt(String),
    /// No constructor is registered under the requested description.
    #[error("unknown stage description: {0}")]
    UnknownStage(String),
    /// `project` was called before the stage had any trained or loaded state.
    #[error("stage has no materialized state; train or load before projecting")]
    Uninitialized,
    /// Training could not complete.
    #[error("training failed: {0}")]
    Training(String),
}

/// Capability surface every pipeline stage exposes.
///
/// `Send + Sync` so clones can be handed to training worker threads and
/// prototypes can be shared read-only across them.
pub trait Stage: Send + Sync {
    /// Identifier this stage is known by (factory description).
    fn name(&self) -> &str;

    /// True when `train` learns state. Non-trainable stages treat `train`
    /// as a no-op.
    fn trainable(&self) -> bool {
        false
    }

    /// Learn from `data`. Default is the non-trainable no-op.
    fn train(&mut self, _data: &SampleCollection) -> Result<(), StageError> {
        Ok(())
    }

    /// Transform one sample. Must not mutate state visible to concurrent
    /// callers.
    fn project(&self, sample: &Sample) -> Result<Sample, StageError>;

    /// Produce an independent, trainable copy sharing no mutable state
    /// with `self`.
    fn clone_stage(&self) -> Box<dyn Stage>;

    /// Write learned state to `writer`.
    fn save(&self, writer: &mut dyn Write) -> Result<(), StageError>;

    /// Replace learned state with state read from `reader`.
    fn load(&mut self, reader: &mut dyn Read) -> Result<(), StageError>;
}

impl std::fmt::Debug for dyn Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("trainable", &self.trainable())
            .finish()
    }
}

/// Write a `u32` in little-endian form.
pub(crate) fn write_u32(writer: &mut dyn Write, value: u32) -> Result<(), StageError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Read a little-endian `u32`.
pub(crate) fn read_u32(reader: &mut dyn Read) -> Result<u32, StageError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Write a length-prefixed `f32` slice in little-endian form.
pub(crate) fn write_f32s(writer: &mut dyn Write, values: &[f32]) -> Result<(), StageError> {
    write_u32(writer, values.len() as u32)?;
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Read a length-prefixed little-endian `f32` vector.
pub(crate) fn read_f32s(reader: &mut dyn Read) -> Result<Vec<f32>, StageError> {
    let len = read_u32(reader)? as usize;
    let mut values = Vec::with_capacity(len.min(1 << 20));
    let mut buf = [0u8; 4];
    for _ in 0..len {
        reader.read_exact(&mut buf)?;
        values.push(f32::from_le_bytes(buf));
    }
    Ok(values)
}
