//! Pass-through stage; the default factory description.

use std::io::{Read, Write};

use crate::sample::Sample;
use crate::stage::{Stage, StageError};

/// Non-trainable stage that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStage;

impl Stage for IdentityStage {
    fn name(&self) -> &str {
        "identity"
    }

    fn project(&self, sample: &Sample) -> Result<Sample, StageError> {
        Ok(sample.clone())
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(IdentityStage)
    }

    fn save(&self, _writer: &mut dyn Write) -> Result<(), StageError> {
        Ok(())
    }

    fn load(&mut self, _reader: &mut dyn Read) -> Result<(), StageError> {
        Ok(())
    }
}
