//! Training-time downsampling wrapper.

use std::io::{Read, Write};

use crate::sample::{Sample, SampleCollection};
use crate::selection::{self, SelectionParams};
use crate::stage::{Stage, StageError};

/// Wraps an inner stage and applies stratified downsampling to its
/// training data. Projection passes straight through.
pub struct DownsampleStage {
    inner: Box<dyn Stage>,
    params: SelectionParams,
}

impl DownsampleStage {
    /// Wrap `inner`, downsampling its training data with `params`.
    pub fn new(inner: Box<dyn Stage>, params: SelectionParams) -> Self {
        Self { inner, params }
    }
}

impl Stage for DownsampleStage {
    fn name(&self) -> &str {
        "downsample"
    }

    fn trainable(&self) -> bool {
        self.inner.trainable()
    }

    fn train(&mut self, data: &SampleCollection) -> Result<(), StageError> {
        if !self.inner.trainable() {
            return Ok(());
        }
        let reduced = selection::select(data.clone(), &self.params);
        self.inner.train(&reduced)
    }

    fn project(&self, sample: &Sample) -> Result<Sample, StageError> {
        self.inner.project(sample)
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(Self {
            inner: self.inner.clone_stage(),
            params: self.params.clone(),
        })
    }

    fn save(&self, writer: &mut dyn Write) -> Result<(), StageError> {
        self.inner.save(writer)
    }

    fn load(&mut self, reader: &mut dyn Read) -> Result<(), StageError> {
        self.inner.load(reader)
    }
}
