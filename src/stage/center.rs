//! Mean-centering stage: learns the elementwise mean of its training parts
//! and subtracts it during projection.

use std::io::{Read, Write};

use crate::sample::{Sample, SampleCollection};
use crate::stage::{Stage, StageError, read_f32s, write_f32s};

/// Trainable stage subtracting a learned per-slot mean from every part.
#[derive(Debug, Clone, Default)]
pub struct CenterStage {
    mean: Vec<f32>,
}

impl CenterStage {
    /// Create an untrained centering stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned mean, empty until trained or loaded.
    pub fn mean(&self) -> &[f32] {
        &self.mean
    }
}

impl Stage for CenterStage {
    fn name(&self) -> &str {
        "center"
    }

    fn trainable(&self) -> bool {
        true
    }

    fn train(&mut self, data: &SampleCollection) -> Result<(), StageError> {
        let mut sums: Vec<f64> = Vec::new();
        let mut count = 0usize;
        for sample in data {
            for part in &sample.parts {
                if sums.is_empty() {
                    sums = vec![0.0; part.len()];
                } else if part.len() != sums.len() {
                    return Err(StageError::Training(format!(
                        "inconsistent part length {} (expected {})",
                        part.len(),
                        sums.len()
                    )));
                }
                for (sum, value) in sums.iter_mut().zip(part) {
                    *sum += f64::from(*value);
                }
                count += 1;
            }
        }
        if count == 0 {
            return Err(StageError::Training("empty training set".to_string()));
        }
        self.mean = sums
            .into_iter()
            .map(|sum| (sum / count as f64) as f32)
            .collect();
        Ok(())
    }

    fn project(&self, sample: &Sample) -> Result<Sample, StageError> {
        if self.mean.is_empty() {
            return Err(StageError::Uninitialized);
        }
        let mut out = Sample::new(sample.metadata.clone());
        for part in &sample.parts {
            if part.len() != self.mean.len() {
                return Err(StageError::Corrupt(format!(
                    "part length {} does not match trained mean length {}",
                    part.len(),
                    self.mean.len()
                )));
            }
            out.parts.push(
                part.iter()
                    .zip(&self.mean)
                    .map(|(value, mean)| value - mean)
                    .collect(),
            );
        }
        Ok(out)
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(self.clone())
    }

    fn save(&self, writer: &mut dyn Write) -> Result<(), StageError> {
        write_f32s(writer, &self.mean)
    }

    fn load(&mut self, reader: &mut dyn Read) -> Result<(), StageError> {
        self.mean = read_f32s(reader)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::sample::Metadata;

    fn single(values: &[f32]) -> Sample {
        Sample::single(Metadata::new(), values.to_vec())
    }

    #[test]
    fn learns_and_subtracts_the_mean() {
        let data: SampleCollection =
            vec![single(&[1.0, 10.0]), single(&[3.0, 30.0])].into();
        let mut stage = CenterStage::new();
        stage.train(&data).unwrap();
        assert_eq!(stage.mean(), &[2.0, 20.0]);

        let out = stage.project(&single(&[5.0, 25.0])).unwrap();
        assert_eq!(out.parts[0], vec![3.0, 5.0]);
    }

    #[test]
    fn empty_training_set_is_an_error() {
        let mut stage = CenterStage::new();
        let err = stage.train(&SampleCollection::new()).unwrap_err();
        assert!(matches!(err, StageError::Training(_)));
    }

    #[test]
    fn projection_before_training_is_uninitialized() {
        let stage = CenterStage::new();
        let err = stage.project(&single(&[1.0])).unwrap_err();
        assert!(matches!(err, StageError::Uninitialized));
    }

    #[test]
    fn state_round_trips_through_a_stream() {
        let data: SampleCollection = vec![single(&[4.0]), single(&[6.0])].into();
        let mut stage = CenterStage::new();
        stage.train(&data).unwrap();

        let mut bytes = Vec::new();
        stage.save(&mut bytes).unwrap();

        let mut restored = CenterStage::new();
        restored.load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(restored.mean(), stage.mean());
    }

    #[test]
    fn mismatched_part_length_is_corrupt() {
        let data: SampleCollection = vec![single(&[1.0, 2.0])].into();
        let mut stage = CenterStage::new();
        stage.train(&data).unwrap();
        let err = stage.project(&single(&[1.0])).unwrap_err();
        assert!(matches!(err, StageError::Corrupt(_)));
    }
}
