//! Per-part independent composition.
//!
//! Splits each multi-part training sample into aligned single-part
//! sub-collections, trains one prototype clone per sub-collection on its
//! own worker thread, and projects parts round-robin through the clones.

use std::io::{Read, Write};
use std::thread;

use crate::sample::{Sample, SampleCollection};
use crate::stage::{Stage, StageError, read_u32, write_u32};

/// Composer applying clones of one prototype stage to each sample part
/// independently.
pub struct IndependentStage {
    prototype: Box<dyn Stage>,
    clones: Vec<Box<dyn Stage>>,
}

impl IndependentStage {
    /// Wrap `prototype`; clones are materialized lazily from training data
    /// or loaded state.
    pub fn new(prototype: Box<dyn Stage>) -> Self {
        Self {
            prototype,
            clones: Vec::new(),
        }
    }

    /// Number of materialized per-part clones.
    pub fn clone_count(&self) -> usize {
        self.clones.len()
    }

    fn extend_clones(&mut self, count: usize) {
        while self.clones.len() < count {
            self.clones.push(self.prototype.clone_stage());
        }
    }

    /// Regroup multi-part samples into aligned per-part sub-collections.
    ///
    /// The sub-collection list grows to the largest part count seen and
    /// never shrinks; a mismatch against earlier samples is logged, not
    /// fatal.
    fn regroup(&self, data: &SampleCollection) -> Vec<SampleCollection> {
        let mut groups: Vec<SampleCollection> = Vec::new();
        for sample in data {
            if !groups.is_empty() && groups.len() != sample.parts.len() {
                tracing::warn!(
                    stage = self.prototype.name(),
                    expected = groups.len(),
                    actual = sample.parts.len(),
                    "sample part count differs from the established part count"
                );
            }
            while groups.len() < sample.parts.len() {
                groups.push(SampleCollection::new());
            }
            for (index, part) in sample.parts.iter().enumerate() {
                groups[index].push(Sample::single(sample.metadata.clone(), part.clone()));
            }
        }
        groups
    }
}

impl Stage for IndependentStage {
    fn name(&self) -> &str {
        "independent"
    }

    fn trainable(&self) -> bool {
        self.prototype.trainable()
    }

    fn train(&mut self, data: &SampleCollection) -> Result<(), StageError> {
        if !self.trainable() {
            return Ok(());
        }

        let groups = self.regroup(data);
        self.extend_clones(groups.len());

        // One worker per sub-collection; each exclusively owns its clone.
        // All workers are joined before any failure is reported.
        let results: Vec<Result<(), StageError>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .clones
                .iter_mut()
                .zip(&groups)
                .map(|(clone, group)| scope.spawn(move || clone.train(group)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(StageError::Training("training worker panicked".to_string()))
                    })
                })
                .collect()
        });

        for result in results {
            result?;
        }
        Ok(())
    }

    fn project(&self, sample: &Sample) -> Result<Sample, StageError> {
        if self.clones.is_empty() {
            return Err(StageError::Uninitialized);
        }
        let mut out = Sample::new(sample.metadata.clone());
        for (index, part) in sample.parts.iter().enumerate() {
            let single = Sample::single(sample.metadata.clone(), part.clone());
            let projected = self.clones[index % self.clones.len()].project(&single)?;
            out.parts.extend(projected.parts);
        }
        Ok(out)
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(Self {
            prototype: self.prototype.clone_stage(),
            clones: self.clones.iter().map(|clone| clone.clone_stage()).collect(),
        })
    }

    fn save(&self, writer: &mut dyn Write) -> Result<(), StageError> {
        write_u32(writer, self.clones.len() as u32)?;
        for clone in &self.clones {
            clone.save(writer)?;
        }
        Ok(())
    }

    fn load(&mut self, reader: &mut dyn Read) -> Result<(), StageError> {
        let count = read_u32(reader)? as usize;
        self.extend_clones(count);
        for clone in &mut self.clones[..count] {
            clone.load(reader)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::sample::Metadata;
    use crate::stage::center::CenterStage;
    use crate::stage::identity::IdentityStage;

    fn two_part(first: &[f32], second: &[f32]) -> Sample {
        Sample::with_parts(Metadata::new(), vec![first.to_vec(), second.to_vec()])
    }

    fn training_data() -> SampleCollection {
        vec![
            two_part(&[1.0], &[10.0]),
            two_part(&[3.0], &[30.0]),
        ]
        .into()
    }

    #[test]
    fn training_materializes_one_clone_per_part() {
        let mut stage = IndependentStage::new(Box::new(CenterStage::new()));
        stage.train(&training_data()).unwrap();
        assert_eq!(stage.clone_count(), 2);
    }

    #[test]
    fn clones_learn_their_own_part_only() {
        let mut stage = IndependentStage::new(Box::new(CenterStage::new()));
        stage.train(&training_data()).unwrap();

        // Part 0 mean is 2.0, part 1 mean is 20.0.
        let out = stage.project(&two_part(&[2.0], &[20.0])).unwrap();
        assert_eq!(out.parts, vec![vec![0.0], vec![0.0]]);
    }

    #[test]
    fn projection_preserves_metadata_and_part_order() {
        let mut stage = IndependentStage::new(Box::new(CenterStage::new()));
        stage.train(&training_data()).unwrap();

        let mut metadata = Metadata::new();
        metadata.set("Label", "x");
        let input = Sample::with_parts(metadata.clone(), vec![vec![5.0], vec![50.0]]);
        let out = stage.project(&input).unwrap();
        assert_eq!(out.metadata, metadata);
        assert_eq!(out.parts, vec![vec![3.0], vec![30.0]]);
    }

    #[test]
    fn mismatched_part_counts_are_tolerated() {
        let data: SampleCollection = vec![
            two_part(&[1.0], &[10.0]),
            Sample::single(Metadata::new(), vec![3.0]),
        ]
        .into();
        let mut stage = IndependentStage::new(Box::new(CenterStage::new()));
        stage.train(&data).unwrap();
        // The second sub-collection keeps the single contribution it got.
        assert_eq!(stage.clone_count(), 2);
        let out = stage.project(&two_part(&[2.0], &[10.0])).unwrap();
        assert_eq!(out.parts, vec![vec![0.0], vec![0.0]]);
    }

    #[test]
    fn projection_before_training_is_uninitialized() {
        let stage = IndependentStage::new(Box::new(CenterStage::new()));
        let err = stage.project(&two_part(&[1.0], &[2.0])).unwrap_err();
        assert!(matches!(err, StageError::Uninitialized));
    }

    #[test]
    fn non_trainable_prototype_skips_training() {
        let mut stage = IndependentStage::new(Box::new(IdentityStage));
        assert!(!stage.trainable());
        stage.train(&training_data()).unwrap();
        assert_eq!(stage.clone_count(), 0);
    }

    #[test]
    fn failed_sub_training_surfaces_after_all_workers_join() {
        // Inconsistent part lengths inside one group make that clone fail.
        let data: SampleCollection = vec![
            Sample::single(Metadata::new(), vec![1.0, 2.0]),
            Sample::single(Metadata::new(), vec![3.0]),
        ]
        .into();
        let mut stage = IndependentStage::new(Box::new(CenterStage::new()));
        let err = stage.train(&data).unwrap_err();
        assert!(matches!(err, StageError::Training(_)));
    }

    #[test]
    fn state_round_trips_into_a_fresh_instance() {
        let mut stage = IndependentStage::new(Box::new(CenterStage::new()));
        stage.train(&training_data()).unwrap();

        let mut bytes = Vec::new();
        stage.save(&mut bytes).unwrap();

        let mut restored = IndependentStage::new(Box::new(CenterStage::new()));
        restored.load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(restored.clone_count(), 2);

        let input = two_part(&[4.0], &[40.0]);
        assert_eq!(
            restored.project(&input).unwrap(),
            stage.project(&input).unwrap()
        );
    }

    #[test]
    fn cloned_composer_projects_like_the_original() {
        let mut stage = IndependentStage::new(Box::new(CenterStage::new()));
        stage.train(&training_data()).unwrap();
        let cloned = stage.clone_stage();
        let input = two_part(&[1.0], &[15.0]);
        assert_eq!(
            cloned.project(&input).unwrap(),
            stage.project(&input).unwrap()
        );
    }
}
