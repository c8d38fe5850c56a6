//! Stratified downsampling of labeled sample collections.
//!
//! Label inclusion is deterministic for a given pool; which samples of a
//! class survive, and which classes survive past the class cap, is
//! randomized per call. Tests that need exact output pin the random source
//! through [`select_with_rng`].

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::sample::{DEFAULT_LABEL_KEY, Sample, SampleCollection};

/// Parameters controlling stratified downsampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Upper bound on distinct classes kept; `None` keeps every class.
    pub max_classes: Option<usize>,
    /// Per-class instance policy; `None` disables the instance filter.
    ///
    /// A positive value caps each class at exactly that many samples. A
    /// negative value means "at least": classes below the magnitude are
    /// dropped (when `max_classes` is also bounded) and surviving classes
    /// contribute all of their enrolled samples.
    pub min_instances: Option<i64>,
    /// Fraction of the selected samples to keep, in `(0, 1]`.
    pub fraction: f32,
    /// Metadata key holding the class label.
    pub label_key: String,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            max_classes: None,
            min_instances: None,
            fraction: 1.0,
            label_key: DEFAULT_LABEL_KEY.to_string(),
        }
    }
}

/// Downsample `collection` using the thread-local random source.
pub fn select(collection: SampleCollection, params: &SelectionParams) -> SampleCollection {
    select_with_rng(collection, params, &mut rand::rng())
}

/// Downsample `collection` with an injected random source.
///
/// Returns the input unchanged when every filter is inactive.
pub fn select_with_rng<R: Rng + ?Sized>(
    collection: SampleCollection,
    params: &SelectionParams,
    rng: &mut R,
) -> SampleCollection {
    if params.max_classes.is_none() && params.min_instances.is_none() && params.fraction >= 1.0 {
        return collection;
    }

    let at_least = params.min_instances.is_some_and(|value| value < 0);
    let instances = params
        .min_instances
        .map(|value| value.unsigned_abs() as usize);

    let all_labels = collection.labels(&params.label_key);

    // Exclusion-aware counting only engages when the instance filter does.
    let mut counts = collection.count_labels(&params.label_key, instances.is_some());
    if let (Some(min), Some(_)) = (instances, params.max_classes) {
        counts.retain(|_, count| *count >= min);
    }

    // BTreeMap keys come out in ascending lexical order, so everything up
    // to the shuffle below is deterministic for a given pool.
    let mut selected_labels: Vec<String> = counts.into_keys().collect();
    if let Some(max_classes) = params.max_classes {
        if selected_labels.len() < max_classes {
            tracing::warn!(
                requested = max_classes,
                available = selected_labels.len(),
                "downsample requested more classes than are available"
            );
        }
        if selected_labels.len() > max_classes {
            selected_labels.shuffle(rng);
            selected_labels.truncate(max_classes);
        }
    }

    let mut output = SampleCollection::new();
    for label in &selected_labels {
        let mut indices: Vec<usize> = all_labels
            .iter()
            .enumerate()
            .filter(|(index, candidate)| {
                *candidate == label && !collection.samples()[*index].is_excluded()
            })
            .map(|(index, _)| index)
            .collect();
        indices.shuffle(rng);

        let take = match instances {
            Some(max) if !at_least => indices.len().min(max),
            _ => indices.len(),
        };
        for &index in indices.iter().take(take) {
            output.push(collection.samples()[index].clone());
        }
    }

    if params.fraction < 1.0 {
        let mut samples: Vec<Sample> = output.into_iter().collect();
        samples.shuffle(rng);
        samples.truncate((samples.len() as f32 * params.fraction) as usize);
        output = samples.into_iter().collect();
    }

    output
}
