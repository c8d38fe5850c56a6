//! Description-keyed stage sharing with barrier-deferred training.
//!
//! A [`SharedStageRegistry`] is an explicit object, created once and
//! passed by `Arc` to every handle; multiple registries can coexist.
//! One mutex guards the instance map, the pending reference counts, and
//! the pending training buffers, and stays held across the whole
//! check-decrement-maybe-train sequence so two last contributors can
//! never both fire training.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sample::{Sample, SampleCollection};
use crate::stage::factory::StageFactory;
use crate::stage::{Stage, StageError};

struct SharedEntry {
    stage: Arc<Mutex<Box<dyn Stage>>>,
    /// Handles currently bound to this description.
    bound: usize,
    /// Contributions still outstanding before training fires.
    pending: usize,
    buffer: SampleCollection,
}

/// Registry of shared stage instances keyed by description.
pub struct SharedStageRegistry {
    factory: StageFactory,
    entries: Mutex<HashMap<String, SharedEntry>>,
}

impl SharedStageRegistry {
    /// Create a registry constructing stages through `factory`.
    pub fn new(factory: StageFactory) -> Arc<Self> {
        Arc::new(Self {
            factory,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Bind a new handle to the shared stage for `description`,
    /// constructing the stage on first reference.
    ///
    /// The first handle bound to a description becomes its serialization
    /// owner; every later handle's `save`/`load` is a no-op.
    pub fn handle(self: &Arc<Self>, description: &str) -> Result<SharedStageHandle, StageError> {
        let mut entries = lock_entries(&self.entries);
        let owner = !entries.contains_key(description);
        if owner {
            let stage = self.factory.construct(description)?;
            entries.insert(
                description.to_string(),
                SharedEntry {
                    stage: Arc::new(Mutex::new(stage)),
                    bound: 0,
                    pending: 0,
                    buffer: SampleCollection::new(),
                },
            );
        }
        let entry = entries
            .get_mut(description)
            .ok_or_else(|| StageError::UnknownStage(description.to_string()))?;
        entry.bound += 1;
        entry.pending += 1;
        Ok(SharedStageHandle {
            registry: Arc::clone(self),
            stage: Arc::clone(&entry.stage),
            description: description.to_string(),
            owner,
        })
    }

    /// Outstanding training contributions for `description`, if bound.
    pub fn pending(&self, description: &str) -> Option<usize> {
        lock_entries(&self.entries)
            .get(description)
            .map(|entry| entry.pending)
    }
}

fn lock_entries<'a>(
    entries: &'a Mutex<HashMap<String, SharedEntry>>,
) -> MutexGuard<'a, HashMap<String, SharedEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_stage<'a>(stage: &'a Mutex<Box<dyn Stage>>) -> MutexGuard<'a, Box<dyn Stage>> {
    stage.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One pipeline instance's view of a shared stage.
pub struct SharedStageHandle {
    registry: Arc<SharedStageRegistry>,
    stage: Arc<Mutex<Box<dyn Stage>>>,
    description: String,
    owner: bool,
}

impl std::fmt::Debug for SharedStageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStageHandle")
            .field("description", &self.description)
            .field("owner", &self.owner)
            .finish()
    }
}

impl SharedStageHandle {
    /// Description this handle is bound to.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when this handle performs the actual stream reads/writes.
    pub fn is_serialization_owner(&self) -> bool {
        self.owner
    }

    /// Bind another handle to the same entry without going through the
    /// factory. The entry exists for as long as any handle does.
    fn rebind(&self) -> SharedStageHandle {
        let mut entries = lock_entries(&self.registry.entries);
        if let Some(entry) = entries.get_mut(&self.description) {
            entry.bound += 1;
            entry.pending += 1;
        }
        SharedStageHandle {
            registry: Arc::clone(&self.registry),
            stage: Arc::clone(&self.stage),
            description: self.description.clone(),
            owner: false,
        }
    }
}

impl Stage for SharedStageHandle {
    fn name(&self) -> &str {
        &self.description
    }

    fn trainable(&self) -> bool {
        lock_stage(&self.stage).trainable()
    }

    /// Record this handle's contribution; the underlying stage trains
    /// once, after every bound handle has contributed, on the union of
    /// all contributions. The pending count then rearms to the number of
    /// bound handles so a later round can fire again.
    fn train(&mut self, data: &SampleCollection) -> Result<(), StageError> {
        let mut entries = lock_entries(&self.registry.entries);
        let entry = entries
            .get_mut(&self.description)
            .ok_or(StageError::Uninitialized)?;
        entry.buffer.append(data.clone());
        entry.pending = entry.pending.saturating_sub(1);
        if entry.pending > 0 {
            return Ok(());
        }
        let accumulated = std::mem::take(&mut entry.buffer);
        entry.pending = entry.bound;
        let stage = Arc::clone(&entry.stage);
        // Registry lock intentionally held across the training call.
        lock_stage(&stage).train(&accumulated)
    }

    fn project(&self, sample: &Sample) -> Result<Sample, StageError> {
        lock_stage(&self.stage).project(sample)
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(self.rebind())
    }

    fn save(&self, writer: &mut dyn Write) -> Result<(), StageError> {
        if !self.owner {
            return Ok(());
        }
        lock_stage(&self.stage).save(writer)
    }

    fn load(&mut self, reader: &mut dyn Read) -> Result<(), StageError> {
        if !self.owner {
            return Ok(());
        }
        lock_stage(&self.stage).load(reader)
    }
}
