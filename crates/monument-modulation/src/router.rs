//! Per-block modulation offsets.
//!
//! [`ModulationRouter`] lives in the audio context. Once per block it picks
//! up the latest published [`ConnectionSet`], advances every source, and
//! produces one offset per destination parameter in [-1, 1]. The
//! [`RouterHandle`] is its control-context counterpart.
//!
//! Each connection slot owns a one-pole smoother evaluated at block rate.
//! When a new set changes what a slot points at, the old contribution is
//! moved to a retiring pool that glides it to zero on its old destination,
//! and the slot restarts from zero, so publication never steps an offset.

use monument_core::TempoContext;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::connection::{ConnectionSet, MAX_CONNECTIONS, ModulationConnection};
use crate::error::ModulationError;
use crate::snapshot::{Publisher, Reader};
use crate::sources::{SourceBank, SourceId, block_coeff};

/// Retiring contributions smaller than this are released.
const RETIRE_FLOOR: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    key: Option<(SourceId, u8, u32)>,
    value: f32,
    smoothing_ms: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Retiring {
    destination: u32,
    value: f32,
    smoothing_ms: f32,
}

/// Control-context handle for publishing connection sets.
#[derive(Clone)]
pub struct RouterHandle {
    publisher: Publisher<ConnectionSet>,
    param_count: usize,
}

impl RouterHandle {
    /// Validate and publish a set. The router picks it up at its next block.
    pub fn publish(&self, mut set: ConnectionSet) -> Result<(), ModulationError> {
        if let Err(err) = set.validate(self.param_count) {
            tracing::warn!(%err, "connection set rejected");
            return Err(err);
        }
        tracing::debug!(connections = set.len(), "publishing connection set");
        self.publisher.publish(set);
        Ok(())
    }

    /// The most recently published set.
    pub fn current(&self) -> ConnectionSet {
        ConnectionSet::clone(&self.publisher.current())
    }

    /// Free sets the router has moved past.
    pub fn collect_garbage(&self) -> usize {
        let freed = self.publisher.collect_garbage();
        if freed > 0 {
            tracing::trace!(freed, "reclaimed connection sets");
        }
        freed
    }

    /// Number of destinations sets are validated against.
    pub fn param_count(&self) -> usize {
        self.param_count
    }
}

/// Audio-context modulation router.
pub struct ModulationRouter {
    reader: Reader<ConnectionSet>,
    sources: SourceBank,
    slots: [SlotState; MAX_CONNECTIONS],
    retiring: [Retiring; MAX_CONNECTIONS],
    offsets: Vec<f32>,
    rng: ChaCha8Rng,
    seed: u64,
    sample_rate: f32,
}

impl ModulationRouter {
    /// A router over `param_count` destinations with an empty connection set.
    pub fn new(param_count: usize, sample_rate: f32, seed: u64) -> (Self, RouterHandle) {
        let publisher = Publisher::new(ConnectionSet::new());
        let router = Self {
            reader: publisher.reader(),
            sources: SourceBank::new(sample_rate),
            slots: [SlotState::default(); MAX_CONNECTIONS],
            retiring: [Retiring::default(); MAX_CONNECTIONS],
            offsets: vec![0.0; param_count],
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            sample_rate,
        };
        (router, RouterHandle { publisher, param_count })
    }

    /// Change sample rate. Smoother state is kept.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.sources.set_sample_rate(sample_rate);
    }

    /// Seed used by [`reset`](Self::reset).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Change the seed and reset.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.reset();
    }

    /// Clear sources and smoothers and restart the random stream.
    pub fn reset(&mut self) {
        self.sources.reset();
        for slot in &mut self.slots {
            slot.value = 0.0;
        }
        self.retiring = [Retiring::default(); MAX_CONNECTIONS];
        self.offsets.fill(0.0);
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    /// Offsets from the last [`compute_offsets`](Self::compute_offsets).
    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }

    /// Offset for one destination from the last block.
    #[inline]
    pub fn offset(&self, destination: usize) -> f32 {
        self.offsets.get(destination).copied().unwrap_or(0.0)
    }

    /// Run one block: refresh the set, update sources, smooth, gate, sum and
    /// clamp. `left` and `right` are the block's input.
    pub fn compute_offsets(&mut self, left: &[f32], right: &[f32], tempo: &TempoContext) -> &[f32] {
        if self.reader.refresh() {
            self.reconcile();
        }
        let len = left.len();
        let set = self.reader.get();
        self.sources.update(left, right, set.lfos(), tempo, &mut self.rng);
        self.offsets.fill(0.0);

        for (slot, connection) in self.slots.iter_mut().zip(set.connections()) {
            let target = if connection.enabled {
                connection.contribution(self.sources.value(connection.source, connection.channel))
            } else {
                0.0
            };
            let coeff = block_coeff(len, self.sample_rate, connection.smoothing_ms * 0.001);
            slot.value = target + coeff * (slot.value - target);
            slot.smoothing_ms = connection.smoothing_ms;

            if !gate(&mut self.rng, connection) {
                continue;
            }
            if let Some(offset) = self.offsets.get_mut(connection.destination as usize) {
                *offset += slot.value;
            }
        }

        for retiring in &mut self.retiring {
            if retiring.value == 0.0 {
                continue;
            }
            retiring.value *= block_coeff(len, self.sample_rate, retiring.smoothing_ms * 0.001);
            if retiring.value.abs() < RETIRE_FLOOR {
                retiring.value = 0.0;
            }
            if let Some(offset) = self.offsets.get_mut(retiring.destination as usize) {
                *offset += retiring.value;
            }
        }

        for offset in &mut self.offsets {
            *offset = offset.clamp(-1.0, 1.0);
        }
        &self.offsets
    }

    /// Match slot state to a freshly loaded set.
    fn reconcile(&mut self) {
        let set = self.reader.get();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let key = set.get(i).map(ModulationConnection::key);
            if slot.key == key {
                continue;
            }
            if let Some((_, _, destination)) = slot.key {
                if slot.value != 0.0 {
                    retire(&mut self.retiring, destination, slot.value, slot.smoothing_ms);
                }
            }
            *slot = SlotState { key, value: 0.0, smoothing_ms: slot.smoothing_ms };
        }
    }
}

/// Park a contribution in the retiring pool, merging with one already
/// gliding on the same destination, else taking the quietest entry.
fn retire(pool: &mut [Retiring], destination: u32, value: f32, smoothing_ms: f32) {
    let index = pool
        .iter()
        .position(|r| r.value != 0.0 && r.destination == destination)
        .or_else(|| pool.iter().position(|r| r.value == 0.0))
        .or_else(|| {
            pool.iter()
                .enumerate()
                .min_by(|a, b| a.1.value.abs().total_cmp(&b.1.value.abs()))
                .map(|(i, _)| i)
        });
    if let Some(entry) = index.and_then(|i| pool.get_mut(i)) {
        let merged = if entry.value != 0.0 && entry.destination == destination { entry.value } else { 0.0 };
        *entry = Retiring { destination, value: merged + value, smoothing_ms };
    }
}

/// Per-block Bernoulli gate. Certain outcomes draw nothing.
#[inline]
fn gate(rng: &mut ChaCha8Rng, connection: &ModulationConnection) -> bool {
    if connection.probability >= 1.0 {
        true
    } else if connection.probability <= 0.0 {
        false
    } else {
        rng.random::<f32>() < connection.probability
    }
}
