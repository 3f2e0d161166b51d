use crate::buffer::AudioBuffer;
use crate::plugin::{AudioProcessor, PluginDescriptor};

/// Index of a cloned processor inside a [`PluginArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginSlot(usize);

/// Owns every processor cloned for one render session. Strips refer to their
/// chain by slot; dropping the arena releases all clones at once.
#[derive(Default)]
pub struct PluginArena {
    processors: Vec<Box<dyn AudioProcessor>>,
}

impl PluginArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, processor: Box<dyn AudioProcessor>) -> PluginSlot {
        self.processors.push(processor);
        PluginSlot(self.processors.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn descriptor(&self, slot: PluginSlot) -> Option<PluginDescriptor> {
        self.processors.get(slot.0).map(|processor| processor.descriptor())
    }

    /// Longest tail reported by the cloned processors of `chain`.
    pub fn tail_seconds(&self, chain: &[PluginSlot]) -> f64 {
        chain
            .iter()
            .filter_map(|slot| self.processors.get(slot.0))
            .map(|processor| processor.tail_seconds())
            .fold(0.0, f64::max)
    }

    pub fn process_chain(&mut self, chain: &[PluginSlot], buffer: &mut AudioBuffer) -> anyhow::Result<()> {
        for slot in chain {
            if let Some(processor) = self.processors.get_mut(slot.0) {
                processor.process(buffer)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PluginArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginArena")
            .field("processors", &self.processors.len())
            .finish()
    }
}
