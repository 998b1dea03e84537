use super::Block;

/// Remembers the last block we notified about.
///
/// Owned by the block watcher, so `&mut self` is the only synchronization
/// needed. Starts empty, which makes the first successful fetch always new.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_acknowledged: Option<Block>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any height different from the acknowledged one counts, including a lower one.
    pub fn is_new_event(&self, candidate: &Block) -> bool {
        match &self.last_acknowledged {
            Some(last) => last.height != candidate.height,
            None => true,
        }
    }

    pub fn acknowledge(&mut self, candidate: Block) {
        self.last_acknowledged = Some(candidate);
    }
}
