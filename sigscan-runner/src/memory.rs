//! Scan memory: which instruments were already evaluated this super-cycle.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ScanMemory {
    seen: HashSet<String>,
    reset_every: u32,
    cycles: u32,
}

impl ScanMemory {
    /// Memory that forgets everything every `reset_every` cycles (min 1).
    pub fn new(reset_every: u32) -> Self {
        Self {
            seen: HashSet::new(),
            reset_every: reset_every.max(1),
            cycles: 0,
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.seen.contains(symbol)
    }

    pub fn mark(&mut self, symbol: &str) {
        self.seen.insert(symbol.to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Close a cycle. Returns true when this cycle triggered a reset.
    pub fn end_cycle(&mut self) -> bool {
        self.cycles += 1;
        if self.cycles >= self.reset_every {
            self.cycles = 0;
            self.seen.clear();
            true
        } else {
            false
        }
    }

    /// Shuffle `symbols`, take up to `n` not yet seen, and mark them.
    pub fn sample<R: Rng + ?Sized>(&mut self, symbols: &[String], n: usize, rng: &mut R) -> Vec<String> {
        let mut pool: Vec<&String> = symbols.iter().filter(|s| !self.contains(s)).collect();
        pool.shuffle(rng);
        let picked: Vec<String> = pool.into_iter().take(n).cloned().collect();
        for s in &picked {
            self.mark(s);
        }
        picked
    }
}
