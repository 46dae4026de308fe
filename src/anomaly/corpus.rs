use std::collections::VecDeque;

/// Bounded FIFO of historical feature rows. The oldest rows fall off first.
#[derive(Debug)]
pub struct RollingCorpus<const N: usize> {
    rows: VecDeque<[f64; N]>,
    cap: usize,
}

impl<const N: usize> RollingCorpus<N> {
    pub fn new(cap: usize) -> Self {
        Self {
            rows: VecDeque::new(),
            cap,
        }
    }

    pub fn extend(&mut self, batch: &[[f64; N]]) {
        self.rows.extend(batch.iter().copied());
        let excess = self.rows.len().saturating_sub(self.cap);
        self.rows.drain(..excess);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.cap
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Contiguous copy of the rows, oldest first.
    pub fn to_vec(&self) -> Vec<[f64; N]> {
        self.rows.iter().copied().collect()
    }
}
