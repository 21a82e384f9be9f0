/// Stepping direction along the feed axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Back,
}

/// Holds the current index into the catalog and applies wrap-around
/// stepping. This is plain single-threaded state; the engine facade
/// serializes every mutation behind one lock, and an invalid target is a
/// silent no-op rather than an error.
#[derive(Debug, Default)]
pub struct NavigationController {
    current: usize,
    len: usize,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-anchor on a (new) catalog. `index` beyond the end clamps to 0.
    pub fn reset(&mut self, len: usize, index: usize) {
        self.len = len;
        self.current = if index < len { index } else { 0 };
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Advance or retreat one position, wrapping modulo the catalog length.
    /// Returns the new index, or `None` when the catalog is empty.
    pub fn step(&mut self, direction: Direction) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.current = match direction {
            Direction::Forward => (self.current + 1) % self.len,
            Direction::Back => (self.current + self.len - 1) % self.len,
        };
        Some(self.current)
    }

    /// Jump straight to `index`. Out-of-range targets and empty catalogs
    /// leave the current index unchanged and return `None`.
    pub fn seek(&mut self, index: usize) -> Option<usize> {
        if index >= self.len {
            return None;
        }
        self.current = index;
        Some(self.current)
    }
}
