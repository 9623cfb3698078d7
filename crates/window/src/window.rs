use std::collections::VecDeque;

/// Errors from window configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error(
        "window size {window_size} with batch size {batch_size} leaves room for zero batches"
    )]
    ZeroCapacity {
        window_size: usize,
        batch_size: usize,
    },
}

/// Running admission/eviction totals for instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub admitted: usize,
    pub evicted: usize,
    pub visible: usize,
}

/// Bounded FIFO of the batches currently visible.
///
/// Entries are typically render handles; whatever `admit` returns has already
/// left the window and must be disposed of by the caller.
#[derive(Debug, Clone)]
pub struct WindowManager<T> {
    capacity: usize,
    entries: VecDeque<T>,
    stats: WindowStats,
}

impl<T> WindowManager<T> {
    /// Build a window holding `window_size / batch_size` batches.
    pub fn new(window_size: usize, batch_size: usize) -> Result<Self, WindowError> {
        let capacity = window_size.checked_div(batch_size).unwrap_or(0);
        if capacity == 0 {
            return Err(WindowError::ZeroCapacity {
                window_size,
                batch_size,
            });
        }
        Ok(Self::with_capacity(capacity))
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            stats: WindowStats::default(),
        }
    }

    /// Remove the oldest entry if the window is full, so that the next
    /// admission stays within capacity. The caller disposes of it.
    pub fn make_room(&mut self) -> Option<T> {
        if !self.is_full() {
            return None;
        }
        let evicted = self.entries.pop_front();
        if evicted.is_some() {
            self.stats.evicted += 1;
        }
        self.stats.visible = self.entries.len();
        evicted
    }

    /// Admit a new entry. When the window is full the oldest entry is removed
    /// first and handed back.
    pub fn admit(&mut self, entry: T) -> Option<T> {
        let evicted = self.make_room();

        self.entries.push_back(entry);
        self.stats.admitted += 1;
        self.stats.visible = self.entries.len();

        tracing::trace!(
            visible = self.entries.len(),
            capacity = self.capacity,
            evicted = evicted.is_some(),
            "window admission"
        );

        evicted
    }

    /// Maximum number of simultaneously visible entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// The oldest surviving entry.
    pub fn front(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Visible entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }
}
