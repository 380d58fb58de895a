//! Fixed-capacity client arena.
//!
//! Slots are dense: removing a client moves the last slot into its place,
//! so removal is O(1) and order among the survivors carries no meaning.
//! The arena knows nothing about sockets and is tested on plain values.

/// Default number of simultaneously connected viewers.
pub const DEFAULT_CAPACITY: usize = 5;

/// Bounded, unordered collection of connected clients.
#[derive(Debug)]
pub struct ClientRegistry<T> {
    slots: Vec<T>,
    capacity: usize,
}

impl<T> ClientRegistry<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Register a client, returning its slot.
    ///
    /// When the registry is full the client is handed back untouched.
    pub fn insert(&mut self, client: T) -> Result<usize, T> {
        if self.is_full() {
            return Err(client);
        }
        self.slots.push(client);
        Ok(self.slots.len() - 1)
    }

    /// Remove the client in `slot`; the last client takes its place.
    pub fn swap_remove(&mut self, slot: usize) -> Option<T> {
        (slot < self.slots.len()).then(|| self.slots.swap_remove(slot))
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    /// Visit every client; those for which `keep` returns `false` are
    /// removed and returned.
    pub fn sweep<F>(&mut self, mut keep: F) -> Vec<T>
    where
        F: FnMut(&mut T) -> bool,
    {
        let mut removed = Vec::new();
        let mut slot = 0;
        while slot < self.slots.len() {
            if keep(&mut self.slots[slot]) {
                slot += 1;
            } else {
                // The swapped-in client has not been visited yet.
                removed.push(self.slots.swap_remove(slot));
            }
        }
        removed
    }

    /// Remove every client.
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.slots.drain(..)
    }
}

impl<T> Default for ClientRegistry<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ── Tests ────────────────────────────────────────────────────────
