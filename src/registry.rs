//! The process-wide table of ring buffers and its coordination lock.
//!
//! Buffer-wide operations (creation, deletion, reset of every buffer,
//! teardown) run under a [`GlobalGuard`] obtained from
//! [`BufferRegistry::lock`]. The guard is the state machine: holding it means
//! the registry is locked, dropping it returns the registry to
//! [`LockState::Unlocked`], and [`GlobalGuard::teardown`] is the only way into
//! [`LockState::Uninitialized`]. A guard cannot be requested while one is
//! alive, so nested or partial full locks cannot be expressed.
//!
//! Log calls do not touch the coordination lock. They read the table under a
//! short read lock to clone the target buffer's `Arc`, then write into the
//! buffer.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, MutexGuard, RawMutex, RwLock};

use crate::error::{LogError, Result};
use crate::ring_buffer::{BufferSnapshot, Cursor, RingBuffer};

/// Number of buffers the registry can hold.
pub const MAX_BUFFERS: usize = 5;

/// Index of a buffer in the registry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BufferId(u8);

impl BufferId {
    pub const fn new(raw: u8) -> Self {
        BufferId(raw)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for BufferId {
    fn from(raw: u8) -> Self {
        BufferId(raw)
    }
}

/// State of the coordination lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    /// Before `open` or after teardown.
    Uninitialized,
    Unlocked,
    /// The registry table is locked; buffers keep accepting writes.
    Registry,
    /// The registry and every buffer are locked and logging is disabled.
    Full,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockState::Uninitialized => "uninitialized",
            LockState::Unlocked => "unlocked",
            LockState::Registry => "registry locked",
            LockState::Full => "fully locked",
        };
        f.write_str(name)
    }
}

/// How much a [`GlobalGuard`] locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Only the registry table.
    Registry,
    /// The registry table, every buffer lock, and logging disabled.
    Full,
}

#[derive(Default)]
struct BufferTable {
    buffers: [Option<Arc<RingBuffer>>; MAX_BUFFERS],
    default_id: Option<BufferId>,
}

impl BufferTable {
    fn occupied(&self) -> impl Iterator<Item = (BufferId, &Arc<RingBuffer>)> {
        self.buffers
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (BufferId(i as u8), b)))
    }
}

/// Bounded table of ring buffers plus the default buffer id.
pub struct BufferRegistry {
    gate: Mutex<LockState>,
    table: RwLock<BufferTable>,
    enabled: AtomicBool,
}

impl BufferRegistry {
    /// Creates an empty registry in the [`LockState::Uninitialized`] state.
    pub fn new() -> Self {
        Self {
            gate: Mutex::new(LockState::Uninitialized),
            table: RwLock::new(BufferTable::default()),
            enabled: AtomicBool::new(false),
        }
    }

    /// Moves the registry from uninitialized to unlocked with an empty table.
    ///
    /// # Errors
    ///
    /// [`LogError::AlreadyInitialized`] if the registry is already open.
    pub fn open(&self) -> Result<()> {
        let mut state = self.gate.lock();
        if *state != LockState::Uninitialized {
            return Err(LogError::AlreadyInitialized);
        }
        *self.table.write() = BufferTable::default();
        *state = LockState::Unlocked;
        Ok(())
    }

    /// Acquires the coordination lock.
    ///
    /// Waits while another thread holds it. In [`LockMode::Full`] logging is
    /// disabled and every buffer lock is taken in id order; dropping the guard
    /// releases them in reverse order and restores the previous enabled
    /// state.
    ///
    /// # Errors
    ///
    /// * [`LogError::NotInitialized`] if the registry is not open
    /// * [`LogError::LockState`] if the lock is in any state but unlocked
    pub fn lock(&self, mode: LockMode) -> Result<GlobalGuard<'_>> {
        let mut state = self.gate.lock();
        match *state {
            LockState::Unlocked => {}
            LockState::Uninitialized => return Err(LogError::NotInitialized),
            other => {
                tracing::warn!(state = %other, "coordination lock in unexpected state");
                return Err(LogError::LockState(other));
            }
        }

        let mut guard = GlobalGuard {
            registry: self,
            held: Vec::new(),
            was_enabled: self.is_enabled(),
            torn_down: false,
            state: LockState::Registry,
            gate: {
                *state = LockState::Registry;
                state
            },
        };
        if mode == LockMode::Full {
            self.set_enabled(false);
            let buffers: Vec<Arc<RingBuffer>> = self
                .table
                .read()
                .occupied()
                .map(|(_, b)| Arc::clone(b))
                .collect();
            for buffer in buffers {
                guard.held.push((Arc::clone(&buffer), buffer.lock_cursor_arc()));
            }
            guard.set_state(LockState::Full);
        }
        Ok(guard)
    }

    /// Current state of the coordination lock.
    ///
    /// Waits for a held guard to be released, so never call it while holding
    /// one on the same thread; use [`GlobalGuard::state`] there.
    pub fn state(&self) -> LockState {
        *self.gate.lock()
    }

    /// The buffer registered under `id`.
    pub fn get(&self, id: BufferId) -> Option<Arc<RingBuffer>> {
        self.table.read().buffers.get(id.index())?.clone()
    }

    pub fn default_id(&self) -> Option<BufferId> {
        self.table.read().default_id
    }

    /// The default buffer and its id.
    pub fn default_buffer(&self) -> Option<(BufferId, Arc<RingBuffer>)> {
        let table = self.table.read();
        let id = table.default_id?;
        table.buffers[id.index()].clone().map(|b| (id, b))
    }

    /// Every occupied id with its buffer, in id order.
    pub fn occupied(&self) -> Vec<(BufferId, Arc<RingBuffer>)> {
        self.table
            .read()
            .occupied()
            .map(|(id, b)| (id, Arc::clone(b)))
            .collect()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Flips the enabled flag and returns the new value.
    pub fn toggle_enabled(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Default for BufferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of holding the coordination lock.
///
/// Dropping the guard releases, in order: every buffer lock taken in full
/// mode (reverse acquisition order), the disabled-logging override, then the
/// coordination lock itself.
pub struct GlobalGuard<'a> {
    registry: &'a BufferRegistry,
    gate: MutexGuard<'a, LockState>,
    held: Vec<(Arc<RingBuffer>, ArcMutexGuard<RawMutex, Cursor>)>,
    state: LockState,
    was_enabled: bool,
    torn_down: bool,
}

impl GlobalGuard<'_> {
    pub fn state(&self) -> LockState {
        self.state
    }

    fn set_state(&mut self, state: LockState) {
        self.state = state;
        *self.gate = state;
    }

    /// Creates a buffer in the first free id.
    ///
    /// The new buffer becomes the default if there is none yet.
    ///
    /// # Errors
    ///
    /// * [`LogError::BufferTableFull`] if every id is taken
    /// * [`LogError::SlotAllocation`] if the slots cannot be allocated
    ///
    /// On error the table is left unchanged.
    pub fn create_buffer(&mut self, capacity: usize) -> Result<BufferId> {
        let free = self
            .registry
            .table
            .read()
            .buffers
            .iter()
            .position(Option::is_none);
        let Some(index) = free else {
            tracing::warn!(max = MAX_BUFFERS, "buffer table is full");
            return Err(LogError::BufferTableFull(MAX_BUFFERS));
        };
        let buffer = Arc::new(RingBuffer::new(capacity)?);
        let id = BufferId(index as u8);

        let mut table = self.registry.table.write();
        table.buffers[index] = Some(Arc::clone(&buffer));
        if table.default_id.is_none() {
            table.default_id = Some(id);
        }
        if self.state == LockState::Full {
            self.held.push((Arc::clone(&buffer), buffer.lock_cursor_arc()));
        }
        tracing::debug!(%id, capacity = buffer.capacity(), "created ring buffer");
        Ok(id)
    }

    /// Destroys and removes a buffer other than the default one.
    ///
    /// # Errors
    ///
    /// * [`LogError::UnknownBuffer`] if no buffer has that id
    /// * [`LogError::DefaultBufferInUse`] for the default buffer
    pub fn delete_buffer(&mut self, id: BufferId) -> Result<()> {
        if self.state == LockState::Full {
            // the buffer's own lock is held by this guard
            return Err(LogError::LockState(LockState::Full));
        }
        let mut table = self.registry.table.write();
        match table.buffers.get(id.index()) {
            Some(Some(_)) => {}
            _ => return Err(LogError::UnknownBuffer(id)),
        }
        if table.default_id == Some(id) {
            return Err(LogError::DefaultBufferInUse(id));
        }
        if let Some(buffer) = table.buffers[id.index()].take() {
            buffer.destroy();
        }
        tracing::debug!(%id, "deleted ring buffer");
        Ok(())
    }

    /// Resets every buffer in id order.
    ///
    /// Stops at the first buffer that fails; buffers reset before it stay
    /// reset.
    pub fn reset_all(&self) -> Result<()> {
        if self.state == LockState::Full {
            return Err(LogError::LockState(LockState::Full));
        }
        for (id, buffer) in self.registry.occupied() {
            if let Err(err) = buffer.reset() {
                tracing::warn!(%id, error = %err, "buffer reset failed, stopping");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Copies every buffer out.
    ///
    /// Under a full lock all buffers are captured at the same instant; under a
    /// registry lock each buffer is captured under its own lock in turn.
    pub fn snapshot_all(&self) -> Vec<(BufferId, BufferSnapshot)> {
        let occupied = self.registry.occupied();
        if self.state == LockState::Full {
            occupied
                .into_iter()
                .filter_map(|(id, buffer)| {
                    self.held
                        .iter()
                        .find(|(held, _)| Arc::ptr_eq(held, &buffer))
                        .map(|(held, cursor)| (id, held.snapshot_locked(cursor)))
                })
                .collect()
        } else {
            occupied
                .into_iter()
                .map(|(id, buffer)| (id, buffer.snapshot()))
                .collect()
        }
    }

    /// Destroys every buffer and empties the table.
    pub fn destroy_all(&mut self) {
        while let Some((_buffer, cursor)) = self.held.pop() {
            drop(cursor);
        }
        let mut table = self.registry.table.write();
        for (id, slot) in table.buffers.iter_mut().enumerate() {
            if let Some(buffer) = slot.take() {
                buffer.destroy();
                tracing::debug!(id, "destroyed ring buffer");
            }
        }
        table.default_id = None;
    }

    /// Releases the lock into [`LockState::Uninitialized`].
    ///
    /// Logging stays disabled; the registry must be opened again before use.
    pub fn teardown(mut self) {
        self.torn_down = true;
        self.was_enabled = false;
    }
}

impl Drop for GlobalGuard<'_> {
    fn drop(&mut self) {
        while let Some((_buffer, cursor)) = self.held.pop() {
            drop(cursor);
        }
        if self.state == LockState::Full || self.torn_down {
            self.registry.set_enabled(self.was_enabled);
        }
        *self.gate = if self.torn_down {
            LockState::Uninitialized
        } else {
            LockState::Unlocked
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::EventFields;

    fn open_registry() -> BufferRegistry {
        let registry = BufferRegistry::new();
        registry.open().unwrap();
        registry.set_enabled(true);
        registry
    }

    #[test]
    fn test_lock_requires_open() {
        let registry = BufferRegistry::new();
        assert_eq!(registry.state(), LockState::Uninitialized);
        assert!(matches!(registry.lock(LockMode::Registry), Err(LogError::NotInitialized)));
        registry.open().unwrap();
        assert_eq!(registry.open(), Err(LogError::AlreadyInitialized));
    }

    #[test]
    fn test_first_buffer_becomes_default() {
        let registry = open_registry();
        let mut guard = registry.lock(LockMode::Registry).unwrap();
        let a = guard.create_buffer(4).unwrap();
        let b = guard.create_buffer(4).unwrap();
        drop(guard);

        assert_eq!(a, BufferId::new(0));
        assert_eq!(b, BufferId::new(1));
        assert_eq!(registry.default_id(), Some(a));
        assert_eq!(registry.occupied().len(), 2);
    }

    #[test]
    fn test_table_full_leaves_registry_unchanged() {
        let registry = open_registry();
        let mut guard = registry.lock(LockMode::Registry).unwrap();
        for _ in 0..MAX_BUFFERS {
            guard.create_buffer(1).unwrap();
        }
        assert_eq!(guard.create_buffer(0), Err(LogError::BufferTableFull(MAX_BUFFERS)));
        drop(guard);
        assert_eq!(registry.default_id(), Some(BufferId::new(0)));
        assert_eq!(registry.occupied().len(), MAX_BUFFERS);
    }

    #[test]
    fn test_guard_release_returns_to_unlocked() {
        let registry = open_registry();
        {
            let guard = registry.lock(LockMode::Registry).unwrap();
            assert_eq!(guard.state(), LockState::Registry);
        }
        assert_eq!(registry.state(), LockState::Unlocked);
    }

    #[test]
    fn test_full_lock_disables_and_restores_logging() {
        let registry = open_registry();
        registry.lock(LockMode::Registry).unwrap().create_buffer(2).unwrap();

        let guard = registry.lock(LockMode::Full).unwrap();
        assert_eq!(guard.state(), LockState::Full);
        assert!(!registry.is_enabled());
        drop(guard);

        assert!(registry.is_enabled());
        assert_eq!(registry.state(), LockState::Unlocked);
    }

    #[test]
    fn test_full_lock_keeps_disabled_logging_disabled() {
        let registry = open_registry();
        registry.set_enabled(false);
        drop(registry.lock(LockMode::Full).unwrap());
        assert!(!registry.is_enabled());
    }

    #[test]
    fn test_full_lock_snapshot_sees_every_buffer() {
        let registry = open_registry();
        {
            let mut guard = registry.lock(LockMode::Registry).unwrap();
            guard.create_buffer(2).unwrap();
            guard.create_buffer(2).unwrap();
        }
        for (_, buffer) in registry.occupied() {
            buffer.write(&EventFields::message("x"), None, 0).unwrap();
        }
        let guard = registry.lock(LockMode::Full).unwrap();
        let snapshots = guard.snapshot_all();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|(_, s)| s.events.len() == 1));
    }

    #[test]
    fn test_delete_buffer_rules() {
        let registry = open_registry();
        let mut guard = registry.lock(LockMode::Registry).unwrap();
        let default = guard.create_buffer(2).unwrap();
        let extra = guard.create_buffer(2).unwrap();

        assert_eq!(guard.delete_buffer(default), Err(LogError::DefaultBufferInUse(default)));
        assert_eq!(
            guard.delete_buffer(BufferId::new(4)),
            Err(LogError::UnknownBuffer(BufferId::new(4)))
        );
        let doomed = registry.get(extra).unwrap();
        guard.delete_buffer(extra).unwrap();
        assert!(doomed.is_retired());
        assert!(registry.get(extra).is_none());

        // the freed id is reused
        assert_eq!(guard.create_buffer(2).unwrap(), extra);
    }

    #[test]
    fn test_teardown_uninitializes() {
        let registry = open_registry();
        let mut guard = registry.lock(LockMode::Registry).unwrap();
        let id = guard.create_buffer(2).unwrap();
        let buffer = registry.get(id).unwrap();
        guard.destroy_all();
        guard.teardown();

        assert_eq!(registry.state(), LockState::Uninitialized);
        assert!(!registry.is_enabled());
        assert!(registry.default_id().is_none());
        assert!(buffer.is_retired());
        registry.open().unwrap();
        assert!(registry.occupied().is_empty());
    }

    #[test]
    fn test_toggle_enabled() {
        let registry = open_registry();
        assert!(!registry.toggle_enabled());
        assert!(registry.toggle_enabled());
    }
}
