use std::collections::{BTreeMap, HashMap};

use crate::{Core, CoreId, Position};

/// Sole owner of every live core.
///
/// Cores are keyed by position, with an ordered `id -> position` index for
/// id lookups and deterministic ascending-id iteration. Ids are handed out
/// monotonically and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreRegistry {
    cores: HashMap<Position, Core>,
    ids: BTreeMap<CoreId, Position>,
    next_id: u64,
}

impl Default for CoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreRegistry {
    /// First id handed out by a fresh registry.
    pub const FIRST_ID: u32 = 1;

    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cores: HashMap::new(),
            ids: BTreeMap::new(),
            next_id: u64::from(Self::FIRST_ID),
        }
    }

    /// Number of live cores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    /// Returns `true` when no core is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Next id that [`CoreRegistry::allocate_id`] will return.
    #[must_use]
    pub const fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Reserves a fresh id, or `None` once the `u32` id space is used up.
    pub fn allocate_id(&mut self) -> Option<CoreId> {
        let raw = u32::try_from(self.next_id).ok()?;
        self.next_id += 1;
        Some(CoreId::new(raw))
    }

    /// Inserts `core` at its position, returning the displaced occupant.
    pub fn insert(&mut self, core: Core) -> Option<Core> {
        let previous = self.remove(core.position());
        self.ids.insert(core.id(), core.position());
        self.cores.insert(core.position(), core);
        previous
    }

    /// Removes the core at `position`.
    pub fn remove(&mut self, position: Position) -> Option<Core> {
        let core = self.cores.remove(&position)?;
        self.ids.remove(&core.id());
        Some(core)
    }

    /// Core at `position`.
    #[must_use]
    pub fn get(&self, position: Position) -> Option<&Core> {
        self.cores.get(&position)
    }

    /// Mutable core at `position`.
    pub fn get_mut(&mut self, position: Position) -> Option<&mut Core> {
        self.cores.get_mut(&position)
    }

    /// Position of the core with `id`.
    #[must_use]
    pub fn position_of(&self, id: CoreId) -> Option<Position> {
        self.ids.get(&id).copied()
    }

    /// Core with `id`.
    #[must_use]
    pub fn by_id(&self, id: CoreId) -> Option<&Core> {
        self.get(self.position_of(id)?)
    }

    /// Mutable core with `id`.
    pub fn by_id_mut(&mut self, id: CoreId) -> Option<&mut Core> {
        let position = self.position_of(id)?;
        self.cores.get_mut(&position)
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = CoreId> + '_ {
        self.ids.keys().copied()
    }

    /// Cores in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Core> {
        self.ids
            .values()
            .filter_map(|position| self.cores.get(position))
    }

    /// Rebuilds a registry from decoded cores.
    ///
    /// Returns `None` when ids or positions repeat or `next_id` does not
    /// exceed every id.
    pub(crate) fn from_parts(cores: Vec<Core>, next_id: u64) -> Option<Self> {
        let mut registry = Self {
            cores: HashMap::with_capacity(cores.len()),
            ids: BTreeMap::new(),
            next_id,
        };
        for core in cores {
            if u64::from(core.id().get()) >= next_id
                || registry.ids.contains_key(&core.id())
                || registry.cores.contains_key(&core.position())
            {
                return None;
            }
            registry.insert(core);
        }
        Some(registry)
    }
}
