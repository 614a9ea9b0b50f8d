//! Versioned registry persistence.
//!
//! A snapshot captures every core's execution state and memory contents as a
//! JSON document. Memory is stored as sparse pages: all-zero pages are
//! omitted. Renderer handles are never persisted.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    ConsoleImage, Core, CoreFault, CoreId, CoreRegistry, LifecycleState, MemoryLayout,
    PassStamp, Position, Scheduler, SerializationError, ValidationOutcome, REGISTER_COUNT,
};

/// Granularity of persisted memory pages in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Snapshot schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum SnapshotVersion {
    /// Initial schema.
    V1,
}

impl SnapshotVersion {
    /// Version written by [`Scheduler::serialize`].
    pub const CURRENT: Self = Self::V1;
}

impl From<SnapshotVersion> for u16 {
    fn from(version: SnapshotVersion) -> Self {
        match version {
            SnapshotVersion::V1 => 1,
        }
    }
}

impl TryFrom<u16> for SnapshotVersion {
    type Error = SerializationError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Self::V1),
            other => Err(SerializationError::UnsupportedVersion(other)),
        }
    }
}

/// One nonzero page of a memory region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// Start address of the region the page belongs to.
    pub region_start: u64,
    /// Byte offset of the page inside the region.
    pub offset: u64,
    /// Page contents; at most [`PAGE_SIZE`] bytes.
    pub bytes: Vec<u8>,
}

/// Persisted state of one core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreImage {
    /// Core id.
    pub id: CoreId,
    /// Bound position.
    pub position: Position,
    /// General-purpose registers.
    pub registers: [u32; REGISTER_COUNT],
    /// Program counter.
    pub pc: u32,
    /// Cycles since registration or reset.
    pub cycles: u64,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Retained fault; present exactly when `state` is `Error`.
    #[serde(default)]
    pub fault: Option<CoreFault>,
    /// Registration-time validation outcome.
    pub validation: ValidationOutcome,
    /// Program image reloaded on reset.
    pub program: Vec<u8>,
    /// Nonzero memory pages across every region.
    #[serde(default)]
    pub pages: Vec<PageImage>,
    /// Console lines and pending input.
    #[serde(default)]
    pub console: Option<ConsoleImage>,
    /// Most recent slice output.
    #[serde(default)]
    pub last_output: Option<Vec<u8>>,
    /// Pass that last executed the core.
    #[serde(default)]
    pub last_executed_at: Option<PassStamp>,
}

/// Persisted registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Schema version.
    pub version: SnapshotVersion,
    /// Layout the snapshot was taken under.
    pub layout: MemoryLayout,
    /// Next id the registry hands out.
    pub next_id: u64,
    /// Passes run before the snapshot.
    pub pass_counter: u64,
    /// Cores in ascending id order.
    pub cores: Vec<CoreImage>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u16,
}

impl CoreImage {
    fn capture(core: &Core) -> Self {
        let mut pages = Vec::new();
        for region in core.mapper().regions().iter() {
            for (index, chunk) in region.bytes().chunks(PAGE_SIZE).enumerate() {
                if chunk.iter().any(|byte| *byte != 0) {
                    pages.push(PageImage {
                        region_start: region.start(),
                        offset: (index * PAGE_SIZE) as u64,
                        bytes: chunk.to_vec(),
                    });
                }
            }
        }
        Self {
            id: core.id(),
            position: core.position(),
            registers: core.registers().values(),
            pc: core.pc(),
            cycles: core.cycles(),
            state: core.state(),
            fault: core.fault(),
            validation: core.validation(),
            program: core.program().to_vec(),
            pages,
            console: core.mapper().console().map(crate::ConsoleDevice::image),
            last_output: core.last_output().map(<[u8]>::to_vec),
            last_executed_at: core.last_executed_at(),
        }
    }

    fn rebuild(self, scheduler: &Scheduler) -> Result<Core, SerializationError> {
        if (self.state == LifecycleState::Error) != self.fault.is_some() {
            return Err(SerializationError::Corrupt(format!(
                "core {} has state {:?} with fault {:?}",
                self.id, self.state, self.fault
            )));
        }
        let cleared = scheduler.validator().clears(self.validation, &self.program);
        let consistent = match self.state {
            LifecycleState::Idle => false,
            LifecycleState::Fraud => !cleared,
            _ => cleared,
        };
        if !consistent {
            return Err(SerializationError::Corrupt(format!(
                "core {} has state {:?} but validation {:?}",
                self.id, self.state, self.validation
            )));
        }
        let entry = u32::try_from(scheduler.config().layout.entry_point())
            .map_err(|_| SerializationError::LayoutMismatch)?;
        let mut core = Core::new(
            self.id,
            self.position,
            self.program,
            self.validation,
            scheduler.template().clone(),
            entry,
        )
        .map_err(|fault| {
            SerializationError::Corrupt(format!("core {} program does not load: {fault}", self.id))
        })?;

        let mapper = core.mapper_mut();
        mapper.reset();
        for page in &self.pages {
            let bytes = mapper.region_bytes_mut(page.region_start).ok_or_else(|| {
                SerializationError::Corrupt(format!(
                    "core {} page names unmapped region {:#x}",
                    self.id, page.region_start
                ))
            })?;
            let start = usize::try_from(page.offset).ok();
            let range = start
                .filter(|_| page.bytes.len() <= PAGE_SIZE)
                .and_then(|start| Some(start..start.checked_add(page.bytes.len())?))
                .filter(|range| range.end <= bytes.len());
            let Some(range) = range else {
                return Err(SerializationError::Corrupt(format!(
                    "core {} page at {:#x}+{:#x} exceeds its region",
                    self.id, page.region_start, page.offset
                )));
            };
            bytes[range].copy_from_slice(&page.bytes);
        }
        if let (Some(console), Some(image)) = (mapper.console_mut(), self.console) {
            console.restore(image);
        }
        if let Some(framebuffer) = mapper.framebuffer_mut() {
            framebuffer.mark_all_dirty();
        }

        core.restore_execution(
            self.registers,
            self.pc,
            self.cycles,
            self.state,
            self.fault,
            self.last_output,
            self.last_executed_at,
        );
        Ok(core)
    }
}

impl Scheduler {
    /// Captures the registry as a versioned snapshot document.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            version: SnapshotVersion::CURRENT,
            layout: self.config().layout,
            next_id: self.registry().next_id(),
            pass_counter: self.pass_counter(),
            cores: self.registry().iter().map(CoreImage::capture).collect(),
        }
    }

    /// Encodes the registry as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Encode`] when encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(&self.snapshot()).map_err(SerializationError::Encode)
    }

    /// Replaces the registry with the one encoded in `bytes`.
    ///
    /// Nothing changes unless the whole document is valid. Every framebuffer
    /// comes back fully dirty and every renderer handle comes back empty.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] describing the first problem found.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), SerializationError> {
        let header: VersionHeader = serde_json::from_slice(bytes).map_err(SerializationError::Decode)?;
        SnapshotVersion::try_from(header.version)?;
        let snapshot: RegistrySnapshot =
            serde_json::from_slice(bytes).map_err(SerializationError::Decode)?;
        self.restore(snapshot)
    }

    /// Replaces the registry with `snapshot`; all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::LayoutMismatch`] when the snapshot was taken
    /// under another layout and [`SerializationError::Corrupt`] when it breaks a
    /// registry invariant.
    pub fn restore(&mut self, snapshot: RegistrySnapshot) -> Result<(), SerializationError> {
        if snapshot.layout != self.config().layout {
            return Err(SerializationError::LayoutMismatch);
        }
        let next_id = snapshot.next_id;
        let pass_counter = snapshot.pass_counter;
        let cores = snapshot
            .cores
            .into_iter()
            .map(|image| image.rebuild(self))
            .collect::<Result<Vec<_>, _>>()?;
        let count = cores.len();
        let registry = CoreRegistry::from_parts(cores, next_id).ok_or_else(|| {
            SerializationError::Corrupt("duplicate core id or position, or stale next id".into())
        })?;
        self.replace_registry(registry, pass_counter);
        info!(cores = count, next_id, pass_counter, "registry restored");
        Ok(())
    }
}
