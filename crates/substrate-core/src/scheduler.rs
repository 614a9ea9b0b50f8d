//! Cooperative per-frame scheduler and host control surface.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::{
    ConfigError, ConsoleDevice, Core, CoreId, CoreRegistry, CoreSnapshot, CycleBudget,
    ExecutionResult, ExternalHandleId, FramebufferView, IntegrityValidator, LifecycleState,
    MemoryMapper, PassStamp, Position, PriorityMode, ProgramMetadata, RegisterError,
    RegistryError, StepOutcome, SubstrateConfig, Viewport,
};

/// Monotonic time source sampled by passes with a time limit.
pub trait PassClock: Send {
    /// Time elapsed since an arbitrary fixed origin. Must never decrease.
    fn now(&mut self) -> Duration;
}

/// [`PassClock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl PassClock for MonotonicClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// Owns the registry and runs bounded execution passes over it.
pub struct Scheduler {
    config: SubstrateConfig,
    template: MemoryMapper,
    validator: IntegrityValidator,
    registry: CoreRegistry,
    viewport: Option<Viewport>,
    priority: PriorityMode,
    pass_counter: u64,
    clock: Box<dyn PassClock>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("cores", &self.registry.len())
            .field("viewport", &self.viewport)
            .field("priority", &self.priority)
            .field("pass_counter", &self.pass_counter)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates an empty scheduler.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn new(config: SubstrateConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let template = MemoryMapper::new(&config.layout, config.console)?;
        Ok(Self {
            config,
            template,
            validator: IntegrityValidator::new(config.validator),
            registry: CoreRegistry::new(),
            viewport: None,
            priority: config.scheduler.priority,
            pass_counter: 0,
            clock: Box::new(MonotonicClock::default()),
        })
    }

    /// Replaces the pass time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl PassClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SubstrateConfig {
        &self.config
    }

    /// Read-only view of every live core.
    #[must_use]
    pub const fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    /// Number of passes run so far.
    #[must_use]
    pub const fn pass_counter(&self) -> u64 {
        self.pass_counter
    }

    /// Validates `program` and binds a new core to `position`.
    ///
    /// Any prior occupant is destroyed first. A program that fails validation
    /// still produces a core, in the `Fraud` state; the error names its id.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::ProgramTooLarge`] (prior occupant untouched)
    /// when the program exceeds RAM, [`RegisterError::IdSpaceExhausted`] when
    /// no id is left and [`RegisterError::Validation`] for a fraud core.
    pub fn register_core(
        &mut self,
        position: Position,
        program: &[u8],
        metadata: &ProgramMetadata,
    ) -> Result<CoreId, RegisterError> {
        let capacity = self.template.ram_capacity();
        if program.len() > capacity {
            return Err(RegisterError::ProgramTooLarge {
                len: program.len(),
                capacity,
            });
        }
        let id = self
            .registry
            .allocate_id()
            .ok_or(RegisterError::IdSpaceExhausted)?;

        let outcome = self.validator.validate(program, metadata);
        let cleared = self.validator.clears(outcome, program);
        let entry = self.entry_point();
        let mut core = Core::new(
            id,
            position,
            program.to_vec(),
            outcome,
            self.template.clone(),
            entry,
        )
        .map_err(|_| RegisterError::ProgramTooLarge {
            len: program.len(),
            capacity,
        })?;
        let state = core.activate(cleared);

        if let Some(previous) = self.registry.insert(core) {
            debug!(
                old_id = %previous.id(),
                core_id = %id,
                x = position.x,
                y = position.y,
                "core replaced"
            );
        }

        if state == LifecycleState::Fraud {
            let error = outcome.rejection();
            warn!(core_id = %id, x = position.x, y = position.y, %error, "core registered in fraud state");
            return Err(RegisterError::Validation { id, error });
        }
        debug!(core_id = %id, x = position.x, y = position.y, bytes = program.len(), "core registered");
        Ok(id)
    }

    /// Destroys the core at `position`. Returns `false` when none was there.
    pub fn unregister_core(&mut self, position: Position) -> bool {
        self.registry.remove(position).is_some_and(|core| {
            debug!(core_id = %core.id(), x = position.x, y = position.y, "core unregistered");
            true
        })
    }

    /// Runs one bounded pass and reports every core.
    ///
    /// Visible running cores share `budget.cycles`: each gets `B / n`, and
    /// the first `B % n` in visiting order get one extra. A core's slice ends
    /// when its share is spent or it halts or faults. With a time limit the
    /// clock is sampled every `time_check_interval` steps; once the limit
    /// passes, remaining cores are deferred to the next pass.
    pub fn execute_pass(&mut self, budget: CycleBudget) -> Vec<ExecutionResult> {
        self.pass_counter += 1;
        let stamp = PassStamp(self.pass_counter);
        let order = self.visit_order();
        let padding = self.config.scheduler.viewport_padding;
        let viewport = self.viewport;
        let visible = |position: Position| {
            viewport.is_none_or(|view| view.contains_padded(position, padding))
        };

        let eligible = order
            .iter()
            .filter_map(|id| self.registry.by_id(*id))
            .filter(|core| core.state().is_runnable() && visible(core.position()))
            .fold(0_u64, |count, _| count + 1);
        let (base_share, mut extra) = if eligible == 0 {
            (0, 0)
        } else {
            (budget.cycles / eligible, budget.cycles % eligible)
        };

        let interval = u64::from(self.config.scheduler.time_check_interval.max(1));
        let clock = &mut self.clock;
        let deadline = budget
            .time
            .and_then(|limit| clock.now().checked_add(limit));
        let mut steps_since_check = 0_u64;
        let mut time_cut = false;
        let mut total = 0_u64;
        let mut visited = 0_usize;

        let mut results = Vec::with_capacity(order.len());
        for id in order {
            let Some(core) = self.registry.by_id_mut(id) else {
                continue;
            };
            if !core.state().is_runnable() || !visible(core.position()) {
                results.push(core.result(0));
                continue;
            }
            let share = base_share + u64::from(extra > 0);
            extra = extra.saturating_sub(1);
            if time_cut || share == 0 {
                results.push(core.result(0));
                continue;
            }

            visited += 1;
            let mut executed = 0_u64;
            while executed < share {
                let outcome = core.step();
                executed += 1;
                steps_since_check += 1;
                if let StepOutcome::Faulted(fault) = outcome {
                    warn!(
                        core_id = %id,
                        x = core.position().x,
                        y = core.position().y,
                        fault_code = fault.code(),
                        fault_class = ?fault.class(),
                        %fault,
                        "core faulted"
                    );
                }
                if outcome != StepOutcome::Continue {
                    break;
                }
                if let Some(deadline) = deadline {
                    if steps_since_check >= interval {
                        steps_since_check = 0;
                        if clock.now() >= deadline {
                            time_cut = true;
                            break;
                        }
                    }
                }
            }
            core.finish_slice(stamp);
            total += executed;
            results.push(core.result(executed));
        }

        trace!(
            pass = self.pass_counter,
            visited,
            cycles = total,
            time_cut,
            "pass complete"
        );
        results
    }

    fn visit_order(&self) -> Vec<CoreId> {
        let mut order: Vec<CoreId> = self.registry.ids().collect();
        if let (PriorityMode::ViewportDistance, Some(view)) = (self.priority, self.viewport) {
            let (cx, cy) = view.center();
            order.sort_by_cached_key(|id| {
                let distance = self
                    .registry
                    .position_of(*id)
                    .map_or(u64::MAX, |position| position.distance_squared(cx, cy));
                (distance, *id)
            });
        }
        order
    }

    fn entry_point(&self) -> u32 {
        u32::try_from(self.config.layout.entry_point()).unwrap_or(0)
    }

    /// Suspends a running core.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownCore`] for an unknown id.
    pub fn pause(&mut self, id: CoreId) -> Result<LifecycleState, RegistryError> {
        let core = self.core_mut(id)?;
        let state = core.pause();
        debug!(core_id = %id, ?state, "pause requested");
        Ok(state)
    }

    /// Resumes a paused core.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownCore`] for an unknown id.
    pub fn resume(&mut self, id: CoreId) -> Result<LifecycleState, RegistryError> {
        let core = self.core_mut(id)?;
        let state = core.resume();
        debug!(core_id = %id, ?state, "resume requested");
        Ok(state)
    }

    /// Cold-resets a core; fraud cores stay in `Fraud`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownCore`] for an unknown id.
    pub fn reset(&mut self, id: CoreId) -> Result<LifecycleState, RegistryError> {
        let core = self.core_mut(id)?;
        let applied = core.reset();
        let state = core.state();
        debug!(core_id = %id, applied, ?state, "reset requested");
        Ok(state)
    }

    fn core_mut(&mut self, id: CoreId) -> Result<&mut Core, RegistryError> {
        self.registry
            .by_id_mut(id)
            .ok_or(RegistryError::UnknownCore(id))
    }

    /// Snapshot of the core at `position`.
    #[must_use]
    pub fn core_state(&self, position: Position) -> Option<CoreSnapshot> {
        self.registry.get(position).map(Core::snapshot)
    }

    /// Snapshot of the core with `id`.
    #[must_use]
    pub fn core_by_id(&self, id: CoreId) -> Option<CoreSnapshot> {
        self.registry.by_id(id).map(Core::snapshot)
    }

    /// Snapshots of every registered core in ascending id order.
    #[must_use]
    pub fn list_active_cores(&self) -> Vec<CoreSnapshot> {
        self.registry.iter().map(Core::snapshot).collect()
    }

    /// Sets or clears the culling viewport.
    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    /// Current culling viewport.
    #[must_use]
    pub const fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Sets the visiting order for subsequent passes.
    pub fn set_priority(&mut self, priority: PriorityMode) {
        self.priority = priority;
    }

    /// Current visiting order.
    #[must_use]
    pub const fn priority(&self) -> PriorityMode {
        self.priority
    }

    /// Console of the core at `position`.
    #[must_use]
    pub fn console(&self, position: Position) -> Option<&ConsoleDevice> {
        self.registry.get(position)?.mapper().console()
    }

    /// Mutable console of the core at `position`.
    pub fn console_mut(&mut self, position: Position) -> Option<&mut ConsoleDevice> {
        self.registry.get_mut(position)?.mapper_mut().console_mut()
    }

    /// Queues host input for the core at `position`; returns bytes accepted.
    pub fn push_console_input(&mut self, position: Position, bytes: &[u8]) -> Option<usize> {
        self.console_mut(position)
            .map(|console| console.push_input(bytes))
    }

    /// Framebuffer of the core at `position`.
    #[must_use]
    pub fn framebuffer(&self, position: Position) -> Option<FramebufferView<'_>> {
        self.registry.get(position)?.mapper().framebuffer()
    }

    /// Marks the framebuffer at `position` clean; returns whether it was dirty.
    pub fn clear_framebuffer_dirty(&mut self, position: Position) -> bool {
        self.registry
            .get_mut(position)
            .is_some_and(|core| core.mapper_mut().clear_framebuffer_dirty())
    }

    /// Attaches a renderer handle, returning the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownCore`] for an unknown id.
    pub fn attach_handle(
        &mut self,
        id: CoreId,
        handle: ExternalHandleId,
    ) -> Result<Option<ExternalHandleId>, RegistryError> {
        Ok(self.core_mut(id)?.set_handle(Some(handle)))
    }

    /// Detaches the renderer handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownCore`] for an unknown id.
    pub fn detach_handle(&mut self, id: CoreId) -> Result<Option<ExternalHandleId>, RegistryError> {
        Ok(self.core_mut(id)?.set_handle(None))
    }

    pub(crate) const fn template(&self) -> &MemoryMapper {
        &self.template
    }

    pub(crate) const fn validator(&self) -> &IntegrityValidator {
        &self.validator
    }

    pub(crate) fn replace_registry(&mut self, registry: CoreRegistry, pass_counter: u64) {
        self.registry = registry;
        self.pass_counter = pass_counter;
    }
}
