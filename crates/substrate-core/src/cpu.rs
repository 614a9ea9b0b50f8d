use crate::execute::step_one;
use crate::{
    CoreFault, CoreId, CoreSnapshot, ExecutionResult, ExternalHandleId, LifecycleState,
    MemoryFault, MemoryMapper, PassStamp, Position, RegisterFile, StepOutcome, ValidationOutcome,
    REGISTER_COUNT,
};

/// One virtual processor bound to a grid position.
///
/// A core owns its mapper outright, so nothing it does can reach another
/// core's memory or devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    id: CoreId,
    position: Position,
    regs: RegisterFile,
    entry: u32,
    cycles: u64,
    state: LifecycleState,
    last_output: Option<Vec<u8>>,
    last_executed_at: Option<PassStamp>,
    fault: Option<CoreFault>,
    validation: ValidationOutcome,
    program: Vec<u8>,
    handle: Option<ExternalHandleId>,
    mapper: MemoryMapper,
}

impl Core {
    /// Creates an idle core and loads `program` at `entry` in `mapper`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryFault::ImageOutOfBounds`] when the program does not fit.
    pub fn new(
        id: CoreId,
        position: Position,
        program: Vec<u8>,
        validation: ValidationOutcome,
        mut mapper: MemoryMapper,
        entry: u32,
    ) -> Result<Self, MemoryFault> {
        mapper.load(u64::from(entry), &program)?;
        Ok(Self {
            id,
            position,
            regs: RegisterFile::at_entry(entry),
            entry,
            cycles: 0,
            state: LifecycleState::Idle,
            last_output: None,
            last_executed_at: None,
            fault: None,
            validation,
            program,
            handle: None,
            mapper,
        })
    }

    /// Leaves `Idle`: `Running` when the program cleared validation,
    /// `Fraud` otherwise. Later calls have no effect.
    pub fn activate(&mut self, cleared: bool) -> LifecycleState {
        if self.state == LifecycleState::Idle {
            self.state = if cleared {
                LifecycleState::Running
            } else {
                LifecycleState::Fraud
            };
        }
        self.state
    }

    /// Executes exactly one instruction and counts one cycle.
    ///
    /// A core that is not `Running` does not execute and reports why it is
    /// stopped: `Faulted` with the retained fault for `Error`, `Halted`
    /// otherwise.
    pub fn step(&mut self) -> StepOutcome {
        if self.state != LifecycleState::Running {
            return self.fault.map_or(StepOutcome::Halted, StepOutcome::Faulted);
        }
        self.cycles = self.cycles.saturating_add(1);
        match step_one(&mut self.regs, &mut self.mapper) {
            Ok(false) => StepOutcome::Continue,
            Ok(true) => {
                self.state = LifecycleState::Halted;
                StepOutcome::Halted
            }
            Err(fault) => {
                self.state = LifecycleState::Error;
                self.fault = Some(fault);
                StepOutcome::Faulted(fault)
            }
        }
    }

    /// Cold reset: zeroes memory, registers and cycles, reloads the program,
    /// resets devices and resumes `Running`.
    ///
    /// Returns `false` without changing anything for `Idle` and `Fraud`.
    pub fn reset(&mut self) -> bool {
        if !self.state.can_reset() {
            return false;
        }
        self.mapper.reset();
        self.regs = RegisterFile::at_entry(self.entry);
        self.cycles = 0;
        self.last_output = None;
        self.fault = None;
        match self.mapper.load(u64::from(self.entry), &self.program) {
            Ok(()) => self.state = LifecycleState::Running,
            Err(fault) => {
                self.fault = Some(CoreFault::Memory(fault));
                self.state = LifecycleState::Error;
            }
        }
        true
    }

    /// Suspends a running core. Other states are left unchanged.
    pub fn pause(&mut self) -> LifecycleState {
        if self.state == LifecycleState::Running {
            self.state = LifecycleState::Paused;
        }
        self.state
    }

    /// Resumes a paused core. Other states are left unchanged.
    pub fn resume(&mut self) -> LifecycleState {
        if self.state == LifecycleState::Paused {
            self.state = LifecycleState::Running;
        }
        self.state
    }

    /// Records the end of this core's slice in pass `stamp`.
    pub(crate) fn finish_slice(&mut self, stamp: PassStamp) {
        self.last_executed_at = Some(stamp);
        if let Some(output) = self
            .mapper
            .console_mut()
            .and_then(crate::ConsoleDevice::take_recent_output)
        {
            self.last_output = Some(output);
        }
    }

    /// Overwrites execution state from a persisted image.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore_execution(
        &mut self,
        registers: [u32; REGISTER_COUNT],
        pc: u32,
        cycles: u64,
        state: LifecycleState,
        fault: Option<CoreFault>,
        last_output: Option<Vec<u8>>,
        last_executed_at: Option<PassStamp>,
    ) {
        self.regs.set_values(registers);
        self.regs.set_pc(pc);
        self.cycles = cycles;
        self.state = state;
        self.fault = fault;
        self.last_output = last_output;
        self.last_executed_at = last_executed_at;
    }

    /// Core id.
    #[must_use]
    pub const fn id(&self) -> CoreId {
        self.id
    }

    /// Bound position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.regs.pc()
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Cycles executed since registration or the last reset.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Fault retained while in `Error`.
    #[must_use]
    pub const fn fault(&self) -> Option<CoreFault> {
        self.fault
    }

    /// Registration-time validation outcome.
    #[must_use]
    pub const fn validation(&self) -> ValidationOutcome {
        self.validation
    }

    /// Program image as registered.
    #[must_use]
    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Console bytes from the last slice that produced output.
    #[must_use]
    pub fn last_output(&self) -> Option<&[u8]> {
        self.last_output.as_deref()
    }

    /// Pass that last executed this core.
    #[must_use]
    pub const fn last_executed_at(&self) -> Option<PassStamp> {
        self.last_executed_at
    }

    /// Host-attached renderer handle.
    #[must_use]
    pub const fn handle(&self) -> Option<ExternalHandleId> {
        self.handle
    }

    /// Attaches or clears the renderer handle, returning the previous one.
    pub fn set_handle(&mut self, handle: Option<ExternalHandleId>) -> Option<ExternalHandleId> {
        std::mem::replace(&mut self.handle, handle)
    }

    /// The core's address space.
    #[must_use]
    pub const fn mapper(&self) -> &MemoryMapper {
        &self.mapper
    }

    pub(crate) fn mapper_mut(&mut self) -> &mut MemoryMapper {
        &mut self.mapper
    }

    /// Read-only copy of the host-visible state.
    #[must_use]
    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            id: self.id,
            position: self.position,
            pc: self.regs.pc(),
            cycles: self.cycles,
            state: self.state,
            registers: self.regs.values(),
            last_output: self.last_output.clone(),
            last_executed_at: self.last_executed_at,
            fault: self.fault,
            validation: self.validation,
            handle: self.handle,
        }
    }

    /// Pass result for this core after spending `cycles_executed`.
    #[must_use]
    pub const fn result(&self, cycles_executed: u64) -> ExecutionResult {
        ExecutionResult {
            core_id: self.id,
            position: self.position,
            cycles_executed,
            halted: self.state.is_stopped(),
            fraud: matches!(self.state, LifecycleState::Fraud),
            faulted: self.fault,
            pc: self.regs.pc(),
            state: self.state,
        }
    }
}
