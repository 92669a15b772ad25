use crate::{logging::append_shutdown_log, ShellState};

/// Explicit shell lifecycle, replacing a free-floating `is_quitting` boolean.
/// The one-way progression guarantees that the backend kill sequence is
/// admitted at most once per application lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellPhase {
    #[default]
    Running,
    QuittingRequested,
    CleanupInProgress,
    ReadyToExit,
    Exiting,
}

#[derive(Debug, Default)]
pub struct LifecycleStateMachine {
    phase: ShellPhase,
}

impl LifecycleStateMachine {
    #[cfg(test)]
    pub fn phase(&self) -> ShellPhase {
        self.phase
    }

    pub fn is_quitting(&self) -> bool {
        self.phase != ShellPhase::Running
    }

    pub fn mark_quitting(&mut self) {
        if self.phase == ShellPhase::Running {
            self.phase = ShellPhase::QuittingRequested;
        }
    }

    pub fn try_begin_cleanup(&mut self) -> bool {
        if matches!(
            self.phase,
            ShellPhase::Running | ShellPhase::QuittingRequested
        ) {
            self.phase = ShellPhase::CleanupInProgress;
            return true;
        }
        false
    }

    pub fn allow_next_exit_request(&mut self) {
        self.phase = ShellPhase::ReadyToExit;
    }

    pub fn take_exit_request_allowance(&mut self) -> bool {
        if self.phase == ShellPhase::ReadyToExit {
            self.phase = ShellPhase::Exiting;
            return true;
        }
        false
    }
}

impl ShellState {
    pub(crate) fn mark_quitting(&self) {
        match self.lifecycle.lock() {
            Ok(mut guard) => guard.mark_quitting(),
            Err(error) => {
                append_shutdown_log(&format!(
                    "lifecycle lock poisoned when marking quitting: {error}"
                ));
                error.into_inner().mark_quitting();
            }
        }
    }

    pub(crate) fn is_quitting(&self) -> bool {
        match self.lifecycle.lock() {
            Ok(guard) => guard.is_quitting(),
            Err(error) => {
                append_shutdown_log(&format!(
                    "lifecycle lock poisoned when reading quitting state: {error}"
                ));
                error.into_inner().is_quitting()
            }
        }
    }

    pub(crate) fn try_begin_exit_cleanup(&self) -> bool {
        match self.lifecycle.lock() {
            Ok(mut guard) => guard.try_begin_cleanup(),
            Err(error) => {
                append_shutdown_log(&format!(
                    "lifecycle lock poisoned when beginning cleanup: {error}"
                ));
                error.into_inner().try_begin_cleanup()
            }
        }
    }

    pub(crate) fn allow_next_exit_request(&self) {
        match self.lifecycle.lock() {
            Ok(mut guard) => guard.allow_next_exit_request(),
            Err(error) => {
                append_shutdown_log(&format!(
                    "lifecycle lock poisoned when allowing next exit request: {error}"
                ));
                error.into_inner().allow_next_exit_request();
            }
        }
    }

    pub(crate) fn take_exit_request_allowance(&self) -> bool {
        match self.lifecycle.lock() {
            Ok(mut guard) => guard.take_exit_request_allowance(),
            Err(error) => {
                append_shutdown_log(&format!(
                    "lifecycle lock poisoned when taking exit request allowance: {error}"
                ));
                error.into_inner().take_exit_request_allowance()
            }
        }
    }
}
