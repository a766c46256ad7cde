/// Run state for the whole session. Owned by the frame driver and passed
/// into platform callbacks by reference; there are no process globals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Bootstrapping,
    Running,
    ShuttingDown,
    Terminated,
}

/// `Uninitialized → Bootstrapping → Running → ShuttingDown → Terminated`,
/// with a failed bootstrap jumping straight to `Terminated`. The exit
/// flag is set at most once per run by a lifecycle callback and polled
/// once per tick; the bootstrap guard makes the mobile lazy-bootstrap a
/// one-shot transition instead of an implicit first-callback side effect.
#[derive(Debug)]
pub struct LifeCycle {
    phase: Phase,
    exit_requested: bool,
    bootstrap_attempted: bool,
}

impl LifeCycle {
    pub fn new() -> Self {
        LifeCycle {
            phase: Phase::Uninitialized,
            exit_requested: false,
            bootstrap_attempted: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Claim the single bootstrap attempt. Returns false on every call
    /// after the first; the caller must then leave the context alone.
    pub fn begin_bootstrap(&mut self) -> bool {
        if self.bootstrap_attempted {
            return false;
        }
        self.bootstrap_attempted = true;
        self.phase = Phase::Bootstrapping;
        true
    }

    pub fn bootstrap_succeeded(&mut self) {
        self.phase = Phase::Running;
    }

    /// A bootstrap failure is fatal: the run terminates without ever
    /// entering `Running`.
    pub fn bootstrap_failed(&mut self) {
        self.phase = Phase::Terminated;
        self.exit_requested = true;
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Draw only in steady state, and skip the frame when exit was just
    /// raised so no dying platform resources are touched.
    pub fn should_draw(&self) -> bool {
        self.phase == Phase::Running && !self.exit_requested
    }

    pub fn begin_shutdown(&mut self) {
        if self.phase == Phase::Running {
            self.phase = Phase::ShuttingDown;
        }
    }

    pub fn finish_shutdown(&mut self) {
        self.phase = Phase::Terminated;
    }
}

impl Default for LifeCycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_claimed_exactly_once() {
        let mut lc = LifeCycle::new();
        assert!(lc.begin_bootstrap());
        assert_eq!(lc.phase(), Phase::Bootstrapping);
        assert!(!lc.begin_bootstrap());
        lc.bootstrap_succeeded();
        assert!(!lc.begin_bootstrap());
        assert_eq!(lc.phase(), Phase::Running);
    }

    #[test]
    fn failed_bootstrap_terminates_without_running() {
        let mut lc = LifeCycle::new();
        assert!(lc.begin_bootstrap());
        lc.bootstrap_failed();
        assert_eq!(lc.phase(), Phase::Terminated);
        assert!(lc.exit_requested());
        assert!(!lc.should_draw());
    }

    #[test]
    fn exit_flag_suppresses_drawing() {
        let mut lc = LifeCycle::new();
        lc.begin_bootstrap();
        lc.bootstrap_succeeded();
        assert!(lc.should_draw());
        lc.request_exit();
        assert!(!lc.should_draw());
    }

    #[test]
    fn never_draws_outside_running() {
        let mut lc = LifeCycle::new();
        assert!(!lc.should_draw());
        lc.begin_bootstrap();
        assert!(!lc.should_draw());
        lc.bootstrap_succeeded();
        lc.begin_shutdown();
        assert!(!lc.should_draw());
        lc.finish_shutdown();
        assert_eq!(lc.phase(), Phase::Terminated);
    }

    #[test]
    fn shutdown_only_leaves_running() {
        let mut lc = LifeCycle::new();
        lc.begin_shutdown();
        assert_eq!(lc.phase(), Phase::Uninitialized);
        lc.begin_bootstrap();
        lc.bootstrap_succeeded();
        lc.begin_shutdown();
        assert_eq!(lc.phase(), Phase::ShuttingDown);
    }
}
