/// Reason a guard refused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocker {
    pub code: &'static str,
    pub message: &'static str,
}

/// Guards inspect the subject and veto a transition with a [`Blocker`].
pub type Guard<C> = fn(&C) -> Option<Blocker>;

/// Hooks run after a transition is accepted, before the caller persists the
/// new state. They must not fail; the machines use them for logging.
pub type Hook<C> = fn(&C);

pub struct TransitionDef<S, C> {
    pub name: &'static str,
    pub from: S,
    pub to: S,
    pub guards: Vec<Guard<C>>,
    pub hooks: Vec<Hook<C>>,
}

/// A transition table over states `S` for subjects described by `C`.
pub struct Machine<S, C> {
    transitions: Vec<TransitionDef<S, C>>,
}

/// A refused transition. Carries the state the subject was in and the
/// transitions that would have been accepted instead.
#[derive(Debug, Clone)]
pub struct Rejection<S> {
    pub current: S,
    pub blockers: Vec<Blocker>,
    pub enabled: Vec<&'static str>,
}

impl<S: std::fmt::Debug> std::fmt::Display for Rejection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.blockers.is_empty() {
            write!(
                f,
                "transition not defined from {:?}; enabled: {:?}",
                self.current, self.enabled
            )
        } else {
            let codes: Vec<&str> = self.blockers.iter().map(|b| b.code).collect();
            write!(
                f,
                "transition blocked from {:?} by {:?}; enabled: {:?}",
                self.current, codes, self.enabled
            )
        }
    }
}

impl<S: std::fmt::Debug> std::error::Error for Rejection<S> {}

impl<S: Copy + PartialEq, C> Machine<S, C> {
    pub fn new(transitions: Vec<TransitionDef<S, C>>) -> Self {
        Self { transitions }
    }

    fn lookup(&self, from: S, name: &str) -> Option<&TransitionDef<S, C>> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.name == name)
    }

    /// Whether `name` is structurally defined from `current` and all of its
    /// guards pass for `subject`.
    pub fn can(&self, current: S, subject: &C, name: &str) -> bool {
        match self.lookup(current, name) {
            Some(t) => t.guards.iter().all(|guard| guard(subject).is_none()),
            None => false,
        }
    }

    /// Guard verdicts for a structurally valid transition. Empty means the
    /// transition would be accepted; an undefined transition also yields an
    /// empty list, use [`Machine::can`] to distinguish.
    pub fn blockers(&self, current: S, subject: &C, name: &str) -> Vec<Blocker> {
        match self.lookup(current, name) {
            Some(t) => t.guards.iter().filter_map(|guard| guard(subject)).collect(),
            None => Vec::new(),
        }
    }

    /// Names of transitions accepted from `current` for `subject`.
    pub fn enabled(&self, current: S, subject: &C) -> Vec<&'static str> {
        self.transitions
            .iter()
            .filter(|t| t.from == current && t.guards.iter().all(|guard| guard(subject).is_none()))
            .map(|t| t.name)
            .collect()
    }

    /// Run guards, then hooks, and return the target state. The subject is
    /// not mutated; the caller persists the returned state.
    pub fn apply(&self, current: S, subject: &C, name: &str) -> Result<S, Rejection<S>> {
        let Some(transition) = self.lookup(current, name) else {
            return Err(Rejection {
                current,
                blockers: Vec::new(),
                enabled: self.enabled(current, subject),
            });
        };

        let blockers: Vec<Blocker> = transition
            .guards
            .iter()
            .filter_map(|guard| guard(subject))
            .collect();
        if !blockers.is_empty() {
            return Err(Rejection {
                current,
                blockers,
                enabled: self.enabled(current, subject),
            });
        }

        for hook in &transition.hooks {
            hook(subject);
        }
        Ok(transition.to)
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
