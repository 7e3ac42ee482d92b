use rustc_hash::FxHashMap;

/// Runtime behind `h.start` and `h.stop`. Calls are fire-and-forget.
pub trait SystemHandlers {
    fn run(&mut self, name: &str);
    fn stop(&mut self, name: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Running,
    Stopped,
}

/// Tracks the lifecycle of every handler it was asked to start.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<String, HandlerState>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, name: &str) -> Option<HandlerState> {
        self.handlers.get(name).copied()
    }
}

impl SystemHandlers for HandlerRegistry {
    fn run(&mut self, name: &str) {
        match self.handlers.insert(name.to_string(), HandlerState::Running) {
            Some(HandlerState::Running) => tracing::warn!(handler = name, "already running"),
            _ => tracing::info!(handler = name, "started"),
        }
    }

    fn stop(&mut self, name: &str) {
        match self.handlers.get_mut(name) {
            Some(state) if *state == HandlerState::Running => {
                *state = HandlerState::Stopped;
                tracing::info!(handler = name, "stopped");
            }
            Some(_) => tracing::warn!(handler = name, "already stopped"),
            None => tracing::warn!(handler = name, "stop requested before start"),
        }
    }
}
