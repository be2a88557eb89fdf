use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Cancellation flag shared between the accept loop and every suspended read.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_trigger() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();

        assert!(!observer.is_triggered());
        signal.trigger();
        assert!(observer.is_triggered());
    }
}
