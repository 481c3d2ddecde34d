use parking_lot::Mutex;

/// Power-management hooks. While insomnia is held the device must not enter low-power mode.
///
/// Calls nest: every enter is balanced by exactly one exit.
pub trait PowerControl: Send + Sync {
    fn insomnia_enter(&self);
    fn insomnia_exit(&self);
}

/// A counting insomnia holder, used when no real power service is attached.
#[derive(Debug, Default)]
pub struct Insomnia {
    level: Mutex<u32>,
}

impl Insomnia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth. Zero means the device may sleep.
    pub fn level(&self) -> u32 {
        *self.level.lock()
    }
}

impl PowerControl for Insomnia {
    fn insomnia_enter(&self) {
        let mut level = self.level.lock();
        *level += 1;
        tracing::trace!("insomnia enter: {}", *level);
    }

    fn insomnia_exit(&self) {
        let mut level = self.level.lock();
        match level.checked_sub(1) {
            Some(next) => {
                *level = next;
                tracing::trace!("insomnia exit: {}", next);
            }
            None => tracing::error!("insomnia exit without matching enter"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nesting() {
        let insomnia = Insomnia::new();
        insomnia.insomnia_enter();
        insomnia.insomnia_enter();
        assert_eq!(insomnia.level(), 2);
        insomnia.insomnia_exit();
        insomnia.insomnia_exit();
        assert_eq!(insomnia.level(), 0);
    }

    #[test]
    fn unbalanced_exit_saturates() {
        let insomnia = Insomnia::new();
        insomnia.insomnia_exit();
        assert_eq!(insomnia.level(), 0);
    }
}
