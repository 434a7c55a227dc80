// shutdown.rs: a shared shutdown flag that blocking waits observe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// A clonable shutdown flag.
///
/// Blocking waits poll the flag between wait slices and give up once it is
/// triggered. [`ShutdownToken::process`] returns the token shared by the
/// whole process; [`ShutdownToken::new`] creates an independent one.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide token.
    pub fn process() -> Self {
        static PROCESS: OnceLock<ShutdownToken> = OnceLock::new();
        PROCESS.get_or_init(ShutdownToken::new).clone()
    }

    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("shutdown requested");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = ShutdownToken::new();
        let clone = token.clone();
        assert!(!clone.is_triggered());
        token.trigger();
        assert!(clone.is_triggered());
    }

    #[test]
    fn independent_tokens_do_not_interfere() {
        let a = ShutdownToken::new();
        let b = ShutdownToken::new();
        a.trigger();
        assert!(!b.is_triggered());
    }

    #[test]
    fn process_token_is_shared() {
        let a = ShutdownToken::process();
        let b = ShutdownToken::process();
        assert!(Arc::ptr_eq(&a.flag, &b.flag));
    }
}
