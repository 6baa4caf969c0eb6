//! Cooperative shutdown flag raised by SIGINT, SIGTERM or SIGHUP.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle to one shared flag. Once raised it stays raised.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Raises the flag programmatically.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Registers the termination signals so they only raise the flag. The
    /// polling loop notices on its next slice and winds down.
    pub fn install_signal_handlers(&self) -> Result<()> {
        let mut signals = vec![SIGINT, SIGTERM];
        #[cfg(unix)]
        signals.push(signal_hook::consts::SIGHUP);

        for signal in signals {
            signal_hook::flag::register(signal, Arc::clone(&self.flag))
                .map_err(Error::from)
                .with_msg(format!("Installing handler for signal {signal} failed"))?;
        }
        tracing::debug!("Installed shutdown signal handlers");
        Ok(())
    }
}
