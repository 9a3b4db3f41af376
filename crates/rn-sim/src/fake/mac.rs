//! `mac` commands

use std::time::Duration;

use rn_protocol::MAX_PAUSE_DURATION;
use tokio::time::Instant;
use tracing::debug;

use super::Session;
use crate::error::SimError;

#[derive(Debug, Default)]
pub(crate) struct MacState {
    /// When a pause of the LoRaWAN stack runs out
    paused_until: Option<Instant>,
}

impl MacState {
    /// Pause the stack for as long as the module allows
    pub fn pause(&mut self) -> Duration {
        self.paused_until = Instant::now().checked_add(MAX_PAUSE_DURATION);
        MAX_PAUSE_DURATION
    }

    pub fn resume(&mut self) {
        self.paused_until = None;
    }

    pub fn is_paused(&self) -> bool {
        self.paused_until
            .is_some_and(|until| until > Instant::now())
    }
}

impl Session {
    pub(super) async fn mac(&mut self, params: &[&str]) -> Result<(), SimError> {
        match params {
            ["pause"] => {
                let duration = self.state().mac.pause();
                debug!("MAC paused for {:?}", duration);
                self.respond(duration.as_millis()).await
            }
            ["resume"] => {
                self.state().mac.resume();
                self.ok().await
            }
            _ => self.invalid_param().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_expires() {
        let mut mac = MacState::default();
        assert!(!mac.is_paused());

        assert_eq!(mac.pause(), MAX_PAUSE_DURATION);
        assert!(mac.is_paused());

        tokio::time::advance(MAX_PAUSE_DURATION).await;
        assert!(!mac.is_paused());

        mac.pause();
        mac.resume();
        assert!(!mac.is_paused());
    }
}
