use crate::constants::{MAX_RECOMMENDED_REFRESH, MIN_RECOMMENDED_REFRESH};
use crate::error::{Error, Result};
use std::time::Duration;

/// Parameters for opening a converter session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    device_index: u32,
    refresh_interval: Duration,
    connect_timeout: Duration,
    poll_interval: Duration,
    settle_margin: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_index: 1,
            refresh_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            settle_margin: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1-based ordinal among the attached converters.
    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    pub fn with_device_index(mut self, index: u32) -> Self {
        self.device_index = index;
        self
    }

    /// How often the vendor library refreshes its copy of the device state.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Pause between connection polls. Zero polls in a tight loop.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Extra wait on top of one refresh interval after connecting.
    pub fn settle_margin(&self) -> Duration {
        self.settle_margin
    }

    pub fn with_settle_margin(mut self, margin: Duration) -> Self {
        self.settle_margin = margin;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        self.refresh_interval.saturating_add(self.settle_margin)
    }

    /// Refresh interval in the vendor's millisecond unit.
    pub fn refresh_timer_ms(&self) -> u32 {
        u32::try_from(self.refresh_interval.as_millis()).unwrap_or(u32::MAX)
    }

    pub fn is_refresh_recommended(&self) -> bool {
        (MIN_RECOMMENDED_REFRESH..=MAX_RECOMMENDED_REFRESH).contains(&self.refresh_interval)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_index == 0 {
            return Err(Error::InvalidDeviceIndex(self.device_index));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_vendor_sample() {
        let config = SessionConfig::default();
        assert_eq!(config.device_index(), 1);
        assert_eq!(config.refresh_timer_ms(), 1_000);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert!(config.is_refresh_recommended());
    }

    #[test]
    fn refresh_timer_saturates() {
        let config = SessionConfig::new().with_refresh_interval(Duration::from_secs(u64::MAX));
        assert_eq!(config.refresh_timer_ms(), u32::MAX);
        assert!(!config.is_refresh_recommended());
    }

    #[test]
    fn zero_device_index_is_rejected() {
        let config = SessionConfig::new().with_device_index(0);
        assert!(matches!(config.validate(), Err(Error::InvalidDeviceIndex(0))));
        assert!(SessionConfig::new().with_device_index(3).validate().is_ok());
    }
}
