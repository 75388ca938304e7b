//! 재연결 백오프 정책.

use std::time::Duration;

use live_core::ReconnectConfig;

/// 지수 백오프 재연결 정책.
///
/// `attempt`는 1부터 시작합니다. `max_attempts`가 0이면 재연결하지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    /// 설정에서 정책 생성.
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier.max(1.0),
        }
    }

    /// 재연결 비활성화 정책.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// 재연결 허용 여부.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// 해당 시도가 허용되는지 확인.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }

    /// 해당 시도 전에 대기할 시간 (상한 적용).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_grows_and_caps() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(30));
        assert_eq!(policy.delay_for(100), Duration::from_secs(30));
    }

    #[test]
    fn test_attempt_limit() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.allows(0));
        assert!(policy.allows(1));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));

        let disabled = ReconnectPolicy::disabled();
        assert!(!disabled.is_enabled());
        assert!(!disabled.allows(1));
    }
}
