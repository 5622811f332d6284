use rand::Rng;
use std::time::Duration;

use crate::config::PollerConfig;

/// ジッタの最大割合（遅延の25%まで加算）
const JITTER_RATIO: f64 = 0.25;

/// 通信エラー時のリトライ間隔を管理する構造体
///
/// 連続失敗ごとに待機時間を倍にする（1s→2s→4s→8s...）。
/// 失敗回数がmax_attemptsに達したらポーリングを諦める。
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    jitter: bool,
    failures: u32,
}

impl ExponentialBackoff {
    /// カスタム設定で作成（ジッタなし）
    pub fn with_config(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
            jitter: false,
            failures: 0,
        }
    }

    /// ポーラー設定から作成
    pub fn from_config(config: &PollerConfig) -> Self {
        let backoff = Self::with_config(
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
            config.max_retry_attempts,
        );
        if config.retry_jitter {
            backoff.with_jitter()
        } else {
            backoff
        }
    }

    /// ジッタを有効化（複数クライアントの同時リトライを分散させる）
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// 失敗を記録し、次のリトライまでの待機時間を返す
    ///
    /// 計算式: base_delay * 2^(失敗回数-1)、max_delayで頭打ち
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.failures.min(31);
        self.failures = self.failures.saturating_add(1);

        let delay = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let extra = rand::thread_rng().gen_range(0.0..=JITTER_RATIO);
            delay.mul_f64(1.0 + extra)
        } else {
            delay
        }
    }

    /// 成功時に呼び出してカウンターをリセット
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// 連続失敗回数
    pub fn attempt_count(&self) -> u32 {
        self.failures
    }

    pub fn has_exceeded_max_attempts(&self) -> bool {
        self.failures >= self.max_attempts
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&PollerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_progression() {
        let mut backoff =
            ExponentialBackoff::with_config(Duration::from_secs(1), Duration::from_secs(20), 10);

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(16));
        assert_eq!(backoff.next_delay(), Duration::from_secs(20)); // 32 -> max 20
        assert_eq!(backoff.attempt_count(), 6);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff =
            ExponentialBackoff::with_config(Duration::from_millis(500), Duration::from_secs(10), 5);

        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.attempt_count(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_max_attempts() {
        let mut backoff =
            ExponentialBackoff::with_config(Duration::from_secs(1), Duration::from_secs(60), 2);

        backoff.next_delay();
        assert!(!backoff.has_exceeded_max_attempts());
        backoff.next_delay();
        assert!(backoff.has_exceeded_max_attempts());

        backoff.reset();
        assert!(!backoff.has_exceeded_max_attempts());
    }

    #[test]
    fn test_from_config_applies_jitter_setting() {
        let config = PollerConfig {
            retry_base_delay_ms: 1000,
            retry_jitter: false,
            ..PollerConfig::default()
        };
        let mut exact = ExponentialBackoff::from_config(&config);
        assert_eq!(exact.next_delay(), Duration::from_secs(1));
        assert_eq!(exact.next_delay(), Duration::from_secs(2));

        let mut jittered = ExponentialBackoff::from_config(&PollerConfig {
            retry_jitter: true,
            ..config
        });
        let delay = jittered.next_delay();
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1250));
    }

    #[test]
    fn test_jitter_bounds() {
        let mut backoff =
            ExponentialBackoff::with_config(Duration::from_secs(1), Duration::from_secs(60), 10)
                .with_jitter();

        for _ in 0..20 {
            backoff.reset();
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_huge_attempt_count_does_not_overflow() {
        let mut backoff =
            ExponentialBackoff::with_config(Duration::from_secs(1), Duration::from_secs(60), 100);
        for _ in 0..40 {
            assert!(backoff.next_delay() <= Duration::from_secs(60));
        }
    }
}
