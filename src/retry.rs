//! 再試行ポリシー
//!
//! 書き込み上限・一時的なIOエラーだけを対象に、線形に間隔を延ばしながら再試行する。

use crate::error::Result;
use log::warn;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 初回を含む試行回数
    pub attempts: u32,
    /// 1回目の待ち時間（n回目は n 倍）
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// `op` を実行し、再試行可能なエラーなら `policy` に従って繰り返す
pub fn with_retry<T, F>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let wait = policy.delay * attempt;
                warn!(
                    "{} 失敗 ({}/{}): {} / {}ms 後に再試行",
                    label,
                    attempt,
                    attempts,
                    e,
                    wait.as_millis()
                );
                thread::sleep(wait);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
