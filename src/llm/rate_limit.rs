//! 出站 LLM 请求的令牌桶限流
//!
//! 全进程构造一次，经 ThrottledClient 包装后注入所有调用 LLM 的组件，
//! 共享同一请求预算；只限制请求速率，不承担正确性语义。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::llm::LlmClient;
use crate::memory::Message;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// 令牌桶：capacity 决定突发量，rate 决定稳态速率
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    state: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, max_bucket_size: u32) -> Self {
        let capacity = f64::from(max_bucket_size.max(1));
        Self {
            rate: requests_per_second,
            capacity,
            state: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 取得一个请求令牌；桶空时挂起等待补充。rate <= 0 时不限流。
    pub async fn acquire(&self) {
        if self.rate <= 0.0 {
            return;
        }
        loop {
            let wait = {
                let mut bucket = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
                bucket.last_refill = now;
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

/// LlmClient 包装：每次 complete 前先从共享令牌桶取令牌
pub struct ThrottledClient {
    inner: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn LlmClient>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl LlmClient for ThrottledClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.limiter.acquire().await;
        self.inner.complete(messages).await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_within_capacity_is_immediate() {
        let limiter = RateLimiter::new(1.0, 3);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_bucket_waits_for_refill() {
        let limiter = RateLimiter::new(2.0, 1);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        // 速率 2/s，第二个令牌需等约 0.5s
        assert!(start.elapsed() >= Duration::from_millis(490));
    }

    #[tokio::test]
    async fn zero_rate_disables_limiting() {
        let limiter = RateLimiter::new(0.0, 1);
        for _ in 0..100 {
            limiter.acquire().await;
        }
    }
}
