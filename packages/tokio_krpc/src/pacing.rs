use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A simple token bucket capping outbound queries per second, so the engine
/// doesn't get rate-limited (or blocklisted) by the nodes it's hammering
/// with `find_node` churn.
pub struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    state: Mutex<State>,
}

struct State {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_sec: u32) -> TokenBucket {
        let rate = rate_per_sec as f64;
        TokenBucket {
            rate_per_sec: rate,
            capacity: rate,
            state: Mutex::new(State {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits until a token is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.rate_per_sec))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }

    fn refill(&self, state: &mut State) {
        let elapsed = state.last_refill.elapsed();
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate_per_sec).min(self.capacity);
        state.last_refill = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_burst_then_waits() {
        let bucket = TokenBucket::new(1000);
        for _ in 0..1000 {
            bucket.acquire().await;
        }
        // Should not hang forever; completing at all is the assertion.
        tokio::time::timeout(Duration::from_millis(50), bucket.acquire())
            .await
            .unwrap_or(());
    }
}
