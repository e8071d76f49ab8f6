use rand::Rng;
use std::time::Duration;

/// Calculate exponential backoff delay with jitter for initialization
/// retries. The backing storage may not be ready at extension load time,
/// so early attempts back off briefly rather than hammering it.
pub fn init_backoff_delay(attempt: u32, base_delay_ms: u64) -> Duration {
    // Cap the exponent so the delay stays bounded
    let capped_attempt = attempt.min(6);

    let base_delay = base_delay_ms.saturating_mul(2_u64.saturating_pow(capped_attempt));

    // Add jitter: ±30% randomness
    let jitter_factor = rand::thread_rng().gen_range(0.7..1.3);
    let delay_with_jitter = (base_delay as f64 * jitter_factor).round() as u64;

    Duration::from_millis(delay_with_jitter)
}
