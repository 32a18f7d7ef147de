//! オートフロー間の待機時間
//!
//! 設定値 `autoflow_delay` は `"random"`（5〜10 秒の一様乱数、両端を含む）
//! または秒数を表す整数です。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// ランダム待機の下限（秒）
pub const RANDOM_MIN_SECS: u64 = 5;
/// ランダム待機の上限（秒、含む）
pub const RANDOM_MAX_SECS: u64 = 10;

/// 1 アイテム処理後の待機方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDelay {
    Fixed(u64),
    Random,
}

impl Default for PacingDelay {
    fn default() -> Self {
        PacingDelay::Fixed(5)
    }
}

impl PacingDelay {
    /// スレッドローカルの乱数で待機時間を決める
    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match self {
            PacingDelay::Fixed(secs) => Duration::from_secs(*secs),
            PacingDelay::Random => Duration::from_secs(rng.gen_range(RANDOM_MIN_SECS..=RANDOM_MAX_SECS)),
        }
    }
}

impl fmt::Display for PacingDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacingDelay::Fixed(secs) => write!(f, "{secs}"),
            PacingDelay::Random => f.write_str("random"),
        }
    }
}

impl FromStr for PacingDelay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("random") {
            return Ok(PacingDelay::Random);
        }
        s.parse::<u64>()
            .map(PacingDelay::Fixed)
            .map_err(|_| ConfigError::Validation(format!("autoflow_delay は \"random\" または秒数で指定してください: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_parse() {
        assert_eq!("random".parse::<PacingDelay>().unwrap(), PacingDelay::Random);
        assert_eq!("8".parse::<PacingDelay>().unwrap(), PacingDelay::Fixed(8));
        assert_eq!(" 0 ".parse::<PacingDelay>().unwrap(), PacingDelay::Fixed(0));
        assert!("soon".parse::<PacingDelay>().is_err());
    }

    #[test]
    fn test_fixed_sample() {
        assert_eq!(PacingDelay::Fixed(7).sample(), Duration::from_secs(7));
    }

    #[test]
    fn test_random_sample_stays_in_range_and_hits_both_ends() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..500 {
            let secs = PacingDelay::Random.sample_with(&mut rng).as_secs();
            assert!((RANDOM_MIN_SECS..=RANDOM_MAX_SECS).contains(&secs));
            seen.insert(secs);
        }
        assert_eq!(seen.len(), 6);
    }
}
