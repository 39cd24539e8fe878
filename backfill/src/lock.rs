use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use types::Market;

use crate::error::BackfillError;

/// Markets with a backfill in flight. At most one run per market.
#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    active: Arc<Mutex<HashSet<Market>>>,
}

impl RunLocks {
    pub fn acquire(&self, market: &Market) -> Result<RunGuard, BackfillError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if !active.insert(market.clone()) {
            return Err(BackfillError::AlreadyRunning(market.clone()));
        }
        return Ok(RunGuard {
            active: self.active.clone(),
            market: market.clone(),
        });
    }

    pub fn is_active(&self, market: &Market) -> bool {
        return self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(market);
    }
}

/// Releases the market when dropped.
#[derive(Debug)]
pub struct RunGuard {
    active: Arc<Mutex<HashSet<Market>>>,
    market: Market,
}

impl RunGuard {
    pub fn market(&self) -> &Market {
        return &self.market;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.market);
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use types::Market;

    use crate::{error::BackfillError, testing::market};

    use super::RunLocks;

    #[test]
    fn one_run_per_market() {
        let locks = RunLocks::default();
        let eth = market();
        let btc = Market::from_str("KRW-BTC").unwrap();

        let guard = locks.acquire(&eth).expect("first run should acquire");
        assert!(locks.is_active(&eth));
        assert!(matches!(
            locks.acquire(&eth),
            Err(BackfillError::AlreadyRunning(_))
        ));
        let other = locks
            .acquire(&btc)
            .expect("another market should not be blocked");

        drop(guard);
        assert!(!locks.is_active(&eth));
        locks
            .acquire(&eth)
            .expect("released market should acquire again");
        drop(other);
    }
}
