//! # Limitador de Taxa
//!
//! O serviço de busca exige um intervalo mínimo entre consultas. O intervalo
//! é medido entre o **início** de duas chamadas consecutivas a [`RateLimiter::acquire`].
//! A trava fica retida durante a espera, então chamadores concorrentes são
//! serializados globalmente por um único limitador compartilhado.
//!
//! O relógio é injetado ([`Clock`]) para que os testes verifiquem o
//! espaçamento sem dormir de verdade.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

/// Fonte de tempo e de espera.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Relógio real do sistema.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Garante `min_interval` entre o início de consultas consecutivas.
pub struct RateLimiter {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            clock,
            last_start: Mutex::new(None),
        }
    }

    /// Bloqueia até que a próxima consulta possa começar e registra o início.
    pub fn acquire(&self) {
        let mut last = self.lock();
        if let Some(previous) = *last {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Aguardando intervalo mínimo");
                self.clock.sleep(wait);
            }
        }
        *last = Some(self.clock.now());
    }

    /// Espera arbitrária (backoff) usando o mesmo relógio.
    pub fn pause(&self, duration: Duration) {
        self.clock.sleep(duration);
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        // O estado é só um instante; um pânico em outra thread não o corrompe.
        self.last_start.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    #[test]
    fn test_first_call_does_not_wait() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_secs(3), clock.clone());
        limiter.acquire();
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_consecutive_calls_are_spaced() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_secs(3), clock.clone());

        let mut starts = vec![];
        for _ in 0..4 {
            limiter.acquire();
            starts.push(clock.now());
            // Trabalho simulado mais curto que o intervalo.
            clock.advance(Duration::from_millis(500));
        }

        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
        assert_eq!(clock.total_slept(), Duration::from_millis(2_500) * 3);
    }

    #[test]
    fn test_no_wait_when_interval_already_elapsed() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_secs(3), clock.clone());
        limiter.acquire();
        clock.advance(Duration::from_secs(5));
        limiter.acquire();
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(40)));
        let begin = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.acquire())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Três inícios espaçados: o último começa pelo menos 2 intervalos depois do primeiro.
        assert!(begin.elapsed() >= Duration::from_millis(80));
    }
}
