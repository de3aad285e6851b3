use super::worker::WorkerProfile;
use crate::server::config::ServerConfig;
use core::ops::RangeInclusive;
use core::time::Duration;
use factory_core::WorkerId;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Draws a fresh capacity and service time for every worker of every order.
///
/// Equal range bounds give fixed parameters. A seeded source replays the
/// same sequence of profiles across runs.
#[derive(Debug)]
pub struct ProfileSource {
    rng: StdRng,
    capacity: RangeInclusive<u32>,
    duration_ms: RangeInclusive<u32>,
}

impl ProfileSource {
    pub fn new(
        capacity: RangeInclusive<u32>,
        duration_ms: RangeInclusive<u32>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            rng,
            capacity,
            duration_ms,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.capacity.clone(),
            config.duration_ms.clone(),
            config.seed,
        )
    }

    /// Profiles for workers `1..=count`.
    pub fn draw(&mut self, count: u32) -> Vec<WorkerProfile> {
        (1..=count)
            .map(|id| WorkerProfile {
                worker_id: WorkerId(id),
                capacity: self.rng.random_range(self.capacity.clone()).max(1),
                duration: Duration::from_millis(u64::from(
                    self.rng.random_range(self.duration_ms.clone()),
                )),
            })
            .collect()
    }
}
