//! Static per-region program parameters and observation benchmarks.
//!
//! These are configuration constants, not derived data: school, teacher and
//! student counts supplied by the program teams, and the coach capacity
//! model used to benchmark observation volume.

use crate::Region;

/// Region Parameter Set: a constant lookup with no lifecycle beyond
/// process startup. `None` means the parameter is not tracked for the
/// region (e.g. Rumi coaches teachers only, with no school roster).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionParams {
    pub coaches: Option<u32>,
    pub schools: Option<u32>,
    pub teachers: Option<u32>,
    pub students: Option<u32>,
}

pub fn region_params(region: Region) -> RegionParams {
    match region {
        Region::Ict => RegionParams {
            coaches: Some(55),
            schools: Some(465),
            teachers: Some(10_309),
            students: Some(90_000),
        },
        Region::Balochistan => RegionParams {
            coaches: None,
            schools: Some(69),
            teachers: Some(933),
            students: Some(6_733),
        },
        // 4 training managers + 23 AEOs
        Region::Rawalpindi => RegionParams {
            coaches: Some(27),
            schools: Some(260),
            teachers: Some(900),
            students: Some(37_000),
        },
        Region::Moawin => RegionParams {
            coaches: None,
            schools: Some(236),
            teachers: Some(602),
            students: Some(18_758),
        },
        Region::Rumi => RegionParams {
            coaches: None,
            schools: None,
            teachers: Some(1_871),
            students: None,
        },
    }
}

/// Expected observation capacity: coaches x observations/day x working
/// days/month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationBenchmark {
    pub coaches: u32,
    pub obs_per_day: u32,
    pub working_days: u32,
}

impl ObservationBenchmark {
    pub fn monthly(&self) -> u32 {
        self.coaches * self.obs_per_day * self.working_days
    }
}

/// Only the coach-led programs carry an observation benchmark.
pub fn observation_benchmark(region: Region) -> Option<ObservationBenchmark> {
    let coaches = match region {
        Region::Ict => 55,
        Region::Rawalpindi => 27,
        _ => return None,
    };
    Some(ObservationBenchmark {
        coaches,
        obs_per_day: 4,
        working_days: 22,
    })
}
