use barrelmon_common::config::TestDataConfig;
use barrelmon_common::{NewBarrel, NewMeasurement};
use rand::Rng;
use uuid::Uuid;

/// Generates request payloads within the configured value ranges.
#[derive(Debug, Clone, Default)]
pub struct TestDataFactory {
    config: TestDataConfig,
}

impl TestDataFactory {
    pub fn new(config: TestDataConfig) -> Self {
        Self { config }
    }

    /// A barrel whose three tags share one short unique suffix.
    pub fn barrel(&self) -> NewBarrel {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        NewBarrel { qr: format!("QR-{suffix}"), rfid: format!("RFID-{suffix}"), nfc: format!("NFC-{suffix}") }
    }

    pub fn measurement(&self, barrel_id: &str, rng: &mut impl Rng) -> NewMeasurement {
        NewMeasurement {
            barrel_id: barrel_id.to_string(),
            dirt_level: sample_range(self.config.dirt_level_range, rng),
            weight: sample_range(self.config.weight_range, rng),
        }
    }
}

/// Uniform draw from `[lo, hi]`, rounded to two decimals. A reversed, empty or
/// non-finite range yields `lo`, or 0 when `lo` is not finite either.
fn sample_range([lo, hi]: [f64; 2], rng: &mut impl Rng) -> f64 {
    if !(lo < hi && (hi - lo).is_finite()) {
        return if lo.is_finite() { lo } else { 0.0 };
    }
    ((rng.gen_range(lo..=hi) * 100.0).round() / 100.0).clamp(lo, hi)
}
