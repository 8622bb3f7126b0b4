use rand::Rng;

/// One API call a load worker can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    CreateBarrel,
    ListBarrels,
    GetBarrel,
    DeleteBarrel,
    CreateMeasurement,
    ListMeasurements,
}

impl Op {
    pub fn method(&self) -> &'static str {
        match self {
            Op::CreateBarrel | Op::CreateMeasurement => "POST",
            Op::ListBarrels | Op::GetBarrel | Op::ListMeasurements => "GET",
            Op::DeleteBarrel => "DELETE",
        }
    }

    /// Logical endpoint label; ids are folded into `{id}` so reports group by route.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Op::CreateBarrel | Op::ListBarrels => "/barrels",
            Op::GetBarrel | Op::DeleteBarrel => "/barrels/{id}",
            Op::CreateMeasurement | Op::ListMeasurements => "/measurements",
        }
    }

    /// Whether the call targets a barrel created earlier in the run.
    pub fn needs_barrel(&self) -> bool {
        matches!(self, Op::GetBarrel | Op::DeleteBarrel | Op::CreateMeasurement)
    }
}

/// Workload profiles controlling the mix of operations the workers issue.
///
/// | Profile     | list B | get B | create B | delete B | create M | list M |
/// |-------------|--------|-------|----------|----------|----------|--------|
/// | ReadHeavy   |   30   |  40   |    15    |    0     |    5     |   10   |
/// | Balanced    |   15   |  25   |    25    |    5     |   20     |   10   |
/// | WriteHeavy  |    5   |  10   |    45    |   10     |   30     |    0   |
/// | CreateOnly  |    0   |   0   |   100    |    0     |    0     |    0   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadProfile {
    ReadHeavy,
    Balanced,
    WriteHeavy,
    CreateOnly,
}

impl WorkloadProfile {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "read-heavy" => Some(WorkloadProfile::ReadHeavy),
            "balanced" => Some(WorkloadProfile::Balanced),
            "write-heavy" => Some(WorkloadProfile::WriteHeavy),
            "create-only" => Some(WorkloadProfile::CreateOnly),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            WorkloadProfile::ReadHeavy => "read-heavy",
            WorkloadProfile::Balanced => "balanced",
            WorkloadProfile::WriteHeavy => "write-heavy",
            WorkloadProfile::CreateOnly => "create-only",
        }
    }

    /// Draw a random operation using `rng`.
    pub fn sample(&self, rng: &mut impl Rng) -> Op {
        let roll: u32 = rng.gen_range(0..100);
        self.op_for_roll(roll)
    }

    /// Map a roll in `0..100` to an `Op` according to the profile's percentages.
    /// Exposed for deterministic testing.
    pub fn op_for_roll(&self, roll: u32) -> Op {
        match self {
            WorkloadProfile::ReadHeavy => match roll {
                0..=29 => Op::ListBarrels,
                30..=69 => Op::GetBarrel,
                70..=84 => Op::CreateBarrel,
                85..=89 => Op::CreateMeasurement,
                _ => Op::ListMeasurements,
            },
            WorkloadProfile::Balanced => match roll {
                0..=14 => Op::ListBarrels,
                15..=39 => Op::GetBarrel,
                40..=64 => Op::CreateBarrel,
                65..=69 => Op::DeleteBarrel,
                70..=89 => Op::CreateMeasurement,
                _ => Op::ListMeasurements,
            },
            WorkloadProfile::WriteHeavy => match roll {
                0..=4 => Op::ListBarrels,
                5..=14 => Op::GetBarrel,
                15..=59 => Op::CreateBarrel,
                60..=69 => Op::DeleteBarrel,
                _ => Op::CreateMeasurement,
            },
            WorkloadProfile::CreateOnly => Op::CreateBarrel,
        }
    }
}
