use uuid::Uuid;

/// Prefix carried by randomly minted block ids
pub const RANDOM_ID_PREFIX: &str = "block";

#[derive(Debug, Clone)]
enum Strategy {
    Random,
    Sequential { seed: String, count: u64 },
}

/// Block id generator
///
/// Editing sessions use random ids so that ids never repeat across sessions
/// or documents. Sequential ids exist for tests and offline tooling where
/// reproducible output matters.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    strategy: Strategy,
}

impl IdGenerator {
    pub fn random() -> Self {
        Self {
            strategy: Strategy::Random,
        }
    }

    pub fn sequential(seed: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Sequential {
                seed: seed.into(),
                count: 0,
            },
        }
    }

    /// Generate the next id
    pub fn new_id(&mut self) -> String {
        match &mut self.strategy {
            Strategy::Random => format!("{}-{}", RANDOM_ID_PREFIX, Uuid::new_v4().simple()),
            Strategy::Sequential { seed, count } => {
                *count += 1;
                format!("{}-{}", seed, count)
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::random()
    }
}
