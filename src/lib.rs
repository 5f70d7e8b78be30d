pub mod config;
pub mod divisors;
pub mod errors;
pub mod logging;
pub mod reducer;
pub mod registry;
pub mod snapshot;

/// Opaque token identifier; equality is by value.
pub type TokenId = u64;

pub use divisors::{Divisor, DivisorTable, Round};
pub use errors::{DivisorError, ReduceError, RegistryError, SnapshotError};
pub use reducer::{Plan, ReduceOptions, Reducer, Reduction, RoundPlan, partition, plan};
pub use registry::{InMemoryRegistry, Registry};
pub use snapshot::{FileSnapshot, MemorySnapshot, NoopSnapshot, Snapshot};
