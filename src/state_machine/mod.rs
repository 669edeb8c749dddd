// State machine module for partition workers
//
// Named states and legal transitions for the per-partition trigger/flush
// protocol, so the revoke and shutdown drain paths share one code path.

pub mod states;

pub use states::PartitionState;
