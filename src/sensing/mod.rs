pub mod change;
pub mod controller;
pub mod loop_worker;
pub mod pipeline;

pub use change::{has_changed, ChangeDetector};
pub use controller::WatchController;
pub use loop_worker::{run_cycle, watch_loop, Collaborators, CycleOutcome, LoopConfig, RunStats};
pub use pipeline::Pipeline;
