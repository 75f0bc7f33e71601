#[path = "integration/scenarios.rs"]
mod scenarios;
#[path = "integration/incremental.rs"]
mod incremental;
#[path = "integration/cycles.rs"]
mod cycles;
#[path = "integration/failures.rs"]
mod failures;
#[path = "integration/cli.rs"]
mod cli;
