/// Interfaces Layer - External Entry Points
///
/// ## Modules
/// - `cli`: command line, logging setup, wiring and event replay

pub mod cli;
