//! Mode routing
//!
//! One entry point per subcommand. Each returns the process exit code.

mod config_gen;
mod lookup;
mod refresh;
mod serve;

pub use config_gen::config_generate;
pub use lookup::run_lookup;
pub use refresh::run_refresh;
pub use serve::run_serve;
