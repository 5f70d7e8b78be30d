//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `reduce`   | `Reduce`         |
//! | `plan`     | `Plan`           |
//! | `divisors` | `Divisors`       |
//! | `config`   | `Config`         |

pub mod config;
pub mod divisors;
pub mod plan;
pub mod reduce;

pub use config::cmd_config;
pub use divisors::cmd_divisors;
pub use plan::cmd_plan;
pub use reduce::cmd_reduce;
