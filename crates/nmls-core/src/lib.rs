#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod paths;
pub mod pkg;
pub mod version;

pub use config::{LsConfig, OutputFormat};
pub use error::Error;
pub use pkg::{run_ls, LsOutcome, LsStatus, RenderOptions};
pub use version::VERSION;
