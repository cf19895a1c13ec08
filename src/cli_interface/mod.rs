//! command line interface of the `mfs` binary
mod cli_struct;
pub use cli_struct::*;
