pub mod commands;

pub use commands::{
    Cli, Commands, RemapArgs, execute_lookup_command, execute_remap_command, init_logging,
};
