use clap::Parser;
use istanbul_sourcemap::cli::{
    Cli, Commands, execute_lookup_command, execute_remap_command, init_logging,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Remap(args) => {
            execute_remap_command(&args)?;
        }
        Commands::Lookup { map, line, column } => {
            execute_lookup_command(&map, line, column)?;
        }
    }

    Ok(())
}
