use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version = "0.1.0")]
#[command(
    about = "A service that distributes ERC-20 tokens to a recipient list in randomized daily sessions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start one distribution worker per configured account
    Start {
        /// Path to config.yaml file
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Generate a sample config file
    GenerateConfig {
        /// Path to output config file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_uses_default_config_path() {
        let cli = Cli::try_parse_from(["token-distributor", "start"]).unwrap();
        match cli.command {
            Commands::Start { config } => assert_eq!(config, PathBuf::from("config.yaml")),
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn test_generate_config_output_flag() {
        let cli =
            Cli::try_parse_from(["token-distributor", "generate-config", "-o", "out.yaml"]).unwrap();
        match cli.command {
            Commands::GenerateConfig { output } => assert_eq!(output, PathBuf::from("out.yaml")),
            _ => panic!("expected generate-config"),
        }
    }
}
