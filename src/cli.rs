use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the configured folder and process new audio files (default)
    Watch,

    /// Re-run one job starting at a given step, then exit
    Resume {
        /// Base name of the job (audio filename without extension)
        #[arg(short, long)]
        base: String,

        /// Step to start from: 1 transcribe, 2 convert, 3 translate
        #[arg(short = 's', long, value_parser = clap::value_parser!(u8).range(1..=3))]
        from_step: u8,
    },

    /// Show the persisted progress record for one job
    Status {
        /// Base name of the job
        #[arg(short, long)]
        base: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_is_the_default() {
        let args = Args::parse_from(["subflow"]);
        assert!(args.command.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_resume_arguments() {
        let args = Args::parse_from(["subflow", "resume", "--base", "demo", "--from-step", "2"]);
        match args.command {
            Some(Commands::Resume { base, from_step }) => {
                assert_eq!(base, "demo");
                assert_eq!(from_step, 2);
            }
            _ => panic!("expected resume command"),
        }
    }

    #[test]
    fn test_resume_rejects_out_of_range_step() {
        assert!(Args::try_parse_from(["subflow", "resume", "-b", "demo", "-s", "4"]).is_err());
    }
}
