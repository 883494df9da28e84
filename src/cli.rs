use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::output::Format;

/// goscope - extract a Go declaration and its dependencies for review
#[derive(Parser, Debug)]
#[command(name = "goscope", version, about)]
pub struct Cli {
    /// Output results as JSON (shortcut for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output on stderr (repeat for trace)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract the declaration at a position plus its dependency closure
    Extract(ExtractArgs),

    /// Print the declaration enclosing a position
    Locate(LocateArgs),
}

#[derive(clap::Args, Debug)]
pub struct PositionArgs {
    /// Go source file, absolute or relative to --root
    pub file: PathBuf,

    /// 1-based line
    #[arg(short, long)]
    pub line: usize,

    /// 1-based column (picks among declarations sharing the line)
    #[arg(short, long)]
    pub col: Option<usize>,

    /// Module root (directory containing go.mod)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub position: PositionArgs,

    /// Dependency depth (0 = target only)
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// Write the rendered extract to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only list external dependencies by name, without stub references
    #[arg(long)]
    pub no_stub_external: bool,

    /// Do not count builtins (len, string, error, ...) as external
    #[arg(long)]
    pub no_builtins: bool,
}

#[derive(clap::Args, Debug)]
pub struct LocateArgs {
    #[command(flatten)]
    pub position: PositionArgs,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_flags() {
        let cli = Cli::try_parse_from([
            "goscope", "extract", "svc/svc.go", "--line", "12", "--col", "3", "--depth", "2",
            "--format", "toon", "--no-builtins", "--root", "/src/app",
        ])
        .unwrap();
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.position.file, PathBuf::from("svc/svc.go"));
        assert_eq!(args.position.line, 12);
        assert_eq!(args.position.col, Some(3));
        assert_eq!(args.position.root, PathBuf::from("/src/app"));
        assert_eq!(args.depth, Some(2));
        assert_eq!(args.format, Some(Format::Toon));
        assert!(args.no_builtins);
        assert!(!args.no_stub_external);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["goscope", "locate", "a.go", "-l", "3", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        let Command::Locate(args) = cli.command else {
            panic!("expected locate");
        };
        assert_eq!(args.position.root, PathBuf::from("."));
        assert_eq!(args.position.col, None);
    }

    #[test]
    fn line_is_required() {
        assert!(Cli::try_parse_from(["goscope", "extract", "a.go"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["goscope", "-v", "-q", "locate", "a.go", "-l", "1"]).is_err());
    }
}
