use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use goscope::{cli, output, router};

fn main() -> ExitCode {
    let cli = cli::parse();

    // Logs go to stderr so rendered output on stdout stays clean.
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,goscope={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    match router::dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = output::format_error(&err, json);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
