use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;

use crate::cli::{Cli, Command, ExtractArgs, LocateArgs, PositionArgs};
use crate::config::Config;
use crate::errors::ScopeError;
use crate::extract;
use crate::locator;
use crate::output::{Format, Formatter};
use crate::program::{GoProgram, LoadOptions};
use crate::types::Target;

pub fn dispatch(cli: Cli) -> Result<(), ScopeError> {
    match cli.command {
        Command::Extract(args) => run_extract(args, cli.json),
        Command::Locate(args) => run_locate(args, cli.json),
    }
}

fn check_root(root: &Path) -> Result<(), ScopeError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ScopeError::Usage(format!(
            "module root is not a directory: {}",
            root.display()
        )))
    }
}

fn target_of(position: &PositionArgs) -> Target {
    Target {
        root: position.root.clone(),
        file: position.file.clone(),
        line: position.line,
        column: position.col,
    }
}

fn run_extract(args: ExtractArgs, json: bool) -> Result<(), ScopeError> {
    let root = &args.position.root;
    check_root(root)?;
    let config = Config::load(Some(root))?;

    // CLI flags override configuration.
    let mut options = config.options()?;
    if let Some(depth) = args.depth {
        options.depth = depth;
    }
    if args.no_stub_external {
        options.stub_external = false;
    }
    if args.no_builtins {
        options.include_builtins = false;
    }
    let format = match (args.format, json) {
        (Some(f), _) => f,
        (None, true) => Format::Json,
        (None, false) => config.format()?,
    };
    let load = LoadOptions {
        ignore_patterns: config.ignore.patterns.clone(),
    };

    let report = extract::run(&target_of(&args.position), &options, &load)?;

    let stdout = std::io::stdout();
    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(stdout.lock()),
    };
    Formatter::new(&mut writer, format).format_report(&report)?;
    writer.flush()?;
    if let Some(path) = &args.output {
        tracing::info!(path = %path.display(), format = %format, "wrote extract");
    }
    Ok(())
}

fn run_locate(args: LocateArgs, json: bool) -> Result<(), ScopeError> {
    let root = &args.position.root;
    check_root(root)?;
    let config = Config::load(Some(root))?;
    let load = LoadOptions {
        ignore_patterns: config.ignore.patterns.clone(),
    };
    let program = GoProgram::load(root, &load)?;
    let target = Target {
        root: program.root().to_path_buf(),
        ..target_of(&args.position)
    };
    let symbol = locator::locate(&program, &target.absolute_file(), target.line, target.column)?;

    let format = if json { Format::Json } else { Format::Markdown };
    let stdout = std::io::stdout();
    Formatter::new(stdout.lock(), format).format_symbol(&symbol)?;
    Ok(())
}
