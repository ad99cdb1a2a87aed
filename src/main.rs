use anyhow::Result;
use fileswap::cli::{parse_args, Args, ReplaceArgs};
use fileswap::config::{self, Config};
use fileswap::logger::{self, TracingLog};
use fileswap::summary_formatter::SummaryFormatter;
use fileswap::{FileSetSpec, ReplaceJob, ReplaceTask};

fn main() -> Result<()> {
    let (global, args) = parse_args()?;

    match args {
        Args::Replace(replace) => {
            let config = load_config_or_default();
            let filter = logger::default_filter(global.quiet, global.debug);
            if let Some(path) = logger::init_logging(filter, config.logging.debug)? {
                tracing::debug!("debug log at {}", path.display());
            }
            run_replace(replace, &config)?;
        }
        Args::Config { show, path } => {
            show_config(show, path)?;
        }
    }

    Ok(())
}

/// A broken config should not block a run; fall back to defaults.
fn load_config_or_default() -> Config {
    match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {:#}; using default configuration", e);
            Config::default()
        }
    }
}

fn run_replace(args: ReplaceArgs, config: &Config) -> Result<()> {
    let verbose = args.verbose || config.replace.verbose;
    let fail_on_error = config.replace.fail_on_error && !args.keep_going;
    let chunk_size = args.chunk_size.unwrap_or(config.replace.chunk_size);

    let job = ReplaceJob::from_parameters(args.find.as_deref(), args.replace.as_deref())?
        .verbose(verbose)
        .dry_run(args.dry_run)
        .chunk_size(chunk_size);

    let mut task = ReplaceTask::new(job).fail_on_error(fail_on_error);
    for dir in &args.dirs {
        let mut spec = FileSetSpec::new(dir);
        spec.includes = args.includes.clone();
        spec.excludes = args.excludes.clone();
        task.add_fileset(spec);
    }

    let mut log = TracingLog;
    let summary = match task.execute(&mut log) {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(hint) = e.hint() {
                eprintln!("{}\n", hint);
            }
            return Err(e.into());
        }
    };

    if args.json {
        println!("{}", SummaryFormatter::format_json(&summary)?);
    } else {
        let use_color = SummaryFormatter::should_use_color();
        print!("{}", SummaryFormatter::format_summary(&summary, use_color));
    }

    Ok(())
}

fn show_config(show: bool, path: bool) -> Result<()> {
    let config_path = config::config_file_path()?;

    if path {
        println!("{}", config_path.display());
        if !show {
            return Ok(());
        }
    }

    let config = config::load_config_from(&config_path)?;
    println!("# {}\n", config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
