use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use plimit_core::{
    parse_byte_size, parse_integer, ApplyReport, CgroupManager, CpuLimit, EngineConfig,
    LimitSpec, RunOptions, VERSION,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Apply cgroup v2 CPU, memory and I/O limits to a running process
#[derive(Parser, Debug)]
#[command(name = "plimit")]
#[command(version = VERSION)]
#[command(about = "Apply cgroup v2 resource limits to a process", long_about = None)]
struct Cli {
    /// Target PID (required unless --cgname is given)
    #[arg(short, long, value_name = "PID")]
    pid: Option<u32>,

    /// Limit CPU to N% of a single CPU
    #[arg(
        long,
        value_name = "N",
        allow_negative_numbers = true,
        value_parser = parse_int_arg
    )]
    cpu_percent: Option<i64>,

    /// CPU quota in microseconds (requires --cpu-period)
    #[arg(
        long,
        value_name = "US",
        allow_negative_numbers = true,
        value_parser = parse_int_arg
    )]
    cpu_quota: Option<i64>,

    /// CPU period in microseconds (requires --cpu-quota)
    #[arg(
        long,
        value_name = "US",
        allow_negative_numbers = true,
        value_parser = parse_int_arg
    )]
    cpu_period: Option<i64>,

    /// Raw cpu.max string (e.g. "max" or "50000 100000")
    #[arg(long, value_name = "STR")]
    cpu_max: Option<String>,

    /// memory.max with K/M/G/T/P/E suffix
    #[arg(long, value_name = "SIZE", allow_negative_numbers = true)]
    mem_max: Option<String>,

    /// io.max entry (MAJ:MIN rbps=... etc.), repeatable
    #[arg(long, value_name = "STR")]
    io_max: Vec<String>,

    /// Cgroup name relative to the cgroup root (default plimit/<pid>)
    #[arg(long, value_name = "NAME")]
    cgname: Option<String>,

    /// Move the PID only, don't change limits
    #[arg(long, conflicts_with = "delete")]
    attach_only: bool,

    /// Delete the cgroup (requires --cgname)
    #[arg(long, requires = "cgname")]
    delete: bool,

    /// Print the member PIDs of the cgroup and exit
    #[arg(long, conflicts_with_all = ["delete", "attach_only", "clear"])]
    list: bool,

    /// Empty cgroup.procs of the cgroup
    #[arg(long, conflicts_with_all = ["delete", "attach_only"])]
    clear: bool,

    /// Print actions without making changes
    #[arg(long)]
    dry_run: bool,

    /// Create parents and enable controllers
    #[arg(long)]
    force: bool,

    /// Extra logging
    #[arg(long)]
    verbose: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PLIMIT_CONFIG",
        default_value = "/etc/plimit/config.toml"
    )]
    config: PathBuf,

    /// Write the default configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,
}

/// Maximum number of --io-max entries accepted
const MAX_IO_ENTRIES: usize = 16;

fn parse_int_arg(s: &str) -> std::result::Result<i64, plimit_core::Error> {
    parse_integer(s, "integer argument")
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose || cli.dry_run);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "plimit:".red().bold(), e);
            let code = e
                .downcast_ref::<plimit_core::Error>()
                .map(plimit_core::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(output) = &cli.generate_config {
        EngineConfig::default()
            .save_to_file(output)
            .with_context(|| format!("failed to write configuration to {:?}", output))?;
        println!("wrote default configuration to {:?}", output);
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let manager = CgroupManager::new(config)?;

    let opts = RunOptions {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
        force: cli.force,
    };

    if cli.list || cli.clear {
        let name = cgroup_name(&cli)?;
        if cli.list {
            let pids = manager.list_members(&name)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&pids)?);
            } else {
                for pid in pids {
                    println!("{}", pid);
                }
            }
        } else {
            let report = manager.clear_members(&name, opts)?;
            print_report(&cli, &report, &format!("cleared cgroup {}", name))?;
        }
        return Ok(());
    }

    let spec = build_spec(&cli, opts)?;
    let report = manager.apply(&spec)?;

    let name = spec.cgname.as_deref().unwrap_or_default();
    let summary = if spec.delete {
        format!("deleted cgroup {}", name)
    } else {
        match spec.pid {
            Some(pid) => format!("applied cgroup {} for PID {}", name, pid),
            None => format!("applied cgroup {}", name),
        }
    };
    print_report(&cli, &report, &summary)
}

/// Translate command-line flags into a validated LimitSpec
fn build_spec(cli: &Cli, opts: RunOptions) -> Result<LimitSpec> {
    if cli.io_max.len() > MAX_IO_ENTRIES {
        return Err(plimit_core::Error::InvalidArgument(format!(
            "at most {} --io-max entries are accepted",
            MAX_IO_ENTRIES
        ))
        .into());
    }

    let cgname = cgroup_name(cli)?;

    let cpu = CpuLimit::from_parts(
        cli.cpu_max.clone(),
        cli.cpu_percent,
        cli.cpu_quota,
        cli.cpu_period,
    )?;

    let memory_max = cli.mem_max.as_deref().map(parse_byte_size).transpose()?;

    let spec = LimitSpec {
        pid: cli.pid,
        cgname: Some(cgname),
        cpu,
        memory_max,
        io_max: cli.io_max.clone(),
        attach_only: cli.attach_only,
        delete: cli.delete,
        opts,
    };
    spec.validate()?;
    Ok(spec)
}

/// --cgname, or plimit/<pid> when only a PID is given
fn cgroup_name(cli: &Cli) -> Result<String> {
    match (&cli.cgname, cli.pid) {
        (Some(name), _) => Ok(name.clone()),
        (None, Some(pid)) if pid > 0 => {
            let name = format!("plimit/{}", pid);
            if cli.verbose {
                tracing::info!("--cgname not set, defaulting cgroup name to '{}'", name);
            }
            Ok(name)
        }
        _ => Err(plimit_core::Error::InvalidArgument(
            "--pid is required unless --cgname is given".to_string(),
        )
        .into()),
    }
}

fn print_report(cli: &Cli, report: &ApplyReport, summary: &str) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if report.dry_run {
        println!("{} {}", "[dry-run]".yellow(), summary);
    } else {
        println!("{}", summary.green());
    }
    Ok(())
}

/// Load configuration from file or use defaults
fn load_config(path: &Path) -> Result<EngineConfig> {
    if path.exists() {
        EngineConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration file {:?}", path))
    } else {
        debug!("Configuration file not found: {:?}, using defaults", path);
        Ok(EngineConfig::default())
    }
}

/// Initialize logging on stderr, honoring RUST_LOG
fn init_logging(chatty: bool) {
    let default_level = if chatty { "info" } else { "warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["plimit"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_cgroup_name_from_pid() {
        let cli = parse(&["--pid", "1234", "--cpu-percent", "50"]);
        let spec = build_spec(&cli, RunOptions::default()).unwrap();

        assert_eq!(spec.cgname.as_deref(), Some("plimit/1234"));
        assert_eq!(spec.cpu, Some(CpuLimit::Percent(50)));
    }

    #[test]
    fn test_mem_max_parsed_with_suffix() {
        let cli = parse(&["-p", "1", "--mem-max", "512M"]);
        let spec = build_spec(&cli, RunOptions::default()).unwrap();

        assert_eq!(spec.memory_max, Some(536_870_912));
    }

    #[test]
    fn test_bad_mem_max_is_parse_error() {
        let cli = parse(&["-p", "1", "--mem-max", "-1"]);
        let err = build_spec(&cli, RunOptions::default()).unwrap_err();

        assert_eq!(
            err.downcast_ref::<plimit_core::Error>().map(|e| e.exit_code()),
            Some(8)
        );
    }

    #[test]
    fn test_quota_without_period_rejected() {
        let cli = parse(&["-p", "1", "--cpu-quota", "50000"]);
        let err = build_spec(&cli, RunOptions::default()).unwrap_err();

        assert!(err.to_string().contains("required together"));
    }

    #[test]
    fn test_non_numeric_cpu_percent_rejected() {
        let argv = ["plimit", "-p", "1", "--cpu-percent", "half"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_pid_or_cgname_required() {
        let cli = parse(&["--cpu-percent", "50"]);
        assert!(build_spec(&cli, RunOptions::default()).is_err());
    }

    #[test]
    fn test_repeated_io_max_keeps_order() {
        let cli = parse(&[
            "--cgname",
            "db",
            "--io-max",
            "8:0 rbps=1",
            "--io-max",
            "8:16 wbps=2",
        ]);
        let spec = build_spec(&cli, RunOptions::default()).unwrap();

        assert_eq!(spec.io_max, vec!["8:0 rbps=1", "8:16 wbps=2"]);
        assert_eq!(spec.pid, None);
    }

    #[test]
    fn test_delete_requires_cgname() {
        let argv = ["plimit", "--delete", "--pid", "1"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_delete_conflicts_with_attach_only() {
        let argv = ["plimit", "--delete", "--attach-only", "--cgname", "x"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
