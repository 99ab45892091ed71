use std::collections::HashMap;
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use memscope_core::prelude::*;
use memscope_utils::{info, init_logging_to_file, init_logging_with_level, LogFormat, LogLevel, LoggingGuard};

/// Attach to a running process, read typed values, and watch them live.
#[derive(Parser, Debug)]
#[command(name = "memscope")]
#[command(version)]
#[command(about = "Attach to a running process, read typed values, and watch them live", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace); defaults to RUST_LOG or warn
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (pretty or json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    /// Liveness check interval in milliseconds; overrides MEMSCOPE_SUPERVISOR_INTERVAL_MS
    #[arg(long, global = true)]
    supervisor_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List processes that can be attached to
    Ps
    {
        /// Only show processes whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Attach, read one value, and detach
    Read
    {
        /// Process ID (PID) to attach to
        pid: u32,
        /// Address literal (0x7ffd1000 or decimal) or symbol (libc.so.6+0x1a2b0)
        address: String,
        #[command(flatten)]
        value: ValueArgs,
    },
    /// Attach and print values as they change, until Ctrl-C or the process exits
    Watch
    {
        /// Process ID (PID) to attach to
        pid: u32,
        /// One or more addresses or symbols
        #[arg(required = true)]
        addresses: Vec<String>,
        #[command(flatten)]
        value: ValueArgs,
        /// How often to re-read, in milliseconds
        #[arg(long, default_value_t = 100)]
        refresh_ms: u64,
    },
    /// List memory regions of a process
    Regions
    {
        /// Process ID (PID)
        pid: u32,
        /// readable, readonly, writable, or executable
        #[arg(short, long, default_value = "readable")]
        filter: RegionFilter,
    },
}

/// How to decode the value at an address
#[derive(Args, Debug, Clone, Copy)]
struct ValueArgs
{
    /// i8, i16, i32, i64, f32, f64, string, or bytes
    #[arg(short = 't', long = "type", default_value = "i32")]
    kind: ValueKind,
    /// Length for string and bytes types
    #[arg(short, long)]
    length: Option<usize>,
    /// Read strings as UTF-16
    #[arg(short, long, default_value_t = false)]
    unicode: bool,
}

impl ValueArgs
{
    fn fields(self, address: &str) -> InspectFields
    {
        let fields = InspectFields::new(address, self.kind).with_unicode(self.unicode);
        match self.length {
            Some(length) => fields.with_length(length),
            None => fields,
        }
    }

    fn value_type(self) -> InspectResult<ValueType>
    {
        if self.unicode && !self.kind.supports_unicode() {
            eprintln!("Warning: --unicode only applies to string values; ignoring it for {}", self.kind);
        }
        ValueType::new(self.kind, self.length, self.unicode)
    }
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match init_cli_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_command(cli)) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// `watch` redraws stdout continuously, so it logs to a file
fn init_cli_logging(cli: &Cli) -> Result<LoggingGuard, memscope_utils::LoggingError>
{
    if matches!(cli.command, Commands::Watch { .. }) {
        let (path, guard) = init_logging_to_file(cli.log_level, cli.log_format)?;
        eprintln!("Logging to {}", path.display());
        return Ok(guard);
    }
    init_logging_with_level(cli.log_level.unwrap_or(LogLevel::Warn), cli.log_format)
}

async fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>>
{
    let mut config = InspectorConfig::from_env();
    if let Some(ms) = cli.supervisor_ms {
        config.supervisor_interval = Duration::from_millis(ms.max(1));
    }
    let (inspector, events) = Inspector::new(create_backend()?, config);

    let result = match cli.command {
        Commands::Ps { filter } => list_processes(&inspector, filter.as_deref()).await,
        Commands::Read { pid, address, value } => read_value(&inspector, pid, &address, value).await,
        Commands::Watch {
            pid,
            addresses,
            value,
            refresh_ms,
        } => watch_values(&inspector, events, pid, &addresses, value, Duration::from_millis(refresh_ms.max(1))).await,
        Commands::Regions { pid, filter } => list_regions(&inspector, pid, filter).await,
    };

    inspector.shutdown().await;
    result
}

async fn list_processes(inspector: &Inspector, filter: Option<&str>) -> Result<(), Box<dyn std::error::Error>>
{
    let mut processes = inspector.list_candidates().await?;
    if let Some(filter) = filter {
        let filter = filter.to_lowercase();
        processes.retain(|p| p.name.to_lowercase().contains(&filter));
    }

    println!("{:>8}  {:<16}  NAME", "PID", "OWNER");
    for p in processes {
        println!("{:>8}  {:<16}  {}", p.pid, p.owner, p.name);
    }
    Ok(())
}

async fn attach(inspector: &Inspector, pid: u32) -> Result<(), Box<dyn std::error::Error>>
{
    let outcome = inspector.attach(ProcessId::from(pid)).await?;
    info!(pid, "Attached");
    if let Some(advisory) = outcome.advisory() {
        eprintln!("Warning: {advisory}");
    }
    Ok(())
}

async fn read_value(
    inspector: &Inspector,
    pid: u32,
    address: &str,
    value: ValueArgs,
) -> Result<(), Box<dyn std::error::Error>>
{
    let ty = value.value_type()?;
    attach(inspector, pid).await?;

    let label = inspector.symbolize(address).await;
    match inspector.try_read(address, ty).await {
        Ok(text) => println!("{label} [{ty}] = {text}"),
        Err(e) => {
            println!("{label} [{ty}] = {}", inspector.config().placeholder);
            eprintln!("Read failed: {e}");
        }
    }

    inspector.detach().await?;
    Ok(())
}

async fn watch_values(
    inspector: &Inspector,
    mut events: memscope_core::events::EventReceiver,
    pid: u32,
    addresses: &[String],
    value: ValueArgs,
    refresh: Duration,
) -> Result<(), Box<dyn std::error::Error>>
{
    value.value_type()?;
    attach(inspector, pid).await?;

    let surfaces: Vec<LiveWatchPoller> = addresses
        .iter()
        .map(|address| inspector.open_inspect_surface(value.fields(address)))
        .collect();
    let mut labels: HashMap<SurfaceId, String> = HashMap::new();
    for (surface, address) in surfaces.iter().zip(addresses) {
        labels.insert(surface.id(), inspector.symbolize(address.as_str()).await);
    }
    let mut last: HashMap<SurfaceId, String> = HashMap::new();

    println!("Watching {} address(es) in process {pid}; Ctrl-C to stop", surfaces.len());

    let mut ticker = tokio::time::interval(refresh);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("Stopping");
                break;
            }
            _ = ticker.tick() => {
                for surface in &surfaces {
                    surface.refresh();
                }
            }
            event = events.recv() => match event {
                Some(InspectorEvent::SurfaceValueUpdated { surface, value: text }) => {
                    if last.get(&surface) != Some(&text) {
                        let label = labels.get(&surface).map_or("?", String::as_str);
                        println!("{label} = {text}");
                        last.insert(surface, text);
                    }
                }
                Some(event @ InspectorEvent::AttachmentTerminated { .. }) => {
                    println!("{}", event.describe());
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    for surface in surfaces {
        surface.close().await;
    }
    Ok(())
}

async fn list_regions(inspector: &Inspector, pid: u32, filter: RegionFilter) -> Result<(), Box<dyn std::error::Error>>
{
    let regions = inspector.memory_regions(ProcessId::from(pid), filter).await?;
    println!("{:<33}  {:<4}  {:>10}  NAME", "RANGE", "PERM", "SIZE");
    for region in regions {
        let range = format!("{}-{}", region.start, region.end);
        println!(
            "{range:<33}  {:<4}  {:>10}  {}",
            region.permissions,
            region.size(),
            region.name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
