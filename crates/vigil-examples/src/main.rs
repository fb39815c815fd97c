use facet::Facet;
use figue as args;
use vigil::{Config, Diagnostics, Level};

mod scenarios;

type AnyResult<T> = Result<T, String>;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Print every emitted report as one JSON line on stdout.
    #[facet(args::named, default)]
    json: bool,
    /// Override the dispatch aggregation window.
    #[facet(args::named, default)]
    window_ms: Option<u64>,
    #[facet(args::subcommand)]
    command: CommandKind,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum CommandKind {
    DiffState,
    DispatchStorm {
        #[facet(args::named, default)]
        count: Option<u32>,
        #[facet(args::named, default)]
        level: Option<String>,
    },
    UnobservedFailure,
    GuardDefault,
    RetryExhaustion {
        #[facet(args::named, default)]
        attempts: Option<u32>,
    },
    WaitTimeout {
        #[facet(args::named, default)]
        timeout_ms: Option<u64>,
    },
    MustReturn,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> AnyResult<()> {
    let cli = parse_cli()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = Config::from_env();
    if let Some(window_ms) = cli.window_ms {
        config.dispatch_window = std::time::Duration::from_millis(window_ms);
    }
    let diag = Diagnostics::new(config);
    let printer = scenarios::attach_printer(&diag, cli.json);

    let result = dispatch_command(&diag, cli.command).await;

    // Let windows that opened at the very end close before exiting.
    diag.shutdown();
    drop(printer);
    result
}

fn parse_cli() -> AnyResult<Cli> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("vigil-examples")
                .description("Run vigil diagnostics scenarios as subcommands")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();

    args::Driver::new(figue_config)
        .run()
        .into_result()
        .map(|v| v.value)
        .map_err(|e| e.to_string())
}

async fn dispatch_command(diag: &Diagnostics, command: CommandKind) -> AnyResult<()> {
    match command {
        CommandKind::DiffState => scenarios::diff_state::run(diag).await,
        CommandKind::DispatchStorm { count, level } => {
            let level = match level {
                Some(text) => Level::parse(&text).ok_or_else(|| format!("unknown level {text:?}"))?,
                None => Level::Info,
            };
            scenarios::dispatch_storm::run(diag, count.unwrap_or(25), level).await
        }
        CommandKind::UnobservedFailure => scenarios::unobserved_failure::run(diag).await,
        CommandKind::GuardDefault => scenarios::guard_default::run(diag).await,
        CommandKind::RetryExhaustion { attempts } => {
            scenarios::retry_exhaustion::run(diag, attempts.unwrap_or(3)).await
        }
        CommandKind::WaitTimeout { timeout_ms } => {
            scenarios::wait_timeout::run(diag, timeout_ms.unwrap_or(1_000)).await
        }
        CommandKind::MustReturn => scenarios::must_return::run(diag).await,
    }
}
