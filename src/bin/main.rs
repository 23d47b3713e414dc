//! Driftwallet CLI - One wallet surface per invocation
//!
//!   driftwallet init                 → Create the wallet (idempotent)
//!   driftwallet status               → {hasWallet, wallet, health}
//!   driftwallet balance              → Fetch and persist the remote balance
//!   driftwallet history              → Remote transaction history
//!   driftwallet health               → Probe node and simulator
//!   driftwallet send <to> <amount>   → Sign and submit a transfer
//!   driftwallet faucet [amount]      → Ask the simulator for funds
//!   driftwallet watch                → Run the sync scheduler, print state
//!   driftwallet serve                → Message bridge + HTTP surface
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, bail, Context};
use driftwallet::config::{WalletConfig, DEFAULT_FAUCET_AMOUNT};
use driftwallet::logging::init_logging;
use driftwallet::{
    install_signal_handlers, HealthMonitor, HttpLedger, Ledger, MessageBridge, SendForm,
    SyncScheduler, TransactionSubmitter, WalletStore,
};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info};

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("driftwallet {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("init") => cmd_init(&opts),
        Some("status") => cmd_status(&opts),
        Some("balance") => cmd_balance(&opts),
        Some("history") => cmd_history(&opts),
        Some("health") => cmd_health(&opts),
        Some("send") => cmd_send(&opts),
        Some("faucet") => cmd_faucet(&opts),
        Some("watch") => cmd_watch(&opts),
        Some("serve") => cmd_serve(&opts),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = !opts.json && (opts.pretty || std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    args: Vec<String>,
    node_url: Option<String>,
    simulator_url: Option<String>,
    data_dir: Option<String>,
    port: Option<u16>,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        load_dotenv();

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--node" => {
                    if i + 1 < args.len() {
                        opts.node_url = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--simulator" => {
                    if i + 1 < args.len() {
                        opts.simulator_url = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--data-dir" | "-d" => {
                    if i + 1 < args.len() {
                        opts.data_dir = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        opts.port = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') || arg.parse::<f64>().is_ok() => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        opts.args = positional;

        if opts.port.is_none() {
            opts.port = env::var("DRIFTWALLET_PORT").ok().and_then(|s| s.parse().ok());
        }

        opts
    }

    /// Env config, overridden by flags.
    fn config(&self) -> WalletConfig {
        let mut config = WalletConfig::from_env();
        if let Some(url) = &self.node_url {
            config = config.with_node_url(url);
        }
        if let Some(url) = &self.simulator_url {
            config = config.with_simulator_url(url);
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        config
    }
}

fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(".env") else { return };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && env::var(key.trim()).is_err() {
                env::set_var(key.trim(), value);
            }
        }
    }
}

fn print_usage() {
    println!(
        r#"driftwallet - Client-side wallet engine

USAGE:
    driftwallet <command> [args] [options]

COMMANDS:
    init                    Create the wallet if none exists
    status                  Wallet (public view) and cached health
    balance                 Fetch balance from the node and persist it
    history                 Fetch transaction history
    health                  Probe node and simulator
    send <to> <amount>      Sign and submit a transfer
    faucet [amount]         Request simulator funds (default: 100)
    watch                   Poll balance, history and health until Ctrl+C
    serve                   Run the message bridge with an HTTP surface

OPTIONS:
    --node <url>            Node URL (env: DRIFTWALLET_NODE_URL)
    --simulator <url>       Simulator URL (env: DRIFTWALLET_SIMULATOR_URL)
    --data-dir, -d <path>   Data directory (env: DRIFTWALLET_DATA_DIR)
    --port, -p <port>       Server port (default: 8080, env: DRIFTWALLET_PORT)
    --json                  Raw JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

EXAMPLES:
    driftwallet init
    driftwallet faucet 100
    driftwallet send 3f2a...c1 12.5
    driftwallet serve --port 8080
"#
    );
}

struct Surface {
    config: WalletConfig,
    store: Arc<WalletStore>,
    ledger: Arc<dyn Ledger>,
}

fn open_surface(opts: &ParsedArgs) -> anyhow::Result<Surface> {
    let config = opts.config();
    let store = WalletStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open wallet store at {}", config.data_dir.display()))?;
    let ledger = HttpLedger::from_config(&config).context("Failed to build HTTP client")?;
    debug!(node = %config.node_url, simulator = %config.simulator_url, "surface opened");
    Ok(Surface { config, store: Arc::new(store), ledger: Arc::new(ledger) })
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create runtime")
}

fn require_address(store: &WalletStore) -> anyhow::Result<String> {
    match store.load()? {
        Some(wallet) => Ok(wallet.address),
        None => bail!("No wallet. Run `driftwallet init` first."),
    }
}

fn cmd_init(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let surface = open_surface(opts)?;
    let wallet = surface.store.create()?;
    info!(address = %wallet.address, "wallet ready");
    Ok(json!({
        "wallet": wallet.public_view(),
        "path": surface.store.path().display().to_string(),
    }))
}

fn cmd_status(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let surface = open_surface(opts)?;
    let wallet = surface.store.load()?;
    Ok(json!({
        "hasWallet": wallet.is_some(),
        "wallet": wallet.map(|w| w.public_view()),
        "health": surface.store.health()?,
    }))
}

fn cmd_balance(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let surface = open_surface(opts)?;
    let address = require_address(&surface.store)?;
    let balance = runtime()?.block_on(surface.ledger.balance(&address))?;
    surface.store.set_balance(balance)?;
    Ok(json!({"address": address, "balance": balance}))
}

fn cmd_history(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let surface = open_surface(opts)?;
    let address = require_address(&surface.store)?;
    let transactions = runtime()?.block_on(surface.ledger.transactions(&address))?;
    Ok(json!({"address": address, "count": transactions.len(), "transactions": transactions}))
}

fn cmd_health(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let surface = open_surface(opts)?;
    let monitor = HealthMonitor::new(surface.ledger).with_store(surface.store);
    let snapshot = runtime()?.block_on(monitor.probe_all());
    Ok(serde_json::to_value(snapshot)?)
}

fn cmd_send(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let (Some(to), Some(amount)) = (opts.args.first(), opts.args.get(1)) else {
        bail!("Usage: driftwallet send <to> <amount>");
    };
    let surface = open_surface(opts)?;
    let submitter = TransactionSubmitter::new(surface.store, surface.ledger);
    let mut form = SendForm::new(to.as_str(), amount.as_str());
    let receipt = runtime()?.block_on(submitter.submit(&mut form))?;
    Ok(json!({"success": true, "hash": receipt.hash}))
}

fn cmd_faucet(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let amount = match opts.args.first() {
        Some(raw) => raw.parse::<f64>().with_context(|| format!("Invalid amount: {}", raw))?,
        None => DEFAULT_FAUCET_AMOUNT,
    };
    let surface = open_surface(opts)?;
    let submitter = TransactionSubmitter::new(surface.store, surface.ledger);
    let receipt = runtime()?.block_on(submitter.request_faucet(amount))?;
    Ok(serde_json::to_value(receipt)?)
}

fn cmd_watch(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let surface = open_surface(opts)?;
    let pretty = !opts.json && (opts.pretty || std::io::stdout().is_terminal());

    runtime()?.block_on(async move {
        let shutdown = install_signal_handlers();
        let health = Arc::new(HealthMonitor::new(surface.ledger.clone()).with_store(surface.store.clone()));
        let handle = SyncScheduler::new(surface.store, surface.ledger, health, &surface.config)
            .start(shutdown.subscribe());
        let mut states = handle.subscribe();
        let mut shutdown_rx = shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = states.borrow_and_update().clone();
                    let line = json!({
                        "address": state.address,
                        "balance": state.balance,
                        "transactions": state.transactions.len(),
                        "node": state.node_connected,
                        "simulator": state.simulator_connected,
                        "lastRefresh": state.last_refresh,
                    });
                    println!("{}", render(&line, pretty));
                }
            }
        }
        handle.stop().await;
    });

    Ok(json!({"status": "stopped"}))
}

fn cmd_serve(opts: &ParsedArgs) -> anyhow::Result<Value> {
    use driftwallet::server::create_router;

    let surface = open_surface(opts)?;
    let port = opts.port.unwrap_or(8080);

    runtime()?.block_on(async move {
        let shutdown = install_signal_handlers();

        let health = Arc::new(HealthMonitor::new(surface.ledger.clone()).with_store(surface.store.clone()));
        let (bridge, bridge_task) =
            MessageBridge::new(surface.store.clone(), health, &surface.config).spawn(shutdown.subscribe());
        info!("Message bridge started");

        let router = create_router(bridge);
        let addr = format!("0.0.0.0:{}", port);

        info!("Driftwallet coordinator listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /health   - Health check");
        info!("  POST /bridge   - Relay a bridge message");

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let mut shutdown_rx = shutdown.subscribe();
        tokio::select! {
            result = axum::serve(listener, router) => {
                result.context("Server error")?;
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping server...");
            }
        }

        let _ = bridge_task.await;
        info!("Message bridge stopped");

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(json!({"status": "stopped"}))
}
