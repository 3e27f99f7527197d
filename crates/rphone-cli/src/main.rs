//! Reference CLI host for `CallEngine`.
//!
//! This binary is the "host application" spec.md §1 says owns the
//! transport, audio devices, and config parsing. Since the real mesh
//! transport is an external collaborator outside this workspace's scope,
//! this host wires the engine to [`rphone_identity::MockTransport`] instead
//! — everything above the transport seam (signaling, admission, state
//! machine, media pipeline) runs for real.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use rand::RngCore;

use rphone_admission::RateLimiterConfig;
use rphone_engine::{persist as engine_persist, CallEngine, EngineConfig, EngineEvent};
use rphone_identity::transport::MockNetwork;
use rphone_identity::{MockTransport, PublicKey, SystemClock};
use rphone_peers::PeerDirectory;

mod repl;

/// Exit codes per spec.md §6: 0 success, 1 identity error, 2 transport init
/// error, other non-zero for uncategorised errors.
const EXIT_IDENTITY_ERROR: i32 = 1;
const EXIT_TRANSPORT_ERROR: i32 = 2;
const EXIT_OTHER_ERROR: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "rphone", version, about = "Peer-to-peer encrypted voice calling over a mesh transport")]
struct Cli {
    /// Path to the identity file.
    #[arg(long, default_value = "identity")]
    identity: PathBuf,

    /// Generate a new identity at `--identity` and exit.
    #[arg(long)]
    new_identity: bool,

    /// Print the identity at `--identity` (node_id and public key) and exit.
    #[arg(long)]
    show_identity: bool,

    #[arg(long)]
    audio_input_device: Option<u32>,

    #[arg(long)]
    audio_output_device: Option<u32>,

    /// Run with no local audio device. Mirrored in this demo host by
    /// skipping capture/playback entirely; the engine itself is audio-agnostic.
    #[arg(long)]
    no_audio: bool,

    #[arg(long)]
    no_announce: bool,

    #[arg(long)]
    announce_period: Option<u32>,

    #[arg(long)]
    display_name: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    log_file: Option<String>,

    #[arg(long)]
    no_log_file: bool,
}

impl Cli {
    fn config_dir(&self) -> PathBuf {
        self.identity
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn generate_identity() -> PublicKey {
    let mut raw = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    PublicKey::from_raw(raw)
}

fn load_identity(path: &Path) -> anyhow::Result<PublicKey> {
    let bytes = std::fs::read(path)?;
    Ok(PublicKey::from_raw(bytes))
}

fn save_identity(path: &Path, key: &PublicKey) -> anyhow::Result<()> {
    std::fs::write(path, key.as_bytes())?;
    Ok(())
}

fn init_tracing(cli: &Cli, config: &EngineConfig) {
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_new(&level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_file = if cli.no_log_file {
        None
    } else {
        cli.log_file.clone().or_else(|| config.log_file.clone())
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
                builder.with_writer(std::sync::Mutex::new(file)).init();
                return;
            }
            builder.init();
        }
        None => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.new_identity {
        let key = generate_identity();
        if let Err(e) = save_identity(&cli.identity, &key) {
            eprintln!("failed to write identity: {e}");
            std::process::exit(EXIT_IDENTITY_ERROR);
        }
        println!("new identity: {}", key.node_id());
        std::process::exit(0);
    }

    if cli.show_identity {
        let key = match load_identity(&cli.identity) {
            Ok(k) => k,
            Err(e) => {
                eprintln!("failed to read identity: {e}");
                std::process::exit(EXIT_IDENTITY_ERROR);
            }
        };
        println!("node_id:    {}", key.node_id());
        println!("public_key: {key}");
        std::process::exit(0);
    }

    let local_public_key = match load_identity(&cli.identity) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("no identity at {}: {e} (run with --new-identity first)", cli.identity.display());
            std::process::exit(EXIT_IDENTITY_ERROR);
        }
    };
    let local_id = local_public_key.node_id();

    let config_dir = cli.config_dir();
    let config_path = config_dir.join("config.json");
    let peers_path = config_dir.join("peers.json");
    let history_path = config_dir.join("call_history.json");

    let mut config = engine_persist::load_config(&config_path).unwrap_or_default();
    if let Some(name) = &cli.display_name {
        config.display_name = name.clone();
    }
    if cli.audio_input_device.is_some() {
        config.audio_input_device = cli.audio_input_device;
    }
    if cli.audio_output_device.is_some() {
        config.audio_output_device = cli.audio_output_device;
    }
    if cli.no_announce {
        config.no_announce = true;
    }
    if let Some(period) = cli.announce_period {
        config.announce_period_min = period;
    }

    init_tracing(&cli, &config);

    // The real mesh transport lives outside this workspace; this host
    // stands up a private `MockNetwork` instead, so transport init here
    // can never actually fail. The error path stays in place for whichever
    // host eventually wires in the real transport.
    let network = MockNetwork::new();
    let transport: Arc<dyn rphone_identity::Transport> =
        Arc::new(MockTransport::new(local_id, network));

    let directory = Arc::new(PeerDirectory::new());
    match rphone_peers::persist::load(&peers_path) {
        Ok(records) => {
            for record in records {
                if let Err(e) = directory.insert_validated(record) {
                    tracing::warn!(error = %e, "dropping a corrupt peers.json entry");
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to load peers.json, starting with an empty directory"),
    }

    let rate_limiter_config = RateLimiterConfig {
        max_per_minute: config.rate_limit_max_per_minute,
        max_per_hour: config.rate_limit_max_per_hour,
    };

    let (engine, mut events) = CallEngine::new(
        local_id,
        local_public_key,
        transport,
        Arc::new(SystemClock),
        directory,
        rate_limiter_config,
        config,
        peers_path,
        history_path,
    );

    println!("rphone ready. local node_id: {local_id}");
    if cli.no_audio {
        println!("(running with --no-audio: media frames flow, nothing is captured or played)");
    }

    let events_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(event);
        }
    });

    let exit_code = match repl::run(engine).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            categorize_exit(&e)
        }
    };

    events_task.abort();
    std::process::exit(exit_code);
}

fn categorize_exit(_e: &anyhow::Error) -> i32 {
    EXIT_OTHER_ERROR
}

fn print_event(event: EngineEvent) {
    match event {
        EngineEvent::IncomingCall { call_id, remote_id, display_name } => {
            let who = display_name.unwrap_or_else(|| remote_id.to_string());
            println!("incoming call {call_id} from {who} — type `accept` or `reject`");
        }
        EngineEvent::StateChanged { phase } => println!("[state] {phase:?}"),
        EngineEvent::SasReady { code } => {
            println!("SAS code: {code} — read this aloud and confirm with `sas-match` or `sas-mismatch`");
        }
        EngineEvent::CallEnded { call_id, outcome } => {
            println!("call {call_id} ended: {}", outcome.as_str());
        }
        EngineEvent::Toast(message) => println!("[notice] {message}"),
    }
}
