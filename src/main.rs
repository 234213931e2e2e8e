//! CLI for testfleet
//!
//! The same binary runs on the operator server and on every tester; the
//! role comes from the roster, not from the command line.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use testfleet::config::{Settings, check_dependencies, load_config};
use testfleet::identity::{Role, Roster, SystemProbe, resolve};
use testfleet::server::Request;
use testfleet::topics::TopicTree;
use testfleet::utils::{FleetError, logging};
use testfleet::{client, platform, server};

#[derive(Parser, Debug)]
#[command(name = "testfleet", about = "Distribute test commands to a tester fleet over MQTT")]
struct Cli {
    /// Start this test instead of prompting, e.g. BASE-XSS-B01-I01-TEST-AR (server only)
    #[arg(long)]
    testname: Option<String>,

    /// Broadcast an update to every tester and exit (server only)
    #[arg(long, conflicts_with = "testname")]
    update: bool,

    /// Directory holding topics.json and vmInfo.json
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log.level);

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mut settings: Settings) -> Result<(), FleetError> {
    if let Some(dir) = cli.config_dir {
        settings.paths.credentials_dir = dir;
    }

    let topics_file = settings.paths.topics_file();
    let roster_file = settings.paths.roster_file();
    check_dependencies(&[&topics_file, &roster_file])?;

    let tree = TopicTree::load(&topics_file)?;
    let roster = Roster::load(&roster_file)?;

    let platform = platform::current();
    let probe = SystemProbe::new(settings.identity.public_ip_url.clone(), platform.clone());
    let identity = resolve(&roster, &probe).await?;
    info!(
        role = %identity.role,
        address = %identity.network_address,
        tester = identity.tester_id.as_deref().unwrap_or("-"),
        "node identity resolved"
    );

    match identity.role {
        Role::Server => {
            let request = if cli.update {
                Request::Update
            } else {
                Request::Start {
                    testname: cli.testname,
                }
            };
            server::run(&settings, &identity, &tree, request).await
        }
        Role::Client => {
            if cli.update || cli.testname.is_some() {
                warn!("--testname and --update only apply on the server; ignoring");
            }
            client::run(&settings, &identity, &tree, &roster, platform).await
        }
    }
}
