mod commands;

use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

use commands::{Command, HELP};
use microfront_apps::{RemoteHost, RemoteLoader, RemoteRegistry};
use microfront_bus::{event_bus, init_event_bus, BusConfig, BusEvent, EmailSend, OpenChat};
use microfront_core::{format_error_chain, HostConfig};

enum Flow {
    Continue,
    Quit,
}

async fn load_config() -> anyhow::Result<HostConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "loading host config");
            Ok(HostConfig::load(&path).await?)
        }
        None => Ok(HostConfig::default()),
    }
}

fn build_registry(config: &HostConfig) -> anyhow::Result<RemoteRegistry> {
    let mut registry = RemoteRegistry::with_builtins();
    if let Some(dir) = &config.manifests_dir {
        for loaded in RemoteLoader::new(dir.clone()).discover()? {
            let name = loaded.manifest.name.clone();
            if registry.apply_manifest(loaded.manifest) {
                tracing::info!(
                    remote = %name,
                    dir = %loaded.root_dir.display(),
                    "manifest applied"
                );
            } else {
                tracing::warn!(remote = %name, "manifest has no matching bundle, ignored");
            }
        }
    }
    Ok(registry)
}

fn run_command(host: &mut RemoteHost, cmd: Command) -> anyhow::Result<Flow> {
    let bus = host.bus().clone();
    match cmd {
        Command::OpenChat => {
            let detail = OpenChat {
                message: Some("Chat opened from Host Application".to_string()),
                timestamp: Some(Utc::now()),
                source: None,
            };
            bus.emit(&BusEvent::OpenChat(detail))?;
        }
        Command::EmailSend => {
            let detail = EmailSend::new(
                "Message from Host",
                "This email was sent from the Host application",
            );
            bus.emit(&BusEvent::EmailSend(detail))?;
        }
        Command::Emit { topic, detail } => {
            let delivery = bus.emit_json(&topic, detail)?;
            println!("{} delivered to {} listener(s)", topic, delivery.delivered);
        }
        Command::Remote { name, input } => host.dispatch(&name, &input)?,
        Command::Show => println!("{}", host.render(Instant::now())),
        Command::Status => {
            for remote in host.remotes() {
                let state = if remote.is_mounted() { "mounted" } else { "failed" };
                println!("{:<8} {:<8} {}", remote.config.name, state, remote.config.entry);
            }
            println!("bus policy: {:?}", bus.config().policy);
            for topic in bus.topics() {
                println!("{:<12} {} listener(s)", topic, bus.listener_count(&topic));
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn handle_line(host: &mut RemoteHost, line: &str) -> Flow {
    let result = commands::parse(line).and_then(|cmd| match cmd {
        Some(cmd) => run_command(host, cmd),
        None => Ok(Flow::Continue),
    });
    match result {
        Ok(flow) => flow,
        Err(err) => {
            tracing::error!(error = %format_error_chain(&*err), "command failed");
            Flow::Continue
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    microfront_core::logging::init_logging();

    let config = load_config().await?;
    if init_event_bus(BusConfig::from(&config.bus)).is_err() {
        tracing::warn!("event bus was already initialized, keeping existing instance");
    }
    let registry = build_registry(&config)?;

    println!("Loading micro-frontends...");
    let mut host = RemoteHost::load(event_bus(), &config, &registry);
    println!("{}", host.render(Instant::now()));
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if let Flow::Quit = handle_line(&mut host, &line) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    host.unmount_all();
    tracing::info!("host stopped");
    Ok(())
}
