use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use rust_janus_gateway::{JanusClient, JanusClientConfig, SessionEvent};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("janus")
        .version(rust_janus_gateway::VERSION)
        .about("Janus WebRTC Gateway client")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Gateway WebSocket URL"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Client configuration file (JSON, or YAML with yaml-support)"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .value_name("TOKEN")
                .help("Token attached to every request"),
        )
        .arg(
            Arg::new("api-secret")
                .long("api-secret")
                .value_name("SECRET")
                .help("API secret attached to every request"),
        )
        .arg(
            Arg::new("request-timeout-ms")
                .long("request-timeout-ms")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Request timeout in milliseconds"),
        )
        .arg(
            Arg::new("no-reconnect")
                .long("no-reconnect")
                .help("Do not reconnect after the idle timeout")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("hold")
                .long("hold")
                .value_name("SECS")
                .value_parser(clap::value_parser!(u64))
                .default_value("0")
                .help("Keep the session alive this long, printing its events"),
        )
        .arg(
            Arg::new("list-rooms")
                .long("list-rooms")
                .help("List VideoRoom rooms")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => JanusClientConfig::from_file(path).with_context(|| format!("loading {}", path))?,
        None => JanusClientConfig::default(),
    };
    if let Some(url) = matches.get_one::<String>("url") {
        config.url = url.clone();
    }
    if let Some(token) = matches.get_one::<String>("token") {
        config.token = Some(token.clone());
    }
    if let Some(secret) = matches.get_one::<String>("api-secret") {
        config.api_secret = Some(secret.clone());
    }
    if let Some(timeout) = matches.get_one::<u64>("request-timeout-ms") {
        config.request_timeout = Duration::from_millis(*timeout);
    }
    if matches.get_flag("no-reconnect") {
        config.reconnect = false;
    }
    let hold = Duration::from_secs(matches.get_one::<u64>("hold").copied().unwrap_or_default());
    let list_rooms = matches.get_flag("list-rooms");

    let client = JanusClient::new(config.clone()).context("invalid configuration")?;
    client
        .connect()
        .await
        .with_context(|| format!("connecting to {}", config.url))?;
    println!("Connected to Janus {}", client.version().await?);

    let session = client.create_session().await.context("creating session")?;
    println!("Session {}", session.id());

    if list_rooms {
        let rooms = session.video_room().default_handle().await?.list().await?;
        for room in rooms {
            println!("{}", room);
        }
    }

    if !hold.is_zero() {
        let mut events = session.subscribe();
        let deadline = tokio::time::sleep(hold);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.recv() => match event {
                    Ok(SessionEvent::Timeout) | Ok(SessionEvent::Expired) => {
                        println!("Session {} lost", session.id());
                        break;
                    }
                    Ok(event) => println!("{:?}", event),
                    Err(RecvError::Lagged(skipped)) => log::warn!("Skipped {} session events", skipped),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    if session.is_alive() {
        session.destroy().await.context("destroying session")?;
    }
    client.disconnect().await?;
    client.shutdown();
    Ok(())
}
