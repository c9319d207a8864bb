//! Ambience: a terminal ambient sound mixer.

mod command;
mod config;

use std::path::PathBuf;

use ambience_core::{Catalog, Session, SessionState, Toggled};
use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use command::Command;
use config::Config;

#[derive(Parser)]
#[command(name = "ambience", about = "Mix looping ambient sounds", version)]
struct Cli {
    /// Catalog file (JSON or TOML) to use instead of the built-in tracks
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Config file to use instead of the one in the user config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let level = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let catalog = match cli.catalog.as_ref().or(config.catalog.as_ref()) {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("cannot load catalog {}", path.display()))?,
        None => Catalog::builtin(),
    };
    let session = Session::with_platform(catalog, config.session.clone())
        .context("cannot open audio output")?;
    info!("playing through the {} backend", session.backend_kind());

    println!("type 'list' for tracks, 'quit' to exit");
    print_status(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        run(&session, command).await;
    }

    session.teardown().await;
    info!("bye");
    Ok(())
}

async fn run(session: &Session, command: Command) {
    match command {
        Command::List => {
            for track in session.catalog().iter() {
                println!("{:<12} {:<16} {}", track.id.as_str(), track.name, track.color.0);
            }
            return;
        }
        Command::Status => {}
        Command::Toggle(id) => report(&id, session.toggle(&id).await),
        Command::Volume(id, value) => {
            let volume = session.set_volume(&id, value);
            println!("{id}: volume {volume}");
        }
        Command::Restart(id) => report(&id, session.restart(&id).await),
        Command::Unlock => match session.unlock_audio().await {
            Ok(()) => println!("audio unlocked"),
            Err(err) => eprintln!("{err}"),
        },
        Command::StopAll => println!("stopped {} tracks", session.stop_all().await),
        Command::Quit => return,
    }
    print_status(session);
}

fn report(id: &str, outcome: Result<Toggled, ambience_core::PlaybackError>) {
    match outcome {
        Ok(Toggled::Started) => println!("{id}: playing"),
        Ok(Toggled::Stopped) => println!("{id}: stopped"),
        Ok(Toggled::Ignored) => println!("{id}: busy, ignored"),
        Err(err) => eprintln!("{err}"),
    }
}

fn print_status(session: &Session) {
    println!("{}", render_status(session.catalog(), &session.snapshot()));
}

fn render_status(catalog: &Catalog, state: &SessionState) -> String {
    let mut lines = Vec::with_capacity(catalog.len() + 1);
    if !state.initialized {
        lines.push("audio locked: run 'unlock'".to_string());
    }
    for track in catalog.iter() {
        let marker = if state.is_playing(track.id.as_str()) { '>' } else { ' ' };
        lines.push(format!(
            "{marker} {:<12} {:>4}",
            track.id.as_str(),
            state.volume(track.id.as_str()).to_string()
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambience_core::{Track, TrackId, Volume};

    #[test]
    fn test_cli_args() {
        let cli = Cli::try_parse_from(["ambience", "--catalog", "sounds.toml"]).expect("parse");
        assert_eq!(cli.catalog, Some(PathBuf::from("sounds.toml")));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_render_status() {
        let catalog = Catalog::new(vec![
            Track::new("rain", "Rain", "#4a90e2", "rain.ogg"),
            Track::new("fire", "Fireplace", "#e67e22", "fire.ogg"),
        ])
        .expect("catalog");
        let mut state = SessionState {
            initialized: true,
            ..SessionState::default()
        };
        state.playing.insert(TrackId::new("rain"), true);
        state.volumes.insert(TrackId::new("fire"), Volume::clamped(20));

        let rendered = render_status(&catalog, &state);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("> rain"));
        assert!(lines[0].ends_with("50%"));
        assert!(lines[1].starts_with("  fire"));
        assert!(lines[1].ends_with("20%"));
    }

    #[test]
    fn test_render_locked_status() {
        let catalog = Catalog::builtin();
        let rendered = render_status(&catalog, &SessionState::default());
        assert!(rendered.starts_with("audio locked"));
        assert_eq!(rendered.lines().count(), catalog.len() + 1);
    }
}
