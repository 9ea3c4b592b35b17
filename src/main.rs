mod app;
mod catalog;
mod config;
mod input;
mod library;
mod lyrics;
mod player;
mod queue;

use anyhow::Context;
use catalog::{CatalogClient, Source, Track, TrackKey};
use clap::{Parser, Subcommand};
use library::Library;

#[derive(Debug, Parser)]
#[command(name = "cadence", version, about = "Multi-source terminal music player")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search the catalog, queue the results and start an interactive session.
    Play {
        /// Search query; ignored with --favorites.
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        source: Option<Source>,
        /// How many search results to queue.
        #[arg(long)]
        limit: Option<usize>,
        /// Play the favorites list instead of searching.
        #[arg(long)]
        favorites: bool,
    },
    /// Search tracks and print them (headless).
    Search {
        query: String,
        #[arg(long)]
        source: Option<Source>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Resolve and print the stream URL of the first search hit (headless).
    Url {
        query: String,
        #[arg(long)]
        source: Option<Source>,
    },
    /// Fetch and print parsed lyrics of the first search hit (headless).
    Lyrics {
        query: String,
        #[arg(long)]
        source: Option<Source>,
    },
    /// List a source's charts; with a chart id, print its tracks.
    Toplist {
        /// Chart id from the bare `toplist` listing.
        id: Option<String>,
        #[arg(long)]
        source: Option<Source>,
        /// How many chart tracks to print.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List favorite tracks.
    Favorites,
    /// Manage playlists.
    Playlist {
        #[command(subcommand)]
        cmd: PlaylistCommand,
    },
    /// Write a versioned backup of favorites and playlists.
    Export { path: std::path::PathBuf },
    /// Replace favorites and playlists from a backup file.
    Import { path: std::path::PathBuf },
}

#[derive(Debug, Subcommand)]
enum PlaylistCommand {
    List,
    Create {
        name: String,
    },
    Delete {
        id: String,
    },
    /// Print a playlist's tracks.
    Show {
        id: String,
    },
    /// Search the catalog and add the first hit to a playlist.
    Add {
        id: String,
        query: String,
        #[arg(long)]
        source: Option<Source>,
    },
    /// Remove a track from a playlist by its catalog id.
    Remove {
        id: String,
        track_id: String,
        #[arg(long)]
        source: Option<Source>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    let cfg_path = match cli.config.clone() {
        Some(p) => p,
        None => config::default_config_path().context("default config path")?,
    };

    match cli.command {
        Command::Play {
            query,
            source,
            limit,
            favorites,
        } => {
            let tracks = if favorites {
                let library = Library::open(&cfg.library_path())?;
                library.favorites().to_vec()
            } else {
                anyhow::ensure!(!query.trim().is_empty(), "give a query or --favorites");
                let client = CatalogClient::new(&cfg.catalog.base_url)?;
                let source = source.unwrap_or(cfg.catalog.default_source);
                let limit = limit.unwrap_or(cfg.catalog.search_limit);
                client.search(query.trim(), source, limit, 1).await?
            };
            anyhow::ensure!(!tracks.is_empty(), "no tracks to play");
            let mut app = app::App::new(cfg, cfg_path)?;
            app.run(tracks).await?;
        }
        Command::Search { query, source, limit } => {
            let client = CatalogClient::new(&cfg.catalog.base_url)?;
            let source = source.unwrap_or(cfg.catalog.default_source);
            let limit = limit.unwrap_or(cfg.catalog.search_limit);
            let tracks = client.search(&query, source, limit, 1).await?;
            print_tracks(&tracks);
        }
        Command::Url { query, source } => {
            let client = CatalogClient::new(&cfg.catalog.base_url)?;
            let track = first_hit(&client, &query, source.unwrap_or(cfg.catalog.default_source)).await?;
            let url = client.resolve_stream_url(&track).await?;
            println!("{url}");
        }
        Command::Lyrics { query, source } => {
            let client = CatalogClient::new(&cfg.catalog.base_url)?;
            let track = first_hit(&client, &query, source.unwrap_or(cfg.catalog.default_source)).await?;
            let lines = lyrics::fetch_lyrics(&client, &track).await;
            for line in lines {
                let total_ms = (line.time_secs * 1000.0).round() as u64;
                println!(
                    "[{:02}:{:02}.{:03}] {}",
                    total_ms / 60_000,
                    (total_ms % 60_000) / 1000,
                    total_ms % 1000,
                    line.text
                );
            }
        }
        Command::Toplist { id, source, limit } => {
            let client = CatalogClient::new(&cfg.catalog.base_url)?;
            match id {
                Some(id) => {
                    let source = source.unwrap_or(cfg.catalog.default_source);
                    let mut tracks = client.fetch_top_list_detail(&id, source).await?;
                    tracks.truncate(limit.unwrap_or(cfg.catalog.search_limit));
                    print_tracks(&tracks);
                }
                None => {
                    // Without an explicit source, try each in order until one
                    // serves charts.
                    let sources = match source {
                        Some(s) => vec![s],
                        None => vec![Source::Netease, Source::Kuwo, Source::Qq],
                    };
                    let mut found = false;
                    for s in sources {
                        match client.fetch_top_lists(s).await {
                            Ok(lists) if !lists.is_empty() => {
                                for l in &lists {
                                    let freq = l.update_frequency.as_deref().unwrap_or("");
                                    println!("{}  {}  [{s}] {freq}", l.id, l.name);
                                }
                                found = true;
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("toplist fetch failed for {s}: {e:#}"),
                        }
                    }
                    anyhow::ensure!(found, "no source served charts");
                }
            }
        }
        Command::Favorites => {
            let library = Library::open(&cfg.library_path())?;
            print_tracks(library.favorites());
        }
        Command::Playlist { cmd } => {
            let mut library = Library::open(&cfg.library_path())?;
            match cmd {
                PlaylistCommand::List => {
                    for p in library.playlists() {
                        println!("{}  {} ({} tracks)", p.id, p.name, p.songs.len());
                    }
                }
                PlaylistCommand::Create { name } => {
                    let p = library.create_playlist(&name)?;
                    println!("Created playlist {} ({})", p.name, p.id);
                }
                PlaylistCommand::Delete { id } => {
                    if library.delete_playlist(&id)? {
                        println!("Deleted playlist {id}");
                    } else {
                        println!("No playlist with id {id}");
                    }
                }
                PlaylistCommand::Show { id } => {
                    let p = library
                        .playlist(&id)
                        .with_context(|| format!("no playlist with id {id}"))?;
                    println!("{} ({} tracks)", p.name, p.songs.len());
                    print_tracks(&p.songs);
                }
                PlaylistCommand::Add { id, query, source } => {
                    let client = CatalogClient::new(&cfg.catalog.base_url)?;
                    let track =
                        first_hit(&client, &query, source.unwrap_or(cfg.catalog.default_source))
                            .await?;
                    if library.add_to_playlist(&id, &track)? {
                        println!("Added {}", track.label());
                    } else {
                        println!("{} is already in the playlist", track.label());
                    }
                }
                PlaylistCommand::Remove { id, track_id, source } => {
                    let key = TrackKey {
                        source: source.unwrap_or(cfg.catalog.default_source),
                        id: track_id,
                    };
                    if library.remove_from_playlist(&id, &key)? {
                        println!("Removed {key}");
                    } else {
                        println!("{key} is not in the playlist");
                    }
                }
            }
        }
        Command::Export { path } => {
            let library = Library::open(&cfg.library_path())?;
            library.export(&path)?;
            println!("Exported library to {}", path.display());
        }
        Command::Import { path } => {
            let mut library = Library::open(&cfg.library_path())?;
            library.import(&path)?;
            println!(
                "Imported {} favorites and {} playlists",
                library.favorites().len(),
                library.playlists().len()
            );
        }
    }

    Ok(())
}

async fn first_hit(client: &CatalogClient, query: &str, source: Source) -> anyhow::Result<Track> {
    let tracks = client.search(query, source, 5, 1).await?;
    tracks
        .into_iter()
        .next()
        .with_context(|| format!("no results for '{query}' on {source}"))
}

fn print_tracks(tracks: &[Track]) {
    for (i, t) in tracks.iter().enumerate() {
        println!("{:02}. {}  [{}] (id={})", i + 1, t.label(), t.source, t.id);
    }
}
