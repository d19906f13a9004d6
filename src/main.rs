use std::error::Error;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::api::{ProxyApi, ReleasesApi};
use crate::configuration::Configuration;
use crate::github::GithubClient;
use crate::release_page::Changelog;
use crate::release_page::render::ReleasePageData;
use crate::store::{CollectionKind, ItemId, ListStore, MutationState, StoreOptions};

mod api;
mod configuration;
mod console;
mod github;
mod logger;
mod release_page;
mod server;
mod store;
mod utils;
mod view;

#[derive(Parser)]
#[command(name = "release-console")]
#[command(about = "Manage the releases and tags of a GitHub repository")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the local proxy API
    Serve {
        /// Overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List or delete releases
    Releases {
        #[command(subcommand)]
        action: ListAction,
    },
    /// List or delete tags
    Tags {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Interactive session over releases and tags
    Browse,
    /// Show the downloadable assets built for a version
    Assets {
        /// Release tag
        version: String,
        /// Full commit hash used when no release carries the tag
        #[arg(long, default_value = "")]
        hash: String,
        /// Abbreviated commit hash, defaults to the first 7 characters of --hash
        #[arg(long)]
        short_hash: Option<String>,
    },
    /// Parse a changelog and print its branch sections
    Changelog {
        /// Changelog file, stdin when omitted
        file: Option<PathBuf>,
    },
    /// Fill a release page template in place from REPLACE_* variables
    Page {
        /// Template file to rewrite
        path: PathBuf,
        /// Look up the release assets instead of using REPLACE_DOWNLOAD_FILES
        #[arg(long)]
        fetch_assets: bool,
    },
}

#[derive(Subcommand)]
enum ListAction {
    /// Show one page
    List {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Case-insensitive filter over the fetched page
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Delete by release id or tag name
    Delete {
        #[arg(required = true)]
        items: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
        println!("Debug mode - loaded .env file.");
    }
    logger::init_from_environment();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port } => {
            let config = Configuration::from_env()?;
            let port = port.unwrap_or(config.port);
            server::serve(GithubClient::from_configuration(&config), port).await;
        }
        Commands::Releases { action } => run_list(CollectionKind::Releases, action).await?,
        Commands::Tags { action } => run_list(CollectionKind::Tags, action).await?,
        Commands::Browse => {
            let config = Configuration::from_env()?;
            let store = Arc::new(ListStore::new(
                backend(&config),
                StoreOptions::from_configuration(&config),
            ));
            println!("{}", console::HELP);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            console::Console::new(store).run(stdin, tokio::io::stdout()).await?;
        }
        Commands::Assets { version, hash, short_hash } => {
            let config = Configuration::from_env()?;
            let github = GithubClient::from_configuration(&config);
            let short_hash = short_hash.unwrap_or_else(|| utils::short_sha(&hash).to_string());
            let files =
                release_page::assets::download_files(&github, &version, &hash, &short_hash).await?;
            if files.is_empty() {
                println!("No downloadable assets for {version}");
            }
            for file in files {
                println!(
                    "{:<40} {:<10} {:>10}  {}",
                    file.name,
                    file.kind().to_string(),
                    file.display_size(),
                    file.browser_download_url
                );
            }
        }
        Commands::Changelog { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let changelog = Changelog::parse(&text);
            if changelog.is_empty() {
                println!("No branch sections found");
            }
            for branch in changelog.branches() {
                println!("{branch}");
                for commit in changelog.get(branch).unwrap_or_default() {
                    println!("  - {}", release_page::CommitEntry::parse(commit).message());
                }
            }
        }
        Commands::Page { path, fetch_assets } => {
            let mut data = ReleasePageData::from_env();
            if fetch_assets {
                let config = Configuration::from_env()?;
                let github = GithubClient::from_configuration(&config);
                let short_hash = utils::short_sha(&data.commit_hash).to_string();
                let files = release_page::assets::download_files(
                    &github,
                    &data.version,
                    &data.commit_hash,
                    &short_hash,
                )
                .await?;
                data = data.with_download_files(&files)?;
            }
            release_page::render::process_file(&path, &data)?;
        }
    }

    Ok(())
}

fn backend(config: &Configuration) -> Arc<dyn ReleasesApi> {
    match &config.proxy_url {
        Some(url) => {
            log::debug!("Using proxy at {url}");
            Arc::new(ProxyApi::new(url.clone()))
        }
        None => Arc::new(GithubClient::from_configuration(config)),
    }
}

async fn run_list(kind: CollectionKind, action: ListAction) -> Result<(), Box<dyn Error>> {
    let config = Configuration::from_env()?;
    let store = ListStore::new(backend(&config), StoreOptions::from_configuration(&config));
    store.set_active(kind);

    match action {
        ListAction::List { page, search } => {
            store.fetch_page(kind, page, &search).await;
        }
        ListAction::Delete { items } => {
            let ids = items
                .into_iter()
                .map(|item| parse_item_id(kind, item))
                .collect::<Result<Vec<_>, _>>()?;

            store.fetch_page(kind, 1, "").await;
            match store.delete_many(ids).await {
                MutationState::Applied { deleted } => println!("Deleted {deleted} {kind}"),
                MutationState::RolledBack { error } => return Err(error.into()),
                MutationState::Idle | MutationState::Pending => {}
            }
        }
    }

    let table = match kind {
        CollectionKind::Releases => view::releases_table(&store.releases(), &store.selection()),
        CollectionKind::Tags => view::tags_table(&store.tags(), &store.selection()),
    };
    print!("{table}");
    Ok(())
}

fn parse_item_id(kind: CollectionKind, raw: String) -> Result<ItemId, String> {
    match kind {
        CollectionKind::Releases => raw
            .parse::<u64>()
            .map(ItemId::Release)
            .map_err(|_| format!("Invalid release id {raw:?}")),
        CollectionKind::Tags => Ok(ItemId::Tag(raw)),
    }
}
