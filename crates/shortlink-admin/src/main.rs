mod cli;

use std::sync::Arc;

use crate::cli::{Command, StorageBackendArg, CLI};
use clap::Parser;
use shortlink_core::{Code, Repository, ResolverService, Shortlink};
use shortlink_storage::{MongoRepository, SledRepository};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = CLI::try_parse()?;

    info!(storage_backend = %config.storage, "opening repository");

    match config.storage {
        StorageBackendArg::Sled => {
            let repository = SledRepository::open(&config.sled_path)?;
            run(repository, config.command).await
        }
        StorageBackendArg::MongoDb => {
            let repository = MongoRepository::connect(&config.mongodb_uri).await?;
            run(repository, config.command).await
        }
    }
}

async fn run<R: Repository>(
    repository: R,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Arc::new(repository);
    let result = dispatch(&repository, command).await;
    repository.close().await?;
    result
}

async fn dispatch<R: Repository>(
    repository: &Arc<R>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Get { code } => {
            let resolver = ResolverService::from_shared(Arc::clone(repository));
            match resolver.resolve(&code).await? {
                Some(url) => println!("{url}"),
                None => println!("not found"),
            }
        }
        Command::Set { code, url, ttl } => {
            let link = Shortlink {
                code: Code::new(code)?,
                url,
                ttl,
            };
            repository.upsert(link).await?;
        }
        Command::Delete { code } => {
            repository.delete(&Code::new(code)?).await?;
        }
        Command::List { page, size } => {
            let (links, total) = repository.list(page, size).await?;
            for link in &links {
                match link.ttl {
                    Some(ttl) => println!("{}\t{}\t{}", link.code, link.url, ttl),
                    None => println!("{}\t{}", link.code, link.url),
                }
            }
            println!("page {page} ({} rows, {total} total)", links.len());
        }
        Command::Migrate => {
            repository.migrate().await?;
            info!("migration complete");
        }
    }

    Ok(())
}
