use std::io::Write;
use std::path::Path;

use anyhow::bail;
use arbor_object::{Artifact, Directory, Object};
use arbor_store::{FsHandle, FsHandleConfig, Handle};
use arbor_types::kind_of;
use colored::Colorize;
use futures::TryStreamExt;

use crate::cli::*;
use crate::config::CliConfig;
use crate::fs::{checkin, checkout};

pub async fn run_command(cli: Cli, config: CliConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Kind(args) => cmd_kind(&args.id),
        Command::Checkin(args) => {
            let follow = args.follow_symlinks || config.follow_symlinks;
            cmd_checkin(&args.path, follow, &open_store(&config).await?).await
        }
        Command::Checkout(args) => cmd_checkout(args, &open_store(&config).await?).await,
        Command::Get(args) => cmd_get(args, &open_store(&config).await?).await,
        Command::Ls(args) => cmd_ls(args, &open_store(&config).await?).await,
        Command::Cat(args) => cmd_cat(args, &open_store(&config).await?).await,
    }
}

async fn open_store(config: &CliConfig) -> anyhow::Result<FsHandle> {
    Ok(FsHandle::open(FsHandleConfig {
        root: config.store_path.clone(),
        fsync: false,
    })
    .await?)
}

fn cmd_kind(id: &str) -> anyhow::Result<()> {
    println!("{}", kind_of(id)?);
    Ok(())
}

async fn cmd_checkin(path: &Path, follow: bool, handle: &dyn Handle) -> anyhow::Result<()> {
    let artifact = checkin(path, follow).await?;
    let id = artifact.store(handle).await?;
    println!("{} {} {}", "✓".green().bold(), artifact.kind(), id.to_string().cyan());
    Ok(())
}

async fn cmd_checkout(args: CheckoutArgs, handle: &dyn Handle) -> anyhow::Result<()> {
    let artifact = Artifact::parse(&args.id)?;
    checkout(&artifact, &args.path, handle).await?;
    println!("{} Checked out to {}", "✓".green().bold(), args.path.display().to_string().bold());
    Ok(())
}

async fn cmd_get(args: GetArgs, handle: &dyn Handle) -> anyhow::Result<()> {
    let directory = parse_directory(&args.id)?;
    let artifact = directory.get(&args.path, handle).await?;
    let id = artifact.store(handle).await?;
    println!("{} {}", artifact.kind().to_string().yellow(), id);
    Ok(())
}

async fn cmd_ls(args: LsArgs, handle: &dyn Handle) -> anyhow::Result<()> {
    let directory = parse_directory(&args.id)?;
    if args.recursive {
        let mut entries = directory.walk(handle);
        while let Some((path, artifact)) = entries.try_next().await? {
            print_entry(&path, &artifact);
        }
    } else {
        for (name, artifact) in directory.entries(handle).await? {
            print_entry(&name, &artifact);
        }
    }
    Ok(())
}

async fn cmd_cat(args: CatArgs, handle: &dyn Handle) -> anyhow::Result<()> {
    let bytes = match Object::parse(&args.id)? {
        Object::Blob(blob) => blob.bytes(handle).await?,
        Object::File(file) => file.bytes(handle).await?,
        other => bail!("cannot print a {}", other.kind()),
    };
    std::io::stdout().write_all(&bytes)?;
    Ok(())
}

fn parse_directory(id: &str) -> anyhow::Result<Directory> {
    match Artifact::parse(id)? {
        Artifact::Directory(directory) => Ok(directory),
        other => bail!("{id} is a {}, not a directory", other.kind()),
    }
}

fn print_entry(path: &str, artifact: &Artifact) {
    let kind = artifact.kind().to_string();
    let name = match artifact {
        Artifact::Directory(_) => format!("{path}/").blue().bold(),
        Artifact::Symlink(_) => path.cyan(),
        Artifact::File(_) => path.normal(),
    };
    match artifact.try_id() {
        Some(id) => println!("{:<10} {} {}", kind, id.short().dimmed(), name),
        None => println!("{:<10} {}", kind, name),
    }
}
