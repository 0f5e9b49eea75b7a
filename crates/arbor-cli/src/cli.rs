use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arbor",
    about = "arbor - content-addressed artifact store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file. Defaults to ./arbor.toml when it exists.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store directory, overriding the config file.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a local file tree and print its id
    Checkin(CheckinArgs),
    /// Write a stored artifact to the local filesystem
    Checkout(CheckoutArgs),
    /// Resolve a path inside a stored directory
    Get(GetArgs),
    /// List a stored directory
    Ls(LsArgs),
    /// Print the contents of a stored file or blob
    Cat(CatArgs),
    /// Print the kind of an id
    Kind(KindArgs),
}

#[derive(Args)]
pub struct CheckinArgs {
    pub path: PathBuf,
    /// Store the targets of symlinks instead of the links.
    #[arg(long)]
    pub follow_symlinks: bool,
}

#[derive(Args)]
pub struct CheckoutArgs {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    pub id: String,
    pub path: String,
}

#[derive(Args)]
pub struct LsArgs {
    pub id: String,
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Args)]
pub struct CatArgs {
    pub id: String,
}

#[derive(Args)]
pub struct KindArgs {
    pub id: String,
}
