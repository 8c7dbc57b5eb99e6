use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Vellum: manage a filesystem-backed Markdown vault.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the default vault path detection.
    #[arg(long, global = true)]
    pub vault: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new vault at the given path.
    Init(InitArgs),
    /// List documents and folders in the vault.
    List(ListArgs),
    /// Create a new document.
    New(NewArgs),
    /// Print a document's content.
    Show(ShowArgs),
    /// Delete a document, or a folder with --folder.
    Rm(RmArgs),
    /// Move a document or folder into another folder.
    Mv(MvArgs),
    /// Rename a document or folder.
    Rename(RenameArgs),
    /// List the documents linking to a document.
    Backlinks(BacklinksArgs),
    /// Check vault integrity and repair what can be repaired.
    Check(CheckArgs),
}

// --- Argument Structs for each Subcommand ---

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path of the vault directory to create.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// List folders instead of documents.
    #[arg(long, short)]
    pub folders: bool,
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Name of the new document.
    pub name: String,

    /// Id of the folder to create the document in (defaults to the root).
    #[arg(long)]
    pub folder: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Id of the document to show.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Id of the document (or folder) to delete.
    pub id: String,

    /// Treat the id as a folder id.
    #[arg(long)]
    pub folder: bool,

    /// Delete a folder's contents along with it.
    #[arg(long, short)]
    pub recursive: bool,
}

#[derive(Args, Debug)]
pub struct MvArgs {
    /// Id of the document (or folder) to move.
    pub id: String,

    /// Id of the destination folder; omit to move to the vault root.
    #[arg(long)]
    pub to: Option<String>,

    /// Treat the id as a folder id.
    #[arg(long)]
    pub folder: bool,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Id of the document (or folder) to rename.
    pub id: String,

    /// The new name.
    pub new_name: String,

    /// Treat the id as a folder id.
    #[arg(long)]
    pub folder: bool,

    /// Also rewrite [[links]] referencing the old document name.
    #[arg(long)]
    pub update_links: bool,
}

#[derive(Args, Debug)]
pub struct BacklinksArgs {
    /// Id of the target document.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Print the raw integrity report as JSON.
    #[arg(long)]
    pub json: bool,
}
