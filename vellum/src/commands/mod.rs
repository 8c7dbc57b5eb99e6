use anyhow::Result;
use tracing::info;
use vellum_core::Vault;
use vellum_core::vault::FolderDeletion;

use crate::cli::{
    BacklinksArgs, CheckArgs, InitArgs, ListArgs, MvArgs, NewArgs, RenameArgs, RmArgs, ShowArgs,
};

// --- Handler Functions ---

pub async fn handle_init(args: InitArgs) -> Result<()> {
    let vault = Vault::create(&args.path).await?;
    println!("Created vault at {}", vault.path().display());
    Ok(())
}

pub async fn handle_list(args: ListArgs, vault: &Vault) -> Result<()> {
    if args.folders {
        let folders = vault.load_folders().await?;
        for folder in &folders {
            let parent = folder.parent_id.as_deref().unwrap_or("-");
            println!("{}  {}  (parent: {})", folder.id, folder.name, parent);
        }
        info!("Listed {} folders", folders.len());
    } else {
        let documents = vault.load_documents().await?;
        for doc in &documents {
            let folder = doc.folder_id.as_deref().unwrap_or("-");
            println!("{}  {}  (folder: {})", doc.id, doc.name, folder);
        }
        info!("Listed {} documents", documents.len());
    }
    Ok(())
}

pub async fn handle_new(args: NewArgs, vault: &Vault) -> Result<()> {
    let doc = vault.create_document(&args.name, args.folder).await?;
    println!("{}", doc.id);
    Ok(())
}

pub async fn handle_show(args: ShowArgs, vault: &Vault) -> Result<()> {
    let doc = vault.get_document(&args.id).await?;
    print!("{}", doc.content);
    Ok(())
}

pub async fn handle_rm(args: RmArgs, vault: &Vault) -> Result<()> {
    if args.folder {
        match vault.delete_folder(&args.id, args.recursive).await? {
            FolderDeletion::Deleted {
                documents_removed,
                folders_removed,
            } => {
                println!(
                    "Deleted {} folder(s) and {} document(s)",
                    folders_removed, documents_removed
                );
            }
            FolderDeletion::Refused {
                document_count,
                subfolder_count,
                ..
            } => {
                println!(
                    "Folder is not empty ({} document(s), {} subfolder(s)); re-run with --recursive",
                    document_count, subfolder_count
                );
            }
        }
    } else {
        vault.delete_document(&args.id).await?;
        println!("Deleted {}", args.id);
    }
    Ok(())
}

pub async fn handle_mv(args: MvArgs, vault: &Vault) -> Result<()> {
    if args.folder {
        let folder = vault.move_folder(&args.id, args.to).await?;
        println!("Moved folder '{}'", folder.name);
    } else {
        let doc = vault.move_document(&args.id, args.to).await?;
        println!("Moved document '{}'", doc.name);
    }
    Ok(())
}

pub async fn handle_rename(args: RenameArgs, vault: &Vault) -> Result<()> {
    if args.folder {
        let folder = vault.rename_folder(&args.id, &args.new_name).await?;
        println!("Renamed folder to '{}'", folder.name);
        return Ok(());
    }

    let old_name = vault.get_document(&args.id).await?.name;
    let doc = vault.rename_document(&args.id, &args.new_name).await?;
    println!("Renamed document to '{}'", doc.name);

    if args.update_links {
        let rewritten = vault.update_links(&old_name, &args.new_name).await?;
        println!("Rewrote links in {} document(s)", rewritten);
    }
    Ok(())
}

pub async fn handle_backlinks(args: BacklinksArgs, vault: &Vault) -> Result<()> {
    let backlinks = vault.backlinks(&args.id).await?;
    for doc in &backlinks {
        println!("{}  {}", doc.id, doc.name);
    }
    info!("Found {} backlinks", backlinks.len());
    Ok(())
}

pub async fn handle_check(args: CheckArgs, vault: &Vault) -> Result<()> {
    let report = vault.check_and_fix().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Checked {} documents, {} folders, {} compositions",
        report.documents_checked, report.folders_checked, report.compositions_checked
    );
    println!("  duplicate ids fixed:            {}", report.duplicate_ids_fixed);
    println!("  missing metadata fixed:         {}", report.missing_metadata_fixed);
    println!("  invalid dates fixed:            {}", report.invalid_dates_fixed);
    println!("  orphaned documents fixed:       {}", report.orphaned_documents_fixed);
    println!("  orphaned folders fixed:         {}", report.orphaned_folders_fixed);
    println!("  composition frontmatter fixed:  {}", report.composition_frontmatter_fixed);
    for line in &report.details {
        println!("  - {}", line);
    }
    if report.is_clean() {
        println!("Vault is clean.");
    }
    Ok(())
}
