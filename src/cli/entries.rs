use anyhow::Result;
use clap::Subcommand;

use quill::config::QuillConfig;
use quill::journal::{store, EntryFilter, EntryUpdate, NewEntry, OwnerId};

use super::parse_category;

#[derive(Subcommand)]
pub enum EntriesAction {
    /// List an owner's entries
    List {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        category: Option<String>,
        /// Only completed entries
        #[arg(long, conflicts_with = "pending")]
        completed: bool,
        /// Only pending entries
        #[arg(long)]
        pending: bool,
    },
    /// Add an entry
    Add {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        category: String,
    },
    /// Mark an entry completed
    Complete {
        #[arg(long)]
        owner: String,
        id: i64,
    },
    /// Delete an entry
    Delete {
        #[arg(long)]
        owner: String,
        id: i64,
    },
}

pub fn run(config: &QuillConfig, action: EntriesAction) -> Result<()> {
    let mut conn = quill::db::open_database(config.resolved_db_path())?;

    match action {
        EntriesAction::List {
            owner,
            category,
            completed,
            pending,
        } => {
            let owner = OwnerId::new(owner);
            let filter = EntryFilter {
                category: category.as_deref().map(parse_category).transpose()?,
                completed: match (completed, pending) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };
            let entries = store::query_entries(&conn, &owner, &filter)?;

            if entries.is_empty() {
                println!("No entries.");
                return Ok(());
            }
            println!("{:<6} {:<14} {:<10} Title", "ID", "Category", "Status");
            println!("{}", "=".repeat(60));
            for entry in &entries {
                println!(
                    "{:<6} {:<14} {:<10} {}",
                    entry.id,
                    entry.category,
                    entry.status_label(),
                    entry.title
                );
            }
            println!();
            println!("{} entries", entries.len());
        }
        EntriesAction::Add {
            owner,
            title,
            content,
            category,
        } => {
            let entry = NewEntry::new(title, content, parse_category(&category)?);
            let created = store::create_entry(&mut conn, &OwnerId::new(owner), &entry)?;
            println!("Added #{} to {}: {}", created.id, created.category, created.title);
        }
        EntriesAction::Complete { owner, id } => {
            let update = EntryUpdate {
                is_completed: Some(true),
                ..EntryUpdate::default()
            };
            let entry = store::update_entry(&mut conn, &OwnerId::new(owner), id, &update)?;
            println!("Completed #{}: {}", entry.id, entry.title);
        }
        EntriesAction::Delete { owner, id } => {
            let entry = store::delete_entry(&mut conn, &OwnerId::new(owner), id)?;
            println!("Deleted #{}: {}", entry.id, entry.title);
        }
    }

    Ok(())
}
