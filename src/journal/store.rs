//! Owner-scoped read and write paths over the `entries` table.
//!
//! Every function takes the owner identity explicitly and includes it in the
//! `WHERE` clause, so one owner can never observe or mutate another's rows.
//! Writes run in a transaction together with their `entry_log` audit row.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::gateway::StoreError;
use super::types::{Category, Entry, EntryFilter, EntryUpdate, NewEntry, OwnerId};

const ENTRY_COLUMNS: &str =
    "id, owner, title, content, category, is_completed, created_at, updated_at";

/// Insert a new entry for `owner`. Title, content and category are trimmed and
/// must be non-empty.
pub fn create_entry(
    conn: &mut Connection,
    owner: &OwnerId,
    entry: &NewEntry,
) -> Result<Entry, StoreError> {
    if owner.is_empty() {
        return Err(StoreError::Validation("owner is required".into()));
    }
    let title = required_text("title", &entry.title)?;
    let content = required_text("content", &entry.content)?;

    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO entries (owner, title, content, category, is_completed, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            owner.as_str(),
            title,
            content,
            entry.category.as_str(),
            entry.is_completed,
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();

    write_audit_log(
        &tx,
        "create",
        id,
        owner,
        Some(&serde_json::json!({"category": entry.category.as_str()})),
    )?;

    let created = fetch_entry(&tx, owner, id)?.ok_or(StoreError::NotFound(id))?;
    tx.commit()?;

    tracing::debug!(id, owner = %owner, category = %created.category, "entry created");
    Ok(created)
}

/// List an owner's entries, oldest first, optionally narrowed by category and
/// completion state.
pub fn query_entries(
    conn: &Connection,
    owner: &OwnerId,
    filter: &EntryFilter,
) -> Result<Vec<Entry>, StoreError> {
    let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE owner = ?1");
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner.as_str().to_string())];

    if let Some(category) = &filter.category {
        values.push(Box::new(category.as_str().to_string()));
        sql.push_str(&format!(" AND category = ?{}", values.len()));
    }
    if let Some(completed) = filter.completed {
        values.push(Box::new(completed));
        sql.push_str(&format!(" AND is_completed = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY created_at ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(
            rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
            map_entry,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Fetch a single entry by id, only if it belongs to `owner`.
pub fn get_entry(conn: &Connection, owner: &OwnerId, id: i64) -> Result<Option<Entry>, StoreError> {
    fetch_entry(conn, owner, id)
}

/// Apply a partial update to an owned entry.
pub fn update_entry(
    conn: &mut Connection,
    owner: &OwnerId,
    id: i64,
    update: &EntryUpdate,
) -> Result<Entry, StoreError> {
    let title = update
        .title
        .as_deref()
        .map(|t| required_text("title", t))
        .transpose()?;
    let content = update
        .content
        .as_deref()
        .map(|c| required_text("content", c))
        .transpose()?;

    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();

    let rows = tx.execute(
        "UPDATE entries SET \
            title = COALESCE(?1, title), \
            content = COALESCE(?2, content), \
            category = COALESCE(?3, category), \
            is_completed = COALESCE(?4, is_completed), \
            updated_at = ?5 \
         WHERE id = ?6 AND owner = ?7",
        params![
            title,
            content,
            update.category.as_ref().map(Category::as_str),
            update.is_completed,
            now,
            id,
            owner.as_str(),
        ],
    )?;
    if rows == 0 {
        return Err(StoreError::NotFound(id));
    }

    let operation = match (update.is_completed, &update.title, &update.content, &update.category) {
        (Some(true), None, None, None) => "complete",
        _ => "update",
    };
    write_audit_log(&tx, operation, id, owner, None)?;

    let updated = fetch_entry(&tx, owner, id)?.ok_or(StoreError::NotFound(id))?;
    tx.commit()?;
    Ok(updated)
}

/// Delete an owned entry, returning the removed record.
pub fn delete_entry(conn: &mut Connection, owner: &OwnerId, id: i64) -> Result<Entry, StoreError> {
    let tx = conn.transaction()?;
    let existing = fetch_entry(&tx, owner, id)?.ok_or(StoreError::NotFound(id))?;

    tx.execute(
        "DELETE FROM entries WHERE id = ?1 AND owner = ?2",
        params![id, owner.as_str()],
    )?;
    write_audit_log(
        &tx,
        "delete",
        id,
        owner,
        Some(&serde_json::json!({"title": existing.title})),
    )?;
    tx.commit()?;
    Ok(existing)
}

fn fetch_entry(conn: &Connection, owner: &OwnerId, id: i64) -> Result<Option<Entry>, StoreError> {
    let entry = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1 AND owner = ?2"),
            params![id, owner.as_str()],
            map_entry,
        )
        .optional()?;
    Ok(entry)
}

fn map_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let category: String = row.get(4)?;
    let category = category.parse::<Category>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(Entry {
        id: row.get(0)?,
        owner: OwnerId::new(row.get::<_, String>(1)?),
        title: row.get(2)?,
        content: row.get(3)?,
        category,
        is_completed: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn required_text<'a>(field: &str, value: &'a str) -> Result<&'a str, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation(format!(
            "{field} is required and must be a non-empty string"
        )));
    }
    Ok(trimmed)
}

/// Write an entry to the entry_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    entry_id: i64,
    owner: &OwnerId,
    details: Option<&serde_json::Value>,
) -> Result<(), StoreError> {
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO entry_log (operation, entry_id, owner, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![operation, entry_id, owner.as_str(), details_json, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::db::open_memory_database().unwrap()
    }

    fn alice() -> OwnerId {
        OwnerId::new("alice")
    }

    fn bob() -> OwnerId {
        OwnerId::new("bob")
    }

    fn category(s: &str) -> Category {
        s.parse().unwrap()
    }

    #[test]
    fn test_create_entry_trims_and_returns_record() {
        let mut conn = test_db();
        let entry = create_entry(
            &mut conn,
            &alice(),
            &NewEntry::new("  Buy eggs ", " a dozen ", category("shopping")),
        )
        .unwrap();

        assert!(entry.id > 0);
        assert_eq!(entry.title, "Buy eggs");
        assert_eq!(entry.content, "a dozen");
        assert_eq!(entry.category.as_str(), "shopping");
        assert!(!entry.is_completed);
        assert_eq!(entry.owner, alice());
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let mut conn = test_db();
        let err = create_entry(
            &mut conn,
            &alice(),
            &NewEntry::new("   ", "content", category("note")),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_query_is_owner_scoped() {
        let mut conn = test_db();
        create_entry(&mut conn, &alice(), &NewEntry::new("Milk", "2L", category("shopping"))).unwrap();
        create_entry(&mut conn, &bob(), &NewEntry::new("Bread", "rye", category("shopping"))).unwrap();

        let entries = query_entries(&conn, &alice(), &EntryFilter::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Milk");
    }

    #[test]
    fn test_query_filters_by_category_and_completion() {
        let mut conn = test_db();
        let milk = create_entry(&mut conn, &alice(), &NewEntry::new("Milk", "2L", category("shopping"))).unwrap();
        create_entry(&mut conn, &alice(), &NewEntry::new("Call mom", "Sunday", category("reminder"))).unwrap();

        let shopping =
            query_entries(&conn, &alice(), &EntryFilter::category(Some(category("shopping")))).unwrap();
        assert_eq!(shopping.len(), 1);
        assert_eq!(shopping[0].id, milk.id);

        update_entry(
            &mut conn,
            &alice(),
            milk.id,
            &EntryUpdate {
                is_completed: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let done = query_entries(
            &conn,
            &alice(),
            &EntryFilter {
                category: None,
                completed: Some(true),
            },
        )
        .unwrap();
        assert_eq!(done.len(), 1);
        assert!(done[0].is_completed);
    }

    #[test]
    fn test_update_other_owner_is_not_found() {
        let mut conn = test_db();
        let entry = create_entry(&mut conn, &alice(), &NewEntry::new("Milk", "2L", category("shopping"))).unwrap();

        let err = update_entry(
            &mut conn,
            &bob(),
            entry.id,
            &EntryUpdate {
                title: Some("Hacked".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == entry.id));

        let still = get_entry(&conn, &alice(), entry.id).unwrap().unwrap();
        assert_eq!(still.title, "Milk");
    }

    #[test]
    fn test_delete_entry_and_audit_log() {
        let mut conn = test_db();
        let entry = create_entry(&mut conn, &alice(), &NewEntry::new("Milk", "2L", category("shopping"))).unwrap();

        assert!(delete_entry(&mut conn, &bob(), entry.id).is_err());
        let removed = delete_entry(&mut conn, &alice(), entry.id).unwrap();
        assert_eq!(removed.id, entry.id);
        assert!(get_entry(&conn, &alice(), entry.id).unwrap().is_none());

        let ops: Vec<String> = conn
            .prepare("SELECT operation FROM entry_log WHERE entry_id = ?1 ORDER BY id")
            .unwrap()
            .query_map(params![entry.id], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(ops, vec!["create".to_string(), "delete".to_string()]);
    }
}
