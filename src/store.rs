//! SQLite persistence for the local interview server.
//!
//! Holds conversations with their project metadata, the append-only turn
//! log, saved stack configurations, and backlog items with their history.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::KickoffError;
use crate::model::{BacklogItem, ProjectField, Role, StackTokens, Turn};
use crate::workflow::BacklogStatus;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS turns (
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    options_json TEXT,
    prefilled_value TEXT,
    question_number INTEGER,
    selected_ids_json TEXT,
    PRIMARY KEY (conversation_id, seq)
);
CREATE TABLE IF NOT EXISTS stack_configs (
    conversation_id TEXT PRIMARY KEY REFERENCES conversations(id),
    backend TEXT,
    database TEXT,
    frontend TEXT,
    css TEXT
);
CREATE TABLE IF NOT EXISTS backlog_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    title TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS item_transitions (
    item_id INTEGER NOT NULL REFERENCES backlog_items(id),
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    reason TEXT
);
"#;

/// Project metadata attached to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub title: String,
    pub description: String,
}

/// One recorded status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub from_status: String,
    pub to_status: String,
    pub reason: Option<String>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, KickoffError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| KickoffError::DataDir {
                path: parent.to_path_buf(),
                detail: e.to_string(),
            })?;
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.migrate()?;
        info!(path = ?path, "store_opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, KickoffError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), KickoffError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn create_conversation(&self, id: &str, title: &str) -> Result<(), KickoffError> {
        self.conn.execute(
            "INSERT INTO conversations (id, title) VALUES (?1, ?2)",
            params![id, title],
        )?;
        debug!(conversation_id = id, "conversation_created");
        Ok(())
    }

    fn ensure_conversation(&self, id: &str) -> Result<(), KickoffError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(KickoffError::ConversationNotFound {
                conversation_id: id.to_string(),
            })
        }
    }

    pub fn project(&self, id: &str) -> Result<ProjectInfo, KickoffError> {
        self.conn
            .query_row(
                "SELECT title, description FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ProjectInfo {
                        title: row.get(0)?,
                        description: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| KickoffError::ConversationNotFound {
                conversation_id: id.to_string(),
            })
    }

    pub fn update_project_field(
        &self,
        id: &str,
        field: ProjectField,
        value: &str,
    ) -> Result<(), KickoffError> {
        let sql = match field {
            ProjectField::Title => "UPDATE conversations SET title = ?2 WHERE id = ?1",
            ProjectField::Description => "UPDATE conversations SET description = ?2 WHERE id = ?1",
        };
        let updated = self.conn.execute(sql, params![id, value])?;
        if updated == 0 {
            return Err(KickoffError::ConversationNotFound {
                conversation_id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Appends a turn at the end of the conversation's transcript.
    pub fn append_turn(&self, id: &str, turn: &Turn) -> Result<(), KickoffError> {
        self.ensure_conversation(id)?;
        insert_turn(&self.conn, id, turn)
    }

    /// Appends a user turn and the reply to it. Both are stored or neither is.
    pub fn append_exchange(&self, id: &str, user: &Turn, reply: &Turn) -> Result<(), KickoffError> {
        self.ensure_conversation(id)?;
        let tx = self.conn.unchecked_transaction()?;
        insert_turn(&tx, id, user)?;
        insert_turn(&tx, id, reply)?;
        tx.commit()?;
        Ok(())
    }

    pub fn turns(&self, id: &str) -> Result<Vec<Turn>, KickoffError> {
        self.ensure_conversation(id)?;
        let mut stmt = self.conn.prepare(
            "SELECT role, content, options_json, prefilled_value, question_number, selected_ids_json
             FROM turns WHERE conversation_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<u32>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content, options_json, prefilled_value, question_number, selected_json) =
                row?;
            let role = Role::from_str(&role).ok_or_else(|| {
                KickoffError::Collaborator(format!("Stored turn has unknown role '{}'", role))
            })?;
            turns.push(Turn {
                role,
                content,
                options: options_json.as_deref().map(serde_json::from_str).transpose()?,
                prefilled_value,
                question_number,
                selected_option_ids: selected_json
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()?,
            });
        }
        Ok(turns)
    }

    /// Stores the stack configuration, replacing any earlier one.
    pub fn save_stack(&self, id: &str, tokens: &StackTokens) -> Result<(), KickoffError> {
        self.ensure_conversation(id)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO stack_configs (conversation_id, backend, database, frontend, css)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, tokens.backend, tokens.database, tokens.frontend, tokens.css],
        )?;
        Ok(())
    }

    pub fn stack(&self, id: &str) -> Result<Option<StackTokens>, KickoffError> {
        let tokens = self
            .conn
            .query_row(
                "SELECT backend, database, frontend, css FROM stack_configs WHERE conversation_id = ?1",
                params![id],
                |row| {
                    Ok(StackTokens {
                        backend: row.get(0)?,
                        database: row.get(1)?,
                        frontend: row.get(2)?,
                        css: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(tokens)
    }

    pub fn create_item(&self, id: &str, title: &str) -> Result<BacklogItem, KickoffError> {
        self.ensure_conversation(id)?;
        let status = BacklogStatus::Todo.label();
        self.conn.execute(
            "INSERT INTO backlog_items (conversation_id, title, status) VALUES (?1, ?2, ?3)",
            params![id, title, status],
        )?;
        Ok(BacklogItem {
            id: self.conn.last_insert_rowid(),
            title: title.to_string(),
            status: status.to_string(),
        })
    }

    pub fn item(&self, item_id: i64) -> Result<BacklogItem, KickoffError> {
        self.conn
            .query_row(
                "SELECT id, title, status FROM backlog_items WHERE id = ?1",
                params![item_id],
                |row| {
                    Ok(BacklogItem {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        status: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(KickoffError::ItemNotFound { item_id })
    }

    pub fn items(&self, id: &str) -> Result<Vec<BacklogItem>, KickoffError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, status FROM backlog_items WHERE conversation_id = ?1 ORDER BY id",
        )?;
        let items = stmt
            .query_map(params![id], |row| {
                Ok(BacklogItem {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    status: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Records a status change. Validation happens in the caller.
    pub fn set_item_status(
        &self,
        item_id: i64,
        from: BacklogStatus,
        to: BacklogStatus,
        reason: Option<&str>,
    ) -> Result<(), KickoffError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE backlog_items SET status = ?2 WHERE id = ?1",
            params![item_id, to.label()],
        )?;
        tx.execute(
            "INSERT INTO item_transitions (item_id, from_status, to_status, reason) VALUES (?1, ?2, ?3, ?4)",
            params![item_id, from.label(), to.label(), reason],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn item_history(&self, item_id: i64) -> Result<Vec<TransitionRecord>, KickoffError> {
        let mut stmt = self.conn.prepare(
            "SELECT from_status, to_status, reason FROM item_transitions WHERE item_id = ?1 ORDER BY rowid",
        )?;
        let records = stmt
            .query_map(params![item_id], |row| {
                Ok(TransitionRecord {
                    from_status: row.get(0)?,
                    to_status: row.get(1)?,
                    reason: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Inserts one turn at the next sequence number of the conversation.
fn insert_turn(conn: &Connection, id: &str, turn: &Turn) -> Result<(), KickoffError> {
    let options_json = turn.options.as_ref().map(serde_json::to_string).transpose()?;
    let selected_json = turn
        .selected_option_ids
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO turns (conversation_id, seq, role, content, options_json, prefilled_value, question_number, selected_ids_json)
         VALUES (?1, (SELECT COUNT(*) FROM turns WHERE conversation_id = ?1), ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            turn.role.label(),
            turn.content,
            options_json,
            turn.prefilled_value,
            turn.question_number,
            selected_json,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, ChoiceKind, ChoiceOptions};

    fn store_with_conversation() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.create_conversation("c1", "acme").unwrap();
        store
    }

    #[test]
    fn test_turns_roundtrip_in_order() {
        let store = store_with_conversation();
        let options = ChoiceOptions {
            kind: ChoiceKind::Single,
            choices: vec![Choice {
                id: "opt-0".to_string(),
                label: "React".to_string(),
                value: "react".to_string(),
            }],
        };
        let turns = vec![
            Turn::assistant("Name?").with_question_number(1).with_prefill("acme"),
            Turn::user("acme"),
            Turn::assistant("Frontend?").with_options(options),
            Turn::user("React").with_selected_ids(vec!["opt-0".to_string()]),
        ];
        for turn in &turns {
            store.append_turn("c1", turn).unwrap();
        }
        assert_eq!(store.turns("c1").unwrap(), turns);
    }

    #[test]
    fn test_unknown_conversation() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.append_turn("nope", &Turn::user("x")),
            Err(KickoffError::ConversationNotFound { .. })
        ));
        assert!(matches!(
            store.update_project_field("nope", ProjectField::Title, "x"),
            Err(KickoffError::ConversationNotFound { .. })
        ));
    }

    #[test]
    fn test_update_project_fields() {
        let store = store_with_conversation();
        store
            .update_project_field("c1", ProjectField::Title, "acme-web")
            .unwrap();
        store
            .update_project_field("c1", ProjectField::Description, "A web app")
            .unwrap();
        assert_eq!(
            store.project("c1").unwrap(),
            ProjectInfo {
                title: "acme-web".to_string(),
                description: "A web app".to_string(),
            }
        );
    }

    #[test]
    fn test_save_stack_replaces() {
        let store = store_with_conversation();
        assert_eq!(store.stack("c1").unwrap(), None);
        let mut tokens = StackTokens {
            backend: Some("nodejs".to_string()),
            ..Default::default()
        };
        store.save_stack("c1", &tokens).unwrap();
        tokens.css = Some("tailwindcss".to_string());
        store.save_stack("c1", &tokens).unwrap();
        assert_eq!(store.stack("c1").unwrap(), Some(tokens));
    }

    #[test]
    fn test_items_and_history() {
        let store = store_with_conversation();
        let item = store.create_item("c1", "Set up nodejs backend").unwrap();
        assert_eq!(item.status, "todo");
        store
            .set_item_status(
                item.id,
                BacklogStatus::Todo,
                BacklogStatus::InProgress,
                Some("started"),
            )
            .unwrap();
        assert_eq!(store.item(item.id).unwrap().status, "in_progress");
        assert_eq!(
            store.item_history(item.id).unwrap(),
            vec![TransitionRecord {
                from_status: "todo".to_string(),
                to_status: "in_progress".to_string(),
                reason: Some("started".to_string()),
            }]
        );
        assert_eq!(store.items("c1").unwrap().len(), 1);
        assert!(matches!(
            store.item(999),
            Err(KickoffError::ItemNotFound { item_id: 999 })
        ));
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kickoff.db");
        {
            let store = Store::open(&path).unwrap();
            store.create_conversation("c1", "acme").unwrap();
        }
        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.project("c1").unwrap().title, "acme");
    }

    #[test]
    fn test_open_reports_data_dir_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = Store::open(&blocker.join("kickoff.db")).err().unwrap();
        match err {
            KickoffError::DataDir { path, .. } => assert_eq!(path, blocker),
            other => panic!("expected DataDir, got {other:?}"),
        }
    }

    #[test]
    fn test_exchange_appends_both_turns() {
        let store = store_with_conversation();
        store
            .append_turn("c1", &Turn::assistant("Name?").with_question_number(1))
            .unwrap();
        store
            .append_exchange("c1", &Turn::user("acme"), &Turn::assistant("Description?"))
            .unwrap();
        let contents: Vec<String> = store
            .turns("c1")
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["Name?", "acme", "Description?"]);
    }

    #[test]
    fn test_failed_reply_leaves_transcript_unchanged() {
        let store = store_with_conversation();
        store
            .append_turn("c1", &Turn::assistant("Name?").with_question_number(1))
            .unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_reply BEFORE INSERT ON turns
                 WHEN NEW.role = 'assistant' AND NEW.seq > 0
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let result =
            store.append_exchange("c1", &Turn::user("acme"), &Turn::assistant("Description?"));
        assert!(matches!(result, Err(KickoffError::Store(_))));
        assert_eq!(store.turns("c1").unwrap().len(), 1);

        store.conn.execute_batch("DROP TRIGGER reject_reply;").unwrap();
        store
            .append_exchange("c1", &Turn::user("acme"), &Turn::assistant("Description?"))
            .unwrap();
        let turns = store.turns("c1").unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content, "acme");
    }
}
