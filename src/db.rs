use crate::error::{ImporterError, Result};
use crate::models::{College, CollegeArgs, ReplacementUniversity, State};
use crate::storage::{Storage, StorageCounts};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS states (
        id          BLOB PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE,
        created_at  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS replacement_universities (
        id          BLOB PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE,
        state_id    BLOB REFERENCES states(id),
        created_at  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS colleges (
        id                         BLOB PRIMARY KEY,
        name                       TEXT NOT NULL UNIQUE,
        city                       TEXT,
        state_id                   BLOB REFERENCES states(id),
        also_known_as              TEXT,
        established_year           INTEGER,
        website                    TEXT,
        contact_numbers            TEXT,
        replacement_university_id  BLOB REFERENCES replacement_universities(id),
        created_at                 TEXT NOT NULL
    );
"#;

const COLLEGE_COLUMNS: &str = "id, name, city, state_id, also_known_as, established_year, \
     website, contact_numbers, replacement_university_id, created_at";

/// SQLite-backed storage. Every call is its own statement; there is no
/// transaction spanning a whole import.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("conn", &"<Mutex<Connection>>")
            .finish()
    }
}

impl SqliteStorage {
    /// Opens (or creates) the database file and runs the schema migration.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening college database at {}", db_path.display());

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        debug!("College schema is up to date");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ImporterError::Storage("database connection lock poisoned".to_string()))
    }
}

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<State> {
    Ok(State {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn university_from_row(row: &Row<'_>) -> rusqlite::Result<ReplacementUniversity> {
    Ok(ReplacementUniversity {
        id: row.get(0)?,
        name: row.get(1)?,
        state_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn college_from_row(row: &Row<'_>) -> rusqlite::Result<College> {
    Ok(College {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        state_id: row.get(3)?,
        also_known_as: row.get(4)?,
        established_year: row.get(5)?,
        website: row.get(6)?,
        contact_numbers: row.get(7)?,
        replacement_university_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn count(conn: &Connection, table: &str) -> Result<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n as usize)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn find_college_by_name(&self, name: &str) -> Result<Option<College>> {
        let conn = self.conn()?;
        let college = conn
            .query_row(
                &format!("SELECT {COLLEGE_COLUMNS} FROM colleges WHERE name = ?1"),
                params![name],
                college_from_row,
            )
            .optional()?;
        Ok(college)
    }

    async fn create_college(&self, args: CollegeArgs) -> Result<College> {
        let college = College::new(args);
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO colleges ({COLLEGE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                college.id,
                college.name,
                college.city,
                college.state_id,
                college.also_known_as,
                college.established_year,
                college.website,
                college.contact_numbers,
                college.replacement_university_id,
                college.created_at,
            ],
        )?;

        debug!("Created college: {} with id {}", college.name, college.id);
        Ok(college)
    }

    async fn list_colleges(&self) -> Result<Vec<College>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLEGE_COLUMNS} FROM colleges ORDER BY rowid"
        ))?;
        let colleges = stmt
            .query_map([], college_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(colleges)
    }

    async fn find_or_create_state(&self, name: &str) -> Result<State> {
        let candidate = State::new(name);
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO states (id, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO NOTHING",
            params![candidate.id, candidate.name, candidate.created_at],
        )?;
        if inserted > 0 {
            debug!("Created state: {} with id {}", candidate.name, candidate.id);
        }

        let state = conn.query_row(
            "SELECT id, name, created_at FROM states WHERE name = ?1",
            params![name],
            state_from_row,
        )?;
        Ok(state)
    }

    async fn find_state_by_name(&self, name: &str) -> Result<Option<State>> {
        let conn = self.conn()?;
        let state = conn
            .query_row(
                "SELECT id, name, created_at FROM states WHERE name = ?1",
                params![name],
                state_from_row,
            )
            .optional()?;
        Ok(state)
    }

    async fn find_or_create_university(&self, name: &str) -> Result<ReplacementUniversity> {
        let candidate = ReplacementUniversity::new(name);
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO replacement_universities (id, name, state_id, created_at)
             VALUES (?1, ?2, NULL, ?3)
             ON CONFLICT(name) DO NOTHING",
            params![candidate.id, candidate.name, candidate.created_at],
        )?;
        if inserted > 0 {
            debug!("Created university: {} with id {}", candidate.name, candidate.id);
        }

        let university = conn.query_row(
            "SELECT id, name, state_id, created_at FROM replacement_universities WHERE name = ?1",
            params![name],
            university_from_row,
        )?;
        Ok(university)
    }

    async fn find_university_by_name(&self, name: &str) -> Result<Option<ReplacementUniversity>> {
        let conn = self.conn()?;
        let university = conn
            .query_row(
                "SELECT id, name, state_id, created_at FROM replacement_universities WHERE name = ?1",
                params![name],
                university_from_row,
            )
            .optional()?;
        Ok(university)
    }

    async fn set_university_state(
        &self,
        university_id: Uuid,
        state_id: Uuid,
    ) -> Result<ReplacementUniversity> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE replacement_universities SET state_id = ?1
             WHERE id = ?2 AND state_id IS NULL",
            params![state_id, university_id],
        )?;
        if updated > 0 {
            debug!("Set state of university {} to {}", university_id, state_id);
        }

        conn.query_row(
            "SELECT id, name, state_id, created_at FROM replacement_universities WHERE id = ?1",
            params![university_id],
            university_from_row,
        )
        .optional()?
        .ok_or_else(|| ImporterError::Storage(format!("university {university_id} does not exist")))
    }

    async fn counts(&self) -> Result<StorageCounts> {
        let conn = self.conn()?;
        Ok(StorageCounts {
            colleges: count(&conn, "colleges")?,
            states: count(&conn, "states")?,
            universities: count(&conn, "replacement_universities")?,
        })
    }
}
