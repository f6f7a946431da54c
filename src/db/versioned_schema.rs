use anyhow::{bail, Result};
use rusqlite::{params, Connection};

/// Offset added to the schema version before it is written to
/// `PRAGMA user_version`, so a fonoteca database is never mistaken
/// for some other application's SQLite file.
pub const BASE_DB_VERSION: usize = 77000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub non_null: bool,
    pub unique: bool,
    pub default_value: Option<&'static str>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            primary_key: false,
            non_null: false,
            unique: false,
            default_value: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    fn as_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default_value) = self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default_value));
        }
        sql
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// (index name, indexed columns expression)
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let columns_sql = self
            .columns
            .iter()
            .map(Column::as_sql)
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute(
            &format!("CREATE TABLE {} ({});", self.name, columns_sql),
            params![],
        )?;
        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    /// Check that the table exists with the expected column names, in order.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual_columns: Vec<String> = stmt
            .query_map(params![], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<_>>()?;
        let expected_columns: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        if actual_columns != expected_columns {
            bail!(
                "Table {} has columns [{}], expected [{}]",
                self.name,
                actual_columns.join(", "),
                expected_columns.join(", ")
            );
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TABLE: Table = Table {
        name: "things",
        columns: &[
            Column::new("id", SqlType::Integer).primary_key(),
            Column::new("label", SqlType::Text).non_null().unique(),
            Column::new("weight", SqlType::Real).default_value("1.0"),
        ],
        indices: &[("idx_things_label", "label")],
    };

    #[test]
    fn create_and_validate_table() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_TABLE.create(&conn).unwrap();
        TEST_TABLE.validate(&conn).unwrap();

        conn.execute("INSERT INTO things (label) VALUES ('a')", [])
            .unwrap();
        let weight: f64 = conn
            .query_row("SELECT weight FROM things WHERE label = 'a'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn validate_rejects_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE things (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        assert!(TEST_TABLE.validate(&conn).is_err());
    }

    #[test]
    fn versioned_schema_sets_user_version() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = VersionedSchema {
            version: 1,
            tables: &[TEST_TABLE],
            migration: None,
        };
        schema.create(&conn).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, (BASE_DB_VERSION + 1) as i64);
    }
}
