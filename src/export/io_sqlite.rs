// Reading the ballot database.

use log::debug;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params, Row};
use snafu::prelude::*;

use ballot_rotation::{ColumnSplit, ElectorateLayout};

use crate::export::io_common::*;
use crate::export::*;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens an existing database, read only.
    pub fn open(path: &str) -> ExportResult<SqliteStore> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context(OpeningDatabaseSnafu { path })?;
        debug!("open: {}", path);
        Ok(SqliteStore { conn })
    }

    #[cfg(test)]
    pub(crate) fn from_connection(conn: Connection) -> SqliteStore {
        SqliteStore { conn }
    }

    fn query_all<T, P, F>(&self, sql: &str, params: P, f: F) -> ExportResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql).context(QuerySnafu { query: sql })?;
        let rows = stmt
            .query_map(params, f)
            .context(QuerySnafu { query: sql })?;
        rows.collect::<Result<Vec<T>, _>>()
            .context(QuerySnafu { query: sql })
    }

    fn table_exists(&self, table: &str) -> ExportResult<bool> {
        let sql = "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
        let count: u32 = self
            .conn
            .query_row(sql, params![table], |r| r.get(0))
            .context(QuerySnafu { query: sql })?;
        Ok(count > 0)
    }
}

/// The table holding the confirmed votes of an electorate.
pub fn confirmed_vote_table(layout: &ElectorateLayout) -> String {
    format!("{}_confirmed_vote", layout.normalized_name())
}

pub fn rotation_table(seat_count: u32) -> String {
    format!("robson_rotation_{}", seat_count)
}

impl BallotStore for SqliteStore {
    fn electorates(&self) -> ExportResult<Vec<ElectorateRow>> {
        self.query_all(
            "SELECT code, seat_count, name FROM electorate ORDER BY code",
            [],
            |r| {
                Ok(ElectorateRow {
                    code: r.get(0)?,
                    seat_count: r.get(1)?,
                    name: r.get(2)?,
                })
            },
        )
    }

    fn group_candidate_counts(&self, electorate_code: u32) -> ExportResult<Vec<(u32, u32)>> {
        self.query_all(
            "SELECT party_index, count(\"index\") FROM candidate \
             WHERE electorate_code = ?1 GROUP BY party_index ORDER BY party_index",
            params![electorate_code],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
    }

    fn column_splits(&self, electorate_code: u32) -> ExportResult<Vec<ColumnSplit>> {
        self.query_all(
            "SELECT party_index, physical_column_index, candidate_count FROM column_splits \
             WHERE electorate_code = ?1 ORDER BY party_index, physical_column_index",
            params![electorate_code],
            |r| {
                Ok(ColumnSplit {
                    group_index: r.get(0)?,
                    physical_column_index: r.get(1)?,
                    candidate_count: r.get(2)?,
                })
            },
        )
    }

    fn rotation(&self, seat_count: u32, paper_version: u32) -> ExportResult<Option<String>> {
        let table = rotation_table(seat_count);
        if !self.table_exists(&table)? {
            debug!("rotation: no table {}", table);
            return Ok(None);
        }
        let sql = format!("SELECT rotation FROM \"{}\" WHERE rotation_num = ?1", table);
        self.conn
            .query_row(&sql, params![paper_version], |r| r.get(0))
            .optional()
            .context(QuerySnafu { query: sql })
    }

    fn confirmed_votes(&self, layout: &ElectorateLayout) -> ExportResult<Vec<ConfirmedVoteRow>> {
        let sql = format!(
            "SELECT cv.batch_number, b.electorate_code, b.polling_place_code, \
             cv.paper_version, cv.preference_list, cv.id \
             FROM \"{}\" cv JOIN batch b ON cv.batch_number = b.number \
             ORDER BY cv.id, cv.batch_number",
            confirmed_vote_table(layout)
        );
        self.query_all(&sql, [], |r| {
            let preference_list: Option<String> = r.get(4)?;
            Ok(ConfirmedVoteRow {
                batch_number: r.get(0)?,
                electorate_code: r.get(1)?,
                polling_place_code: r.get(2)?,
                paper_version: r.get(3)?,
                preference_list: preference_list.unwrap_or_default(),
                vote_id: r.get(5)?,
            })
        })
    }

    fn groups(&self) -> ExportResult<Vec<GroupRow>> {
        self.query_all(
            "SELECT electorate_code, \"index\", name, abbreviation FROM party \
             ORDER BY electorate_code, \"index\"",
            [],
            |r| {
                let abbreviation: Option<String> = r.get(3)?;
                Ok(GroupRow {
                    electorate_code: r.get(0)?,
                    group_index: r.get(1)?,
                    name: r.get(2)?,
                    abbreviation: abbreviation.unwrap_or_default(),
                })
            },
        )
    }

    fn candidates(&self) -> ExportResult<Vec<CandidateRow>> {
        self.query_all(
            "SELECT electorate_code, party_index, \"index\", name FROM candidate \
             ORDER BY electorate_code, party_index, \"index\"",
            [],
            |r| {
                Ok(CandidateRow {
                    electorate_code: r.get(0)?,
                    group_index: r.get(1)?,
                    candidate_index: r.get(2)?,
                    name: r.get(3)?,
                })
            },
        )
    }
}
