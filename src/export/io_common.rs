// Row shapes read from the ballot database and records written by the export.

use ballot_rotation::{ColumnSplit, ElectorateLayout, Preference};
use serde::Serialize;

use crate::export::{ExportResult, VoteRecord};

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectorateRow {
    pub code: u32,
    pub seat_count: u32,
    pub name: String,
}

/// A confirmed vote joined with the polling place of its batch.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConfirmedVoteRow {
    pub batch_number: u32,
    pub electorate_code: u32,
    pub polling_place_code: u32,
    pub paper_version: u32,
    pub preference_list: String,
    pub vote_id: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct GroupRow {
    pub electorate_code: u32,
    pub group_index: u32,
    pub name: String,
    pub abbreviation: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct CandidateRow {
    pub electorate_code: u32,
    pub group_index: u32,
    pub candidate_index: u32,
    pub name: String,
}

/// The source of all the data needed by the export.
pub trait BallotStore {
    /// All the electorates, ordered by code.
    fn electorates(&self) -> ExportResult<Vec<ElectorateRow>>;

    /// `(group_index, candidate_count)` for every group of the electorate.
    fn group_candidate_counts(&self, electorate_code: u32) -> ExportResult<Vec<(u32, u32)>>;

    /// The column splits of the electorate, ordered by group then column.
    fn column_splits(&self, electorate_code: u32) -> ExportResult<Vec<ColumnSplit>>;

    /// The textual rotation of a paper version, if there is one.
    fn rotation(&self, seat_count: u32, paper_version: u32) -> ExportResult<Option<String>>;

    /// The confirmed votes of an electorate, ordered by vote id then batch number.
    fn confirmed_votes(&self, layout: &ElectorateLayout) -> ExportResult<Vec<ConfirmedVoteRow>>;

    /// All the groups, ordered by electorate then group index.
    fn groups(&self) -> ExportResult<Vec<GroupRow>>;

    /// All the candidates, ordered by electorate, group, then candidate index.
    fn candidates(&self) -> ExportResult<Vec<CandidateRow>>;
}

pub const FORMAL_HEADER: [&str; 6] = [
    "Batch Number",
    "Paper Index",
    "Preference Number",
    "Party Code",
    "Candidate Code",
    "Candidate Screen Index",
];

pub const INFORMAL_HEADER: [&str; 2] = ["Batch Number", "Internal Vote Id"];

pub const PAPER_VERSION_HEADER: [&str; 5] = [
    "Batch Number",
    "Paper Index",
    "Electorate Code",
    "Polling Place Code",
    "Paper Version",
];

pub const GROUP_HEADER: [&str; 4] = [
    "Electorate Code",
    "Party Code",
    "Party Name",
    "Party Abbreviation",
];

pub const CANDIDATE_HEADER: [&str; 4] = [
    "Electorate Code",
    "Party Code",
    "Candidate Code",
    "Candidate Name",
];

/// The value written when a paper has no rotation.
pub const NO_SCREEN_INDEX: i64 = -1;

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct FormalPreferenceRecord {
    pub batch_number: u32,
    pub vote_id: u32,
    pub preference_number: u32,
    pub group_index: u32,
    pub db_candidate_index: u32,
    pub screen_candidate_index: i64,
}

impl FormalPreferenceRecord {
    pub fn new(vote: &VoteRecord, pref: &Preference) -> FormalPreferenceRecord {
        FormalPreferenceRecord {
            batch_number: vote.batch_number,
            vote_id: vote.vote_id,
            preference_number: pref.preference_number,
            group_index: pref.group_index,
            db_candidate_index: pref.db_candidate_index,
            screen_candidate_index: pref
                .screen_candidate_index
                .map(i64::from)
                .unwrap_or(NO_SCREEN_INDEX),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct InformalVoteRecord {
    pub batch_number: u32,
    pub vote_id: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct PaperVersionRecord {
    pub batch_number: u32,
    pub vote_id: u32,
    pub electorate_code: u32,
    pub polling_place_code: u32,
    pub paper_version: u32,
}

/// Receives the records of one electorate. Owned by the export of that
/// electorate only.
pub trait ElectorateSink {
    fn write_formal(&mut self, record: &FormalPreferenceRecord) -> ExportResult<()>;

    fn write_informal(&mut self, record: &InformalVoteRecord) -> ExportResult<()>;

    fn finish(self) -> ExportResult<()>;
}

/// Receives the run-wide records and hands out the electorate sinks.
pub trait ExportSink {
    type Electorate: ElectorateSink;

    fn write_groups(&mut self, rows: &[GroupRow]) -> ExportResult<()>;

    fn write_candidates(&mut self, rows: &[CandidateRow]) -> ExportResult<()>;

    fn write_paper_version(&mut self, record: &PaperVersionRecord) -> ExportResult<()>;

    fn open_electorate(&mut self, layout: &ElectorateLayout) -> ExportResult<Self::Electorate>;

    fn finish(&mut self) -> ExportResult<()>;
}
