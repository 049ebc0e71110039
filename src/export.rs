use log::{debug, info, warn};

use ballot_rotation::builder::LayoutBuilder;
use ballot_rotation::preferences::unpack_preferences;
use ballot_rotation::*;
use snafu::{prelude::*, Snafu};

use std::collections::hash_map::Entry;
use std::collections::HashMap;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_sqlite;
pub mod reference;

use crate::args::Args;
use crate::export::config_reader::*;
use crate::export::io_common::*;
use crate::export::io_csv::CsvSink;
use crate::export::io_sqlite::SqliteStore;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExportError {
    #[snafu(display("Error reading configuration file {path}"))]
    OpeningConfig {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing configuration file {path}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("No database given: use --database or set databasePath in the configuration"))]
    MissingDatabase {},
    #[snafu(display("maxSeatCount must be between 1 and 99, found {value}"))]
    InvalidMaxSeatCount { value: u32 },

    #[snafu(display("Error opening database {path}"))]
    OpeningDatabase {
        source: rusqlite::Error,
        path: String,
    },
    #[snafu(display("Database query failed: {query}"))]
    Query {
        source: rusqlite::Error,
        query: String,
    },

    #[snafu(display("Error creating output directory {path}"))]
    CreatingOutputDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Error flushing {path}"))]
    FlushingCsv {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading reference file {path}"))]
    OpeningReference {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Invalid ballot layout for electorate {electorate}"))]
    Layout {
        source: LayoutError,
        electorate: String,
    },
    #[snafu(display(
        "Electorate {electorate}: group {group_index} has {layout_count} candidates in the layout but {listed_count} in the candidate listing"
    ))]
    GroupCountMismatch {
        electorate: String,
        group_index: u32,
        layout_count: u32,
        listed_count: u32,
    },
    #[snafu(display(
        "Electorate {electorate}: no rotation for paper version {paper_version} ({seat_count} seats), batch {batch_number}, vote {vote_id}"
    ))]
    MissingRotation {
        electorate: String,
        seat_count: u32,
        paper_version: u32,
        batch_number: u32,
        vote_id: u32,
    },
    #[snafu(display("Electorate {electorate}: invalid rotation for paper version {paper_version}"))]
    InvalidRotation {
        source: RotationError,
        electorate: String,
        paper_version: u32,
    },
    #[snafu(display(
        "Electorate {electorate}: malformed preference list {preference_list:?} in batch {batch_number}, vote {vote_id}"
    ))]
    MalformedPreferences {
        source: PreferenceError,
        electorate: String,
        preference_list: String,
        batch_number: u32,
        vote_id: u32,
    },
    #[snafu(display(
        "Electorate {electorate}: cannot translate the preferences of batch {batch_number}, vote {vote_id}"
    ))]
    Translation {
        source: TranslationError,
        electorate: String,
        batch_number: u32,
        vote_id: u32,
    },
    #[snafu(display(
        "Electorate {electorate}: vote {vote_id} of batch {batch_number} belongs to electorate code {vote_electorate_code}"
    ))]
    ElectorateMismatch {
        electorate: String,
        vote_electorate_code: u32,
        batch_number: u32,
        vote_id: u32,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ExportResult<T> = Result<T, ExportError>;

/// A confirmed vote with its decoded preferences.
///
/// The preferences are in increasing preference number. An empty set is an
/// informal vote.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRecord {
    pub batch_number: u32,
    pub electorate_code: u32,
    pub polling_place_code: u32,
    pub paper_version: u32,
    pub vote_id: u32,
    pub preferences: PreferenceSet,
}

/// The number of candidates per `(electorate_code, group_index)`, as found
/// in the candidate listing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct GroupCandidateCounts {
    counts: HashMap<(u32, u32), u32>,
}

impl GroupCandidateCounts {
    pub fn record(&mut self, row: &CandidateRow) {
        *self
            .counts
            .entry((row.electorate_code, row.group_index))
            .or_insert(0) += 1;
    }

    pub fn get(&self, electorate_code: u32, group_index: u32) -> u32 {
        self.counts
            .get(&(electorate_code, group_index))
            .cloned()
            .unwrap_or(0)
    }

    /// Checks that the layout of an electorate agrees with the listing.
    pub fn check_layout(&self, layout: &ElectorateLayout) -> ExportResult<()> {
        for (group_index, &layout_count) in layout.group_candidate_counts().iter().enumerate() {
            let group_index = group_index as u32;
            let listed_count = self.get(layout.code(), group_index);
            if listed_count != layout_count {
                return GroupCountMismatchSnafu {
                    electorate: layout.name(),
                    group_index,
                    layout_count,
                    listed_count,
                }
                .fail();
            }
        }
        Ok(())
    }
}

/// The rotations already read from the store, per electorate code and paper
/// version.
#[derive(Debug, Default)]
pub struct RotationCache {
    rotations: HashMap<(u32, u32), Rotation>,
}

impl RotationCache {
    pub fn num_cached(&self) -> usize {
        self.rotations.len()
    }

    fn get_or_fetch<S: BallotStore>(
        &mut self,
        store: &S,
        layout: &ElectorateLayout,
        vote: &ConfirmedVoteRow,
    ) -> ExportResult<&Rotation> {
        match self.rotations.entry((layout.code(), vote.paper_version)) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let text = store
                    .rotation(layout.seat_count(), vote.paper_version)?
                    .context(MissingRotationSnafu {
                        electorate: layout.name(),
                        seat_count: layout.seat_count(),
                        paper_version: vote.paper_version,
                        batch_number: vote.batch_number,
                        vote_id: vote.vote_id,
                    })?;
                let rotation =
                    Rotation::parse(&text, layout.seat_count()).context(InvalidRotationSnafu {
                        electorate: layout.name(),
                        paper_version: vote.paper_version,
                    })?;
                debug!(
                    "get_or_fetch: electorate {} paper version {}: {:?}",
                    layout.code(),
                    vote.paper_version,
                    rotation.positions()
                );
                Ok(e.insert(rotation))
            }
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ExportSummary {
    pub electorates: usize,
    pub electorates_without_votes: usize,
    pub formal_votes: usize,
    pub informal_votes: usize,
    pub preferences: usize,
}

/// The state shared by the export of all the electorates of a run.
#[derive(Debug, Default)]
pub struct ExportContext {
    pub group_counts: GroupCandidateCounts,
    pub rotations: RotationCache,
    pub summary: ExportSummary,
}

/// Reads the layout of every electorate.
pub fn load_layouts<S: BallotStore>(
    store: &S,
    max_seat_count: u32,
) -> ExportResult<Vec<ElectorateLayout>> {
    let mut res: Vec<ElectorateLayout> = Vec::new();
    for e in store.electorates()? {
        let group_counts = store.group_candidate_counts(e.code)?;
        let splits = store.column_splits(e.code)?;
        let layout = LayoutBuilder::new(e.code, &e.name, e.seat_count)
            .max_seat_count(max_seat_count)
            .group_counts(&group_counts)
            .splits(&splits)
            .build()
            .context(LayoutSnafu {
                electorate: e.name.clone(),
            })?;
        debug!(
            "load_layouts: {} -> columns {:?}",
            e.name,
            layout.physical_columns()
        );
        res.push(layout);
    }
    Ok(res)
}

/// Decodes a confirmed vote and computes the screen index of its preferences.
pub fn translate_vote<S: BallotStore>(
    store: &S,
    layout: &ElectorateLayout,
    vote: &ConfirmedVoteRow,
    rotations: &mut RotationCache,
) -> ExportResult<VoteRecord> {
    ensure!(
        vote.electorate_code == layout.code(),
        ElectorateMismatchSnafu {
            electorate: layout.name(),
            vote_electorate_code: vote.electorate_code,
            batch_number: vote.batch_number,
            vote_id: vote.vote_id,
        }
    );
    let mut preferences =
        unpack_preferences(&vote.preference_list).context(MalformedPreferencesSnafu {
            electorate: layout.name(),
            preference_list: vote.preference_list.clone(),
            batch_number: vote.batch_number,
            vote_id: vote.vote_id,
        })?;

    // Version 0 papers were printed without rotation.
    let rotation = if vote.paper_version > 0 {
        Some(rotations.get_or_fetch(store, layout, vote)?)
    } else {
        None
    };
    translate_preferences(layout, &mut preferences, rotation).context(TranslationSnafu {
        electorate: layout.name(),
        batch_number: vote.batch_number,
        vote_id: vote.vote_id,
    })?;

    Ok(VoteRecord {
        batch_number: vote.batch_number,
        electorate_code: vote.electorate_code,
        polling_place_code: vote.polling_place_code,
        paper_version: vote.paper_version,
        vote_id: vote.vote_id,
        preferences,
    })
}

/// Exports the confirmed votes of one electorate.
///
/// The electorate files are only created when the electorate has votes.
pub fn export_electorate<S: BallotStore, K: ExportSink>(
    store: &S,
    sink: &mut K,
    layout: &ElectorateLayout,
    ctx: &mut ExportContext,
) -> ExportResult<()> {
    info!("Retrieving confirmed votes for {}", layout.name());
    let votes = store.confirmed_votes(layout)?;
    info!("Found {} confirmed votes", votes.len());
    if votes.is_empty() {
        warn!("No confirmed votes in database for {}", layout.name());
        ctx.summary.electorates_without_votes += 1;
        return Ok(());
    }

    let mut out = sink.open_electorate(layout)?;
    for vote in votes.iter() {
        let record = translate_vote(store, layout, vote, &mut ctx.rotations)?;
        debug!("export_electorate: {:?}", record);
        if record.preferences.is_informal() {
            out.write_informal(&InformalVoteRecord {
                batch_number: record.batch_number,
                vote_id: record.vote_id,
            })?;
            ctx.summary.informal_votes += 1;
        } else {
            for pref in record.preferences.iter() {
                out.write_formal(&FormalPreferenceRecord::new(&record, pref))?;
            }
            ctx.summary.formal_votes += 1;
            ctx.summary.preferences += record.preferences.len();
        }
        sink.write_paper_version(&PaperVersionRecord {
            batch_number: record.batch_number,
            vote_id: record.vote_id,
            electorate_code: record.electorate_code,
            polling_place_code: record.polling_place_code,
            paper_version: record.paper_version,
        })?;
    }
    out.finish()?;
    info!("Retrieving confirmed votes for {}...Done", layout.name());
    Ok(())
}

/// Runs the export of all the electorates, in electorate code order.
pub fn run_export<S: BallotStore, K: ExportSink>(
    store: &S,
    sink: &mut K,
    max_seat_count: u32,
) -> ExportResult<ExportSummary> {
    let layouts = load_layouts(store, max_seat_count)?;
    info!("Found {} electorates", layouts.len());

    let groups = store.groups()?;
    sink.write_groups(&groups)?;

    let candidates = store.candidates()?;
    sink.write_candidates(&candidates)?;
    let mut ctx = ExportContext::default();
    for c in candidates.iter() {
        ctx.group_counts.record(c);
    }
    for layout in layouts.iter() {
        ctx.group_counts.check_layout(layout)?;
    }

    for layout in layouts.iter() {
        export_electorate(store, sink, layout, &mut ctx)?;
        ctx.summary.electorates += 1;
    }
    sink.finish()?;

    info!(
        "Exported {} electorates ({} without votes): {} formal votes, {} informal votes, {} preferences, {} rotations",
        ctx.summary.electorates,
        ctx.summary.electorates_without_votes,
        ctx.summary.formal_votes,
        ctx.summary.informal_votes,
        ctx.summary.preferences,
        ctx.rotations.num_cached()
    );
    Ok(ctx.summary)
}

/// Runs a complete export from the command line arguments: database to CSV
/// files, then the optional comparison with a reference directory.
pub fn run_export_job(args: &Args) -> ExportResult<ExportSummary> {
    let config = match args.config.as_ref() {
        Some(path) => Some(read_config(path)?),
        None => None,
    };
    let settings = resolve_settings(config.as_ref(), args)?;
    info!("settings: {:?}", settings);

    let store = SqliteStore::open(&settings.database_path)?;
    let mut sink = CsvSink::create(&settings)?;
    let summary = run_export(&store, &mut sink, settings.max_seat_count)?;

    if let Some(reference_dir) = settings.reference_directory.as_ref() {
        reference::check_against_reference(sink.written_files(), reference_dir)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::io_sqlite::test_data::*;

    #[derive(Default)]
    struct RecordingElectorate {
        formal: Vec<FormalPreferenceRecord>,
        informal: Vec<InformalVoteRecord>,
        finished: Option<std::rc::Rc<std::cell::RefCell<Vec<RecordingElectorate>>>>,
    }

    impl ElectorateSink for RecordingElectorate {
        fn write_formal(&mut self, record: &FormalPreferenceRecord) -> ExportResult<()> {
            self.formal.push(record.clone());
            Ok(())
        }

        fn write_informal(&mut self, record: &InformalVoteRecord) -> ExportResult<()> {
            self.informal.push(record.clone());
            Ok(())
        }

        fn finish(mut self) -> ExportResult<()> {
            if let Some(done) = self.finished.take() {
                done.borrow_mut().push(self);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        groups: Vec<GroupRow>,
        candidates: Vec<CandidateRow>,
        paper_versions: Vec<PaperVersionRecord>,
        opened: Vec<u32>,
        electorates: std::rc::Rc<std::cell::RefCell<Vec<RecordingElectorate>>>,
        finished: bool,
    }

    impl ExportSink for RecordingSink {
        type Electorate = RecordingElectorate;

        fn write_groups(&mut self, rows: &[GroupRow]) -> ExportResult<()> {
            self.groups.extend_from_slice(rows);
            Ok(())
        }

        fn write_candidates(&mut self, rows: &[CandidateRow]) -> ExportResult<()> {
            self.candidates.extend_from_slice(rows);
            Ok(())
        }

        fn write_paper_version(&mut self, record: &PaperVersionRecord) -> ExportResult<()> {
            self.paper_versions.push(record.clone());
            Ok(())
        }

        fn open_electorate(&mut self, layout: &ElectorateLayout) -> ExportResult<RecordingElectorate> {
            self.opened.push(layout.code());
            Ok(RecordingElectorate {
                finished: Some(self.electorates.clone()),
                ..Default::default()
            })
        }

        fn finish(&mut self) -> ExportResult<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn screen_indices(e: &RecordingElectorate) -> Vec<(u32, u32, u32, i64)> {
        e.formal
            .iter()
            .map(|r| {
                (
                    r.preference_number,
                    r.group_index,
                    r.db_candidate_index,
                    r.screen_candidate_index,
                )
            })
            .collect()
    }

    #[test]
    fn export_sample_database() {
        let _ = env_logger::try_init();
        let store = sample_store();
        let mut sink = RecordingSink::default();
        let summary = run_export(&store, &mut sink, 99).unwrap();

        assert_eq!(
            summary,
            ExportSummary {
                electorates: 2,
                electorates_without_votes: 1,
                formal_votes: 2,
                informal_votes: 1,
                preferences: 4,
            }
        );
        assert!(sink.finished);
        assert_eq!(sink.groups.len(), 3);
        assert_eq!(sink.candidates.len(), 7);
        // Molonglo has no votes: no electorate files.
        assert_eq!(sink.opened, vec![1]);
        assert_eq!(sink.paper_versions.len(), 3);

        let electorates = sink.electorates.borrow();
        assert_eq!(electorates.len(), 1);
        let brindabella = &electorates[0];
        // Vote 1 uses rotation [2, 0, 4, 1, 3]. Vote 2 has no rotation.
        assert_eq!(
            screen_indices(brindabella),
            vec![(1, 0, 2, 0), (2, 1, 1, 1), (1, 0, 0, -1), (2, 0, 1, -1)]
        );
        assert_eq!(
            brindabella.informal,
            vec![InformalVoteRecord {
                batch_number: 11,
                vote_id: 3
            }]
        );
    }

    #[test]
    fn paper_version_records_follow_vote_order() {
        let store = sample_store();
        let mut sink = RecordingSink::default();
        run_export(&store, &mut sink, 99).unwrap();
        let ids: Vec<(u32, u32, u32)> = sink
            .paper_versions
            .iter()
            .map(|r| (r.vote_id, r.batch_number, r.paper_version))
            .collect();
        assert_eq!(ids, vec![(1, 10, 1), (2, 10, 0), (3, 11, 1)]);
        assert_eq!(sink.paper_versions[2].polling_place_code, 5);
    }

    #[test]
    fn rotations_are_read_once_per_version() {
        let store = sample_store();
        insert_vote(&store, "Brindabella", 4, 10, 1, "010002");
        let layouts = load_layouts(&store, 99).unwrap();
        let mut ctx = ExportContext::default();
        let mut sink = RecordingSink::default();
        export_electorate(&store, &mut sink, &layouts[0], &mut ctx).unwrap();
        assert_eq!(ctx.rotations.num_cached(), 1);
        assert_eq!(ctx.summary.formal_votes, 3);
    }

    #[test]
    fn missing_rotation_is_fatal() {
        let store = sample_store();
        insert_vote(&store, "Brindabella", 4, 10, 7, "010002");
        let mut sink = RecordingSink::default();
        let res = run_export(&store, &mut sink, 99);
        assert!(matches!(
            res,
            Err(ExportError::MissingRotation {
                paper_version: 7,
                vote_id: 4,
                ..
            })
        ));
    }

    #[test]
    fn corrupt_rotation_is_fatal() {
        let store = sample_store();
        insert_rotation(&store, 5, 3, "{0,0,1,2,3}");
        insert_vote(&store, "Brindabella", 4, 10, 3, "010002");
        let mut sink = RecordingSink::default();
        let res = run_export(&store, &mut sink, 99);
        assert!(matches!(
            res,
            Err(ExportError::InvalidRotation {
                paper_version: 3,
                source: RotationError::DuplicateSlot {
                    position: 1,
                    slot: 0
                },
                ..
            })
        ));
    }

    #[test]
    fn split_group_through_the_database() {
        let store = sample_store();
        // Group 0 of Brindabella: a column of 2, then the remaining candidate.
        insert_split(
            &store,
            1,
            ColumnSplit {
                group_index: 0,
                physical_column_index: 0,
                candidate_count: 2,
            },
        );
        insert_vote(&store, "Brindabella", 4, 10, 1, "010002020001030000");

        let layouts = load_layouts(&store, 99).unwrap();
        assert_eq!(layouts[0].physical_columns(), &[2, 1, 2]);

        let mut sink = RecordingSink::default();
        run_export(&store, &mut sink, 99).unwrap();
        let electorates = sink.electorates.borrow();
        let records: Vec<(u32, u32, i64)> = electorates[0]
            .formal
            .iter()
            .filter(|r| r.vote_id == 4)
            .map(|r| (r.group_index, r.db_candidate_index, r.screen_candidate_index))
            .collect();
        // Rotation [2, 0, 4, 1, 3]: candidates 0 and 1 keep their place in the
        // first column, candidate 2 is alone in the second column.
        assert_eq!(records, vec![(0, 2, 2), (0, 1, 1), (0, 0, 0)]);
    }

    #[test]
    fn malformed_preferences_are_fatal() {
        let store = sample_store();
        insert_vote(&store, "Brindabella", 4, 10, 1, "0100020");
        let mut sink = RecordingSink::default();
        let res = run_export(&store, &mut sink, 99);
        assert!(matches!(
            res,
            Err(ExportError::MalformedPreferences { vote_id: 4, .. })
        ));
    }

    #[test]
    fn vote_from_another_electorate_is_fatal() {
        let store = sample_store();
        // Batch 20 belongs to Molonglo.
        insert_vote(&store, "Brindabella", 4, 20, 0, "010002");
        let mut sink = RecordingSink::default();
        let res = run_export(&store, &mut sink, 99);
        assert!(matches!(
            res,
            Err(ExportError::ElectorateMismatch {
                vote_electorate_code: 2,
                batch_number: 20,
                ..
            })
        ));
    }

    #[test]
    fn unknown_candidate_is_fatal() {
        let store = sample_store();
        insert_vote(&store, "Brindabella", 4, 10, 1, "010005");
        let mut sink = RecordingSink::default();
        let res = run_export(&store, &mut sink, 99);
        assert!(matches!(
            res,
            Err(ExportError::Translation { vote_id: 4, .. })
        ));
    }

    #[test]
    fn group_counts_are_checked_against_layouts() {
        let layout = LayoutBuilder::new(1, "Brindabella", 5)
            .group_counts(&[(0, 2)])
            .build()
            .unwrap();
        let mut counts = GroupCandidateCounts::default();
        for idx in 0..3 {
            counts.record(&CandidateRow {
                electorate_code: 1,
                group_index: 0,
                candidate_index: idx,
                name: format!("Candidate {}", idx),
            });
        }
        assert_eq!(counts.get(1, 0), 3);
        assert!(matches!(
            counts.check_layout(&layout),
            Err(ExportError::GroupCountMismatch {
                layout_count: 2,
                listed_count: 3,
                ..
            })
        ));
    }
}
