// Writing the exported records as CSV files.

use std::fs::{self, File};
use std::path::PathBuf;

use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use log::{debug, info};
use serde::Serialize;
use snafu::prelude::*;

use ballot_rotation::ElectorateLayout;

use crate::export::config_reader::ExportSettings;
use crate::export::io_common::*;
use crate::export::*;

/// A CSV file with a header row and CRLF line endings.
pub struct CsvFile {
    path: PathBuf,
    writer: Writer<File>,
}

impl CsvFile {
    pub fn create(path: PathBuf, header: &[&str], quote_all: bool) -> ExportResult<CsvFile> {
        let path_s = path.display().to_string();
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::CRLF)
            .quote_style(if quote_all {
                QuoteStyle::Always
            } else {
                QuoteStyle::Necessary
            })
            .from_path(&path)
            .context(WritingCsvSnafu { path: &path_s })?;
        writer
            .write_record(header)
            .context(WritingCsvSnafu { path: &path_s })?;
        debug!("create: {}", path_s);
        Ok(CsvFile { path, writer })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> ExportResult<()> {
        self.writer
            .serialize(record)
            .context(WritingCsvSnafu {
                path: self.path.display().to_string(),
            })
    }

    pub fn close(mut self) -> ExportResult<PathBuf> {
        self.writer.flush().context(FlushingCsvSnafu {
            path: self.path.display().to_string(),
        })?;
        Ok(self.path)
    }
}

/// The files of one electorate: `<name>_formal_confirmed.csv` and
/// `<name>_informal_confirmed.csv`.
pub struct CsvElectorateSink {
    formal: CsvFile,
    informal: CsvFile,
}

impl ElectorateSink for CsvElectorateSink {
    fn write_formal(&mut self, record: &FormalPreferenceRecord) -> ExportResult<()> {
        self.formal.write(record)
    }

    fn write_informal(&mut self, record: &InformalVoteRecord) -> ExportResult<()> {
        self.informal.write(record)
    }

    fn finish(self) -> ExportResult<()> {
        self.formal.close()?;
        self.informal.close()?;
        Ok(())
    }
}

pub struct CsvSink {
    output_directory: PathBuf,
    groups_file: String,
    candidates_file: String,
    paper_versions: Option<CsvFile>,
    written: Vec<PathBuf>,
}

pub fn formal_file_name(layout: &ElectorateLayout) -> String {
    format!("{}_formal_confirmed.csv", layout.normalized_name())
}

pub fn informal_file_name(layout: &ElectorateLayout) -> String {
    format!("{}_informal_confirmed.csv", layout.normalized_name())
}

impl CsvSink {
    /// Creates the output directory and the paper version file.
    pub fn create(settings: &ExportSettings) -> ExportResult<CsvSink> {
        let dir = settings.output_directory.clone();
        fs::create_dir_all(&dir).context(CreatingOutputDirSnafu {
            path: dir.display().to_string(),
        })?;
        info!("Writing the export to {}", dir.display());
        let paper_versions = CsvFile::create(
            dir.join(&settings.paper_versions_file),
            &PAPER_VERSION_HEADER,
            false,
        )?;
        Ok(CsvSink {
            output_directory: dir,
            groups_file: settings.groups_file.clone(),
            candidates_file: settings.candidates_file.clone(),
            paper_versions: Some(paper_versions),
            written: Vec::new(),
        })
    }

    /// The files created so far.
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_listing<T: Serialize>(
        &mut self,
        file_name: &str,
        header: &[&str],
        rows: &[T],
    ) -> ExportResult<()> {
        let mut f = CsvFile::create(self.output_directory.join(file_name), header, true)?;
        for row in rows.iter() {
            f.write(row)?;
        }
        self.written.push(f.close()?);
        Ok(())
    }
}

impl ExportSink for CsvSink {
    type Electorate = CsvElectorateSink;

    fn write_groups(&mut self, rows: &[GroupRow]) -> ExportResult<()> {
        let file_name = self.groups_file.clone();
        self.write_listing(&file_name, &GROUP_HEADER, rows)
    }

    fn write_candidates(&mut self, rows: &[CandidateRow]) -> ExportResult<()> {
        let file_name = self.candidates_file.clone();
        self.write_listing(&file_name, &CANDIDATE_HEADER, rows)
    }

    fn write_paper_version(&mut self, record: &PaperVersionRecord) -> ExportResult<()> {
        match self.paper_versions.as_mut() {
            Some(f) => f.write(record),
            None => {
                whatever!("Paper version written after the end of the export")
            }
        }
    }

    fn open_electorate(&mut self, layout: &ElectorateLayout) -> ExportResult<CsvElectorateSink> {
        let formal_path = self.output_directory.join(formal_file_name(layout));
        let informal_path = self.output_directory.join(informal_file_name(layout));
        // Listed now: the reference check also covers partially written files.
        self.written.push(formal_path.clone());
        self.written.push(informal_path.clone());
        Ok(CsvElectorateSink {
            formal: CsvFile::create(formal_path, &FORMAL_HEADER, false)?,
            informal: CsvFile::create(informal_path, &INFORMAL_HEADER, false)?,
        })
    }

    fn finish(&mut self) -> ExportResult<()> {
        if let Some(f) = self.paper_versions.take() {
            self.written.push(f.close()?);
        }
        Ok(())
    }
}
