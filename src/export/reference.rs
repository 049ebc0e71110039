// Comparing an export with the files of a previous run.

use log::{info, warn};
use snafu::prelude::*;
use text_diff::print_diff;

use std::fs;
use std::path::{Path, PathBuf};

use crate::export::*;

/// Checks every produced file against the file with the same name in the
/// reference directory. The differences are printed, and any difference
/// fails the run.
pub fn check_against_reference(produced: &[PathBuf], reference_dir: &Path) -> ExportResult<()> {
    let mut differing: Vec<String> = Vec::new();
    for path in produced.iter() {
        let file_name = match path.file_name() {
            Some(n) => n,
            None => {
                whatever!("Not a file: {}", path.display())
            }
        };
        let reference_path = reference_dir.join(file_name);
        let reference = fs::read_to_string(&reference_path).context(OpeningReferenceSnafu {
            path: reference_path.display().to_string(),
        })?;
        let output = fs::read_to_string(path).context(OpeningReferenceSnafu {
            path: path.display().to_string(),
        })?;
        if reference != output {
            warn!(
                "Found differences with the reference file {}",
                reference_path.display()
            );
            print_diff(reference.as_str(), output.as_str(), "\n");
            differing.push(file_name.to_string_lossy().to_string());
        }
    }
    if !differing.is_empty() {
        whatever!(
            "Difference detected between the export and the reference: {}",
            differing.join(", ")
        )
    }
    info!(
        "{} files identical to the reference in {}",
        produced.len(),
        reference_dir.display()
    );
    Ok(())
}
