pub use crate::config::*;

use log::debug;

/// The largest rotation handled by default. Candidate indices are stored on
/// two digits in the preference lists.
pub const DEFAULT_MAX_SEAT_COUNT: u32 = 99;

/// A builder for the layout of an electorate.
///
/// ```
/// use ballot_rotation::builder::LayoutBuilder;
/// use ballot_rotation::ColumnSplit;
/// # use ballot_rotation::LayoutError;
///
/// // Group 0 has 7 candidates printed over two columns of 5 and 2.
/// let layout = LayoutBuilder::new(1, "Brindabella", 7)
///     .group_counts(&[(0, 7), (1, 3)])
///     .splits(&[ColumnSplit {
///         group_index: 0,
///         physical_column_index: 0,
///         candidate_count: 5,
///     }])
///     .build()?;
///
/// assert_eq!(layout.physical_columns(), &[5, 2, 3]);
/// # Ok::<(), LayoutError>(())
/// ```
pub struct LayoutBuilder {
    pub(crate) _code: u32,
    pub(crate) _name: String,
    pub(crate) _seat_count: u32,
    pub(crate) _max_seat_count: u32,
    pub(crate) _group_counts: Vec<(u32, u32)>,
    pub(crate) _splits: Vec<ColumnSplit>,
}

impl LayoutBuilder {
    pub fn new(code: u32, name: &str, seat_count: u32) -> LayoutBuilder {
        LayoutBuilder {
            _code: code,
            _name: name.to_string(),
            _seat_count: seat_count,
            _max_seat_count: DEFAULT_MAX_SEAT_COUNT,
            _group_counts: Vec::new(),
            _splits: Vec::new(),
        }
    }

    pub fn max_seat_count(self, max_seat_count: u32) -> LayoutBuilder {
        LayoutBuilder {
            _max_seat_count: max_seat_count,
            ..self
        }
    }

    /// The `(group_index, candidate_count)` rows of the electorate, in any
    /// order.
    pub fn group_counts(self, counts: &[(u32, u32)]) -> LayoutBuilder {
        LayoutBuilder {
            _group_counts: counts.to_vec(),
            ..self
        }
    }

    /// The column splits, ordered by group then by column within the group.
    pub fn splits(self, splits: &[ColumnSplit]) -> LayoutBuilder {
        LayoutBuilder {
            _splits: splits.to_vec(),
            ..self
        }
    }

    pub fn build(self) -> Result<ElectorateLayout, LayoutError> {
        let electorate_code = self._code;
        if self._seat_count == 0 || self._seat_count > self._max_seat_count {
            return Err(LayoutError::SeatCountOutOfRange {
                electorate_code,
                seat_count: self._seat_count,
                max_seat_count: self._max_seat_count,
            });
        }

        let group_candidate_counts = dense_group_counts(electorate_code, &self._group_counts)?;
        check_split_order(electorate_code, &self._splits, group_candidate_counts.len())?;

        let mut physical_columns: Vec<u32> = Vec::new();
        let mut group_to_first_column: Vec<usize> = Vec::new();
        let mut splits = self._splits.iter().peekable();
        for (group_index, &total) in group_candidate_counts.iter().enumerate() {
            let group_index = group_index as u32;
            group_to_first_column.push(physical_columns.len());
            let mut remaining = total;
            while let Some(split) = splits.next_if(|s| s.group_index == group_index) {
                if split.candidate_count == 0 {
                    return Err(LayoutError::EmptySplitColumn {
                        electorate_code,
                        group_index,
                        physical_column_index: split.physical_column_index,
                    });
                }
                if split.candidate_count >= remaining {
                    return Err(LayoutError::SplitExceedsGroup {
                        electorate_code,
                        group_index,
                        allocated: total - remaining + split.candidate_count,
                        group_candidates: total,
                    });
                }
                physical_columns.push(split.candidate_count);
                remaining -= split.candidate_count;
            }
            // The last column of a group is not in the split table: it gets
            // whatever the split columns left.
            physical_columns.push(remaining);
        }
        group_to_first_column.push(physical_columns.len());

        for (physical_column, &candidates) in physical_columns.iter().enumerate() {
            if candidates > self._seat_count {
                return Err(LayoutError::ColumnLargerThanSeats {
                    electorate_code,
                    physical_column,
                    candidates,
                    seat_count: self._seat_count,
                });
            }
        }

        debug!(
            "build: electorate {} ({}): group counts {:?} physical columns {:?}",
            electorate_code, self._name, group_candidate_counts, physical_columns
        );

        Ok(ElectorateLayout {
            code: electorate_code,
            name: self._name,
            seat_count: self._seat_count,
            group_candidate_counts,
            physical_columns,
            group_to_first_column,
        })
    }
}

// The rows must cover the groups 0..n exactly once, each with at least one candidate.
fn dense_group_counts(electorate_code: u32, rows: &[(u32, u32)]) -> Result<Vec<u32>, LayoutError> {
    if rows.is_empty() {
        return Err(LayoutError::NoGroups { electorate_code });
    }
    let mut sorted = rows.to_vec();
    sorted.sort_by_key(|(group_index, _)| *group_index);
    let mut res: Vec<u32> = Vec::with_capacity(sorted.len());
    for (expected, (group_index, count)) in sorted.into_iter().enumerate() {
        if group_index as usize != expected {
            return Err(LayoutError::MissingGroup {
                electorate_code,
                group_index: expected as u32,
            });
        }
        if count == 0 {
            return Err(LayoutError::EmptyGroup {
                electorate_code,
                group_index,
            });
        }
        res.push(count);
    }
    Ok(res)
}

fn check_split_order(
    electorate_code: u32,
    splits: &[ColumnSplit],
    num_groups: usize,
) -> Result<(), LayoutError> {
    for split in splits.iter() {
        if split.group_index as usize >= num_groups {
            return Err(LayoutError::SplitForUnknownGroup {
                electorate_code,
                group_index: split.group_index,
            });
        }
    }
    for pair in splits.windows(2) {
        let previous = (pair[0].group_index, pair[0].physical_column_index);
        let current = (pair[1].group_index, pair[1].physical_column_index);
        if current <= previous {
            return Err(LayoutError::SplitsOutOfOrder {
                electorate_code,
                group_index: pair[1].group_index,
                physical_column_index: pair[1].physical_column_index,
            });
        }
    }
    Ok(())
}
