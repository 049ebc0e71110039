// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::ops::Range;

/// One row of the column split table.
///
/// A group with too many candidates for one ballot column is printed over
/// several physical columns. Each split row gives the size of one of the
/// columns of that group; the last column of the group is never listed and
/// receives the remaining candidates.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ColumnSplit {
    pub group_index: u32,
    /// The index of the column within the group, only used for ordering.
    pub physical_column_index: u32,
    pub candidate_count: u32,
}

/// The static description of one electorate: its groups and how they are
/// laid out on the physical columns of the ballot.
///
/// Built with [`crate::builder::LayoutBuilder`], immutable afterwards.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectorateLayout {
    pub(crate) code: u32,
    pub(crate) name: String,
    pub(crate) seat_count: u32,
    // Indexed by group index.
    pub(crate) group_candidate_counts: Vec<u32>,
    // Indexed by physical column.
    pub(crate) physical_columns: Vec<u32>,
    // Length is num_groups + 1. The last entry is a sentinel equal to
    // physical_columns.len().
    pub(crate) group_to_first_column: Vec<usize>,
}

impl ElectorateLayout {
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the electorate in a form usable in table and file names.
    pub fn normalized_name(&self) -> String {
        normalize_electorate_name(&self.name)
    }

    /// The size of a rotation for this electorate.
    pub fn seat_count(&self) -> u32 {
        self.seat_count
    }

    pub fn num_groups(&self) -> usize {
        self.group_candidate_counts.len()
    }

    pub fn num_physical_columns(&self) -> usize {
        self.physical_columns.len()
    }

    /// Total number of candidates in a group, across all its columns.
    pub fn group_candidate_count(&self, group_index: u32) -> Option<u32> {
        self.group_candidate_counts.get(group_index as usize).cloned()
    }

    pub fn group_candidate_counts(&self) -> &[u32] {
        &self.group_candidate_counts
    }

    /// The number of candidates in each physical column, in ballot order.
    pub fn physical_columns(&self) -> &[u32] {
        &self.physical_columns
    }

    /// The physical columns occupied by a group. Columns of a group are
    /// always contiguous.
    pub fn group_columns(&self, group_index: u32) -> Option<Range<usize>> {
        let g = group_index as usize;
        if g >= self.num_groups() {
            return None;
        }
        Some(self.group_to_first_column[g]..self.group_to_first_column[g + 1])
    }
}

/// Replaces every character that is not an ASCII letter or digit with `_`.
///
/// Electorate names may contain spaces, hyphens and apostrophes, but they are
/// embedded in database table names and output file names.
pub fn normalize_electorate_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// A Robson rotation: `positions[p]` is the database candidate slot shown at
/// rotated position `p` of a column, before collapsing to the size of the
/// column.
///
/// Invariant: the positions are a permutation of `0..seat_count`.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Rotation {
    positions: Vec<u32>,
}

impl Rotation {
    pub fn new(positions: Vec<u32>, seat_count: u32) -> Result<Rotation, RotationError> {
        if positions.len() != seat_count as usize {
            return Err(RotationError::WrongLength {
                expected: seat_count,
                found: positions.len(),
            });
        }
        let mut seen = vec![false; positions.len()];
        for (position, &slot) in positions.iter().enumerate() {
            match seen.get_mut(slot as usize) {
                None => {
                    return Err(RotationError::SlotOutOfRange {
                        position,
                        slot,
                        seat_count,
                    })
                }
                Some(true) => return Err(RotationError::DuplicateSlot { position, slot }),
                Some(s) => *s = true,
            }
        }
        Ok(Rotation { positions })
    }

    /// Parses the textual form stored in the database, `{n,n,...,n}`.
    /// The braces are optional and whitespace around numbers is ignored.
    pub fn parse(text: &str, seat_count: u32) -> Result<Rotation, RotationError> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed);
        let mut positions: Vec<u32> = Vec::new();
        if !inner.trim().is_empty() {
            for item in inner.split(',') {
                let slot = item
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| RotationError::Malformed {
                        text: text.to_string(),
                    })?;
                positions.push(slot);
            }
        }
        Rotation::new(positions, seat_count)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }
}

/// One preference of a confirmed paper.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct Preference {
    pub preference_number: u32,
    pub group_index: u32,
    pub db_candidate_index: u32,
    /// Filled in by the translation. `None` when the paper carries no
    /// rotation (paper version 0).
    pub screen_candidate_index: Option<u32>,
}

impl Preference {
    pub fn new(preference_number: u32, group_index: u32, db_candidate_index: u32) -> Preference {
        Preference {
            preference_number,
            group_index,
            db_candidate_index,
            screen_candidate_index: None,
        }
    }
}

/// The preferences of one paper, ordered by preference number.
///
/// Invariant: the preference numbers are exactly `1..=len()`.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PreferenceSet {
    preferences: Vec<Preference>,
}

impl PreferenceSet {
    /// Places the preferences at the slot given by their preference number.
    /// The input may be in any order but must hold every number from 1 to
    /// its length exactly once.
    pub fn new(unordered: Vec<Preference>) -> Result<PreferenceSet, PreferenceError> {
        let num_preferences = unordered.len();
        let mut slots: Vec<Option<Preference>> = vec![None; num_preferences];
        for (field, pref) in unordered.into_iter().enumerate() {
            if pref.preference_number == 0 {
                return Err(PreferenceError::ZeroPreferenceNumber { field });
            }
            let slot = slots
                .get_mut(pref.preference_number as usize - 1)
                .ok_or(PreferenceError::PreferenceNumberOutOfRange {
                    preference_number: pref.preference_number,
                    num_preferences,
                })?;
            if slot.is_some() {
                return Err(PreferenceError::DuplicatePreferenceNumber {
                    preference_number: pref.preference_number,
                });
            }
            *slot = Some(pref);
        }
        // With no duplicates and no value out of range, every slot is filled.
        let preferences: Vec<Preference> = slots.into_iter().flatten().collect();
        assert_eq!(preferences.len(), num_preferences);
        Ok(PreferenceSet { preferences })
    }

    pub fn len(&self) -> usize {
        self.preferences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty()
    }

    /// A paper without any preference is informal.
    pub fn is_informal(&self) -> bool {
        self.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Preference> {
        self.preferences.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Preference> {
        self.preferences.iter_mut()
    }

    pub fn as_slice(&self) -> &[Preference] {
        &self.preferences
    }
}

// ******** Errors *********

/// Errors found while building the layout of an electorate.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LayoutError {
    NoGroups {
        electorate_code: u32,
    },
    SeatCountOutOfRange {
        electorate_code: u32,
        seat_count: u32,
        max_seat_count: u32,
    },
    /// The group indices are not exactly 0..num_groups.
    MissingGroup {
        electorate_code: u32,
        group_index: u32,
    },
    EmptyGroup {
        electorate_code: u32,
        group_index: u32,
    },
    SplitForUnknownGroup {
        electorate_code: u32,
        group_index: u32,
    },
    SplitsOutOfOrder {
        electorate_code: u32,
        group_index: u32,
        physical_column_index: u32,
    },
    EmptySplitColumn {
        electorate_code: u32,
        group_index: u32,
        physical_column_index: u32,
    },
    /// The split columns leave no candidate for the last column of the group.
    SplitExceedsGroup {
        electorate_code: u32,
        group_index: u32,
        allocated: u32,
        group_candidates: u32,
    },
    ColumnLargerThanSeats {
        electorate_code: u32,
        physical_column: usize,
        candidates: u32,
        seat_count: u32,
    },
}

impl Error for LayoutError {}

impl Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::NoGroups { electorate_code } => {
                write!(f, "no groups found for electorate {}", electorate_code)
            }
            LayoutError::SeatCountOutOfRange {
                electorate_code,
                seat_count,
                max_seat_count,
            } => write!(
                f,
                "electorate {}: seat count {} is not within 1..={}",
                electorate_code, seat_count, max_seat_count
            ),
            LayoutError::MissingGroup {
                electorate_code,
                group_index,
            } => write!(
                f,
                "electorate {}: group indices are not contiguous, expected group {}",
                electorate_code, group_index
            ),
            LayoutError::EmptyGroup {
                electorate_code,
                group_index,
            } => write!(
                f,
                "electorate {}: group {} has no candidates",
                electorate_code, group_index
            ),
            LayoutError::SplitForUnknownGroup {
                electorate_code,
                group_index,
            } => write!(
                f,
                "electorate {}: column split refers to unknown group {}",
                electorate_code, group_index
            ),
            LayoutError::SplitsOutOfOrder {
                electorate_code,
                group_index,
                physical_column_index,
            } => write!(
                f,
                "electorate {}: column split ({}, {}) is out of order",
                electorate_code, group_index, physical_column_index
            ),
            LayoutError::EmptySplitColumn {
                electorate_code,
                group_index,
                physical_column_index,
            } => write!(
                f,
                "electorate {}: column {} of group {} has no candidates",
                electorate_code, physical_column_index, group_index
            ),
            LayoutError::SplitExceedsGroup {
                electorate_code,
                group_index,
                allocated,
                group_candidates,
            } => write!(
                f,
                "electorate {}: splits of group {} allocate {} of its {} candidates, leaving none for the last column",
                electorate_code, group_index, allocated, group_candidates
            ),
            LayoutError::ColumnLargerThanSeats {
                electorate_code,
                physical_column,
                candidates,
                seat_count,
            } => write!(
                f,
                "electorate {}: physical column {} has {} candidates but the rotation size is {}",
                electorate_code, physical_column, candidates, seat_count
            ),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RotationError {
    Malformed {
        text: String,
    },
    WrongLength {
        expected: u32,
        found: usize,
    },
    SlotOutOfRange {
        position: usize,
        slot: u32,
        seat_count: u32,
    },
    DuplicateSlot {
        position: usize,
        slot: u32,
    },
}

impl Error for RotationError {}

impl Display for RotationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationError::Malformed { text } => write!(f, "malformed rotation '{}'", text),
            RotationError::WrongLength { expected, found } => write!(
                f,
                "rotation has {} positions, expected {}",
                found, expected
            ),
            RotationError::SlotOutOfRange {
                position,
                slot,
                seat_count,
            } => write!(
                f,
                "rotation position {} holds slot {} outside of 0..{}",
                position, slot, seat_count
            ),
            RotationError::DuplicateSlot { position, slot } => write!(
                f,
                "rotation position {} repeats slot {}",
                position, slot
            ),
        }
    }
}

/// Errors that prevent a database candidate index from being translated.
/// They all point to inconsistent source data.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TranslationError {
    UnknownGroup {
        group_index: u32,
        num_groups: usize,
    },
    CandidateOutsideGroup {
        group_index: u32,
        db_candidate_index: u32,
        group_candidates: u32,
    },
    ColumnLargerThanRotation {
        physical_column: usize,
        column_candidates: u32,
        rotation_len: usize,
    },
    /// The collapsed rotation does not contain the candidate.
    CandidateNotInRotation {
        group_index: u32,
        db_candidate_index: u32,
        physical_column: usize,
    },
}

impl Error for TranslationError {}

impl Display for TranslationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslationError::UnknownGroup {
                group_index,
                num_groups,
            } => write!(
                f,
                "group {} does not exist (electorate has {} groups)",
                group_index, num_groups
            ),
            TranslationError::CandidateOutsideGroup {
                group_index,
                db_candidate_index,
                group_candidates,
            } => write!(
                f,
                "candidate {} is outside group {} which has {} candidates",
                db_candidate_index, group_index, group_candidates
            ),
            TranslationError::ColumnLargerThanRotation {
                physical_column,
                column_candidates,
                rotation_len,
            } => write!(
                f,
                "physical column {} has {} candidates but the rotation only has {} positions",
                physical_column, column_candidates, rotation_len
            ),
            TranslationError::CandidateNotInRotation {
                group_index,
                db_candidate_index,
                physical_column,
            } => write!(
                f,
                "candidate {} of group {} not found in the collapsed rotation of physical column {}",
                db_candidate_index, group_index, physical_column
            ),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PreferenceError {
    /// The length is not a multiple of the field width.
    MalformedLength {
        length: usize,
    },
    NonDigit {
        offset: usize,
    },
    ZeroPreferenceNumber {
        field: usize,
    },
    PreferenceNumberOutOfRange {
        preference_number: u32,
        num_preferences: usize,
    },
    DuplicatePreferenceNumber {
        preference_number: u32,
    },
    /// A value does not fit in a two digit field when packing.
    ValueTooLarge {
        value: u32,
    },
}

impl Error for PreferenceError {}

impl Display for PreferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreferenceError::MalformedLength { length } => write!(
                f,
                "malformed preference list of length {}",
                length
            ),
            PreferenceError::NonDigit { offset } => {
                write!(f, "malformed preference list: non digit at offset {}", offset)
            }
            PreferenceError::ZeroPreferenceNumber { field } => {
                write!(f, "preference field {} has preference number 0", field)
            }
            PreferenceError::PreferenceNumberOutOfRange {
                preference_number,
                num_preferences,
            } => write!(
                f,
                "preference number {} is larger than the {} preferences of the paper",
                preference_number, num_preferences
            ),
            PreferenceError::DuplicatePreferenceNumber { preference_number } => write!(
                f,
                "preference number {} appears more than once",
                preference_number
            ),
            PreferenceError::ValueTooLarge { value } => {
                write!(f, "value {} does not fit in a preference field", value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_text_forms() {
        let expected = vec![2, 0, 4, 1, 3];
        for text in ["{2,0,4,1,3}", "{2, 0, 4, 1, 3}", "2,0,4,1,3", " { 2,0,4,1,3 } "] {
            let r = Rotation::parse(text, 5).unwrap();
            assert_eq!(r.positions(), expected.as_slice(), "{:?}", text);
            assert_eq!(r.len(), 5);
            assert!(!r.is_empty());
        }
    }

    #[test]
    fn rotation_with_stray_separator_is_malformed() {
        assert_eq!(
            Rotation::parse("{2,0,4,1,3,}", 5),
            Err(RotationError::Malformed {
                text: "{2,0,4,1,3,}".to_string()
            })
        );
        assert!(matches!(
            Rotation::parse("{2,0,x,1,3}", 5),
            Err(RotationError::Malformed { .. })
        ));
    }

    #[test]
    fn rotation_length_must_match_seats() {
        assert_eq!(
            Rotation::parse("{2,0,4,1}", 5),
            Err(RotationError::WrongLength {
                expected: 5,
                found: 4
            })
        );
        assert_eq!(
            Rotation::parse("{}", 5),
            Err(RotationError::WrongLength {
                expected: 5,
                found: 0
            })
        );
    }

    #[test]
    fn rotation_slots_are_a_permutation() {
        assert_eq!(
            Rotation::parse("{5,0,4,1,3}", 5),
            Err(RotationError::SlotOutOfRange {
                position: 0,
                slot: 5,
                seat_count: 5
            })
        );
        assert_eq!(
            Rotation::new(vec![0, 0, 1, 2, 3], 5),
            Err(RotationError::DuplicateSlot {
                position: 1,
                slot: 0
            })
        );
    }

    #[test]
    fn empty_rotation_for_no_seats() {
        let r = Rotation::parse("{}", 0).unwrap();
        assert!(r.is_empty());
    }
}
