//! The packed preference lists stored with each confirmed vote.
//!
//! A list is a sequence of fixed-width fields. Every field holds three
//! zero-padded two digit numbers: the preference number, the group index and
//! the database candidate index. `"010203"` is preference 1 for candidate 3
//! of group 2. The fields may be stored in any preference order.

use crate::config::*;
use log::debug;

pub const DIGITS_PER_VALUE: usize = 2;
pub const DIGITS_PER_PREF: usize = 3 * DIGITS_PER_VALUE;
pub const MAX_VALUE: u32 = 99;

/// Decodes a preference list.
///
/// An empty list decodes to an empty (informal) set. The preference numbers
/// must be exactly `1..=n` for a list of `n` fields.
pub fn unpack_preferences(preference_list: &str) -> Result<PreferenceSet, PreferenceError> {
    let bytes = preference_list.as_bytes();
    if bytes.len() % DIGITS_PER_PREF != 0 {
        return Err(PreferenceError::MalformedLength {
            length: bytes.len(),
        });
    }
    let mut unordered: Vec<Preference> = Vec::with_capacity(bytes.len() / DIGITS_PER_PREF);
    for (field, chunk) in bytes.chunks_exact(DIGITS_PER_PREF).enumerate() {
        let offset = field * DIGITS_PER_PREF;
        let preference_number = read_value(chunk, 0, offset)?;
        let group_index = read_value(chunk, 1, offset)?;
        let db_candidate_index = read_value(chunk, 2, offset)?;
        unordered.push(Preference::new(
            preference_number,
            group_index,
            db_candidate_index,
        ));
    }
    debug!(
        "unpack_preferences: {:?} -> {} preferences",
        preference_list,
        unordered.len()
    );
    PreferenceSet::new(unordered)
}

fn read_value(chunk: &[u8], idx: usize, field_offset: usize) -> Result<u32, PreferenceError> {
    let start = idx * DIGITS_PER_VALUE;
    let mut value: u32 = 0;
    for (i, b) in chunk[start..start + DIGITS_PER_VALUE].iter().enumerate() {
        if !b.is_ascii_digit() {
            return Err(PreferenceError::NonDigit {
                offset: field_offset + start + i,
            });
        }
        value = value * 10 + (b - b'0') as u32;
    }
    Ok(value)
}

/// Encodes preferences in the given order. The screen index is not part of
/// the stored form.
pub fn pack_preferences(preferences: &[Preference]) -> Result<String, PreferenceError> {
    let mut res = String::with_capacity(preferences.len() * DIGITS_PER_PREF);
    for p in preferences.iter() {
        for value in [p.preference_number, p.group_index, p.db_candidate_index] {
            if value > MAX_VALUE {
                return Err(PreferenceError::ValueTooLarge { value });
            }
            res.push_str(&format!("{:02}", value));
        }
    }
    Ok(res)
}
