mod config;
use log::debug;

pub mod builder;
pub mod manual;
pub mod preferences;

pub use crate::config::*;

/// Collapses a rotation to the size of one physical column.
///
/// The result keeps, in rotation order, the slots that hold a candidate of a
/// column with `num_candidates` candidates. Since the rotation is a
/// permutation of `0..len`, the result has exactly `num_candidates` entries.
///
/// Panics if `num_candidates` is larger than the rotation.
pub fn collapse_rotation(rotation: &Rotation, num_candidates: u32) -> Vec<u32> {
    assert!(
        num_candidates as usize <= rotation.len(),
        "collapse_rotation: {} candidates for a rotation of {} positions",
        num_candidates,
        rotation.len()
    );
    rotation
        .positions()
        .iter()
        .filter(|&&slot| slot < num_candidates)
        .cloned()
        .collect()
}

/// Translates the database index of a candidate to the index at which the
/// candidate was shown to the voter.
///
/// The candidate is first located in the physical column of its group that
/// holds it: the index becomes local to that column and the sizes of the
/// preceding columns of the group are kept as an offset. The local index is
/// then looked up in the rotation collapsed to the size of that column.
///
/// Arguments:
/// * `layout` the layout of the electorate of the paper
/// * `group_index` the group of the candidate
/// * `db_candidate_index` the index of the candidate in its group, as stored
/// * `rotation` the rotation of the paper version
pub fn translate_dbci_to_sci(
    layout: &ElectorateLayout,
    group_index: u32,
    db_candidate_index: u32,
    rotation: &Rotation,
) -> Result<u32, TranslationError> {
    let columns = layout
        .group_columns(group_index)
        .ok_or(TranslationError::UnknownGroup {
            group_index,
            num_groups: layout.num_groups(),
        })?;
    let outside_group = || TranslationError::CandidateOutsideGroup {
        group_index,
        db_candidate_index,
        group_candidates: layout.group_candidate_count(group_index).unwrap_or(0),
    };

    // Skip to the physical column containing the candidate.
    let mut physical_column = columns.start;
    let mut local_index = db_candidate_index;
    let mut offset: u32 = 0;
    while local_index >= layout.physical_columns[physical_column] {
        let column_size = layout.physical_columns[physical_column];
        local_index -= column_size;
        offset += column_size;
        physical_column += 1;
        if physical_column >= columns.end {
            return Err(outside_group());
        }
    }

    let num_candidates = layout.physical_columns[physical_column];
    if num_candidates as usize > rotation.len() {
        return Err(TranslationError::ColumnLargerThanRotation {
            physical_column,
            column_candidates: num_candidates,
            rotation_len: rotation.len(),
        });
    }

    let map = collapse_rotation(rotation, num_candidates);
    let screen_index = map
        .iter()
        .take(num_candidates as usize)
        .position(|&slot| slot == local_index)
        .ok_or(TranslationError::CandidateNotInRotation {
            group_index,
            db_candidate_index,
            physical_column,
        })?;

    Ok(screen_index as u32 + offset)
}

/// Fills in the screen index of every preference of a paper.
///
/// Papers without a rotation (paper version 0) get no screen index.
pub fn translate_preferences(
    layout: &ElectorateLayout,
    preferences: &mut PreferenceSet,
    rotation: Option<&Rotation>,
) -> Result<(), TranslationError> {
    for pref in preferences.iter_mut() {
        pref.screen_candidate_index = match rotation {
            Some(rot) => Some(translate_dbci_to_sci(
                layout,
                pref.group_index,
                pref.db_candidate_index,
                rot,
            )?),
            None => None,
        };
        debug!(
            "translate_preferences: electorate {}: {:?}",
            layout.code(),
            pref
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::builder::LayoutBuilder;
    use super::*;
    use std::collections::HashSet;

    fn rot(positions: &[u32]) -> Rotation {
        Rotation::new(positions.to_vec(), positions.len() as u32).unwrap()
    }

    // All the permutations of 0..n, by Heap's algorithm.
    fn permutations(n: u32) -> Vec<Vec<u32>> {
        fn heap(k: usize, items: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
            if k <= 1 {
                out.push(items.clone());
                return;
            }
            for i in 0..k - 1 {
                heap(k - 1, items, out);
                if k % 2 == 0 {
                    items.swap(i, k - 1);
                } else {
                    items.swap(0, k - 1);
                }
            }
            heap(k - 1, items, out);
        }
        let mut items: Vec<u32> = (0..n).collect();
        let mut out = Vec::new();
        heap(items.len(), &mut items, &mut out);
        out
    }

    #[test]
    fn collapse_filters_in_rotation_order() {
        let r = rot(&[2, 0, 4, 1, 3]);
        assert_eq!(collapse_rotation(&r, 3), vec![2, 0, 1]);
        assert_eq!(collapse_rotation(&r, 2), vec![0, 1]);
        assert_eq!(collapse_rotation(&r, 5), vec![2, 0, 4, 1, 3]);
        assert_eq!(collapse_rotation(&r, 0), Vec::<u32>::new());
    }

    #[test]
    fn collapse_keeps_length_and_relative_order() {
        for perm in permutations(5) {
            let r = rot(&perm);
            for n in 0..=5 {
                let map = collapse_rotation(&r, n);
                assert_eq!(map.len(), n as usize);
                assert!(map.iter().all(|&slot| slot < n));
                // Relative order: positions in the rotation are increasing.
                let idx: Vec<usize> = map
                    .iter()
                    .map(|slot| perm.iter().position(|p| p == slot).unwrap())
                    .collect();
                assert!(idx.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    #[should_panic]
    fn collapse_larger_than_rotation_panics() {
        collapse_rotation(&rot(&[1, 0]), 3);
    }

    #[test]
    fn translate_two_groups_without_splits() {
        let layout = LayoutBuilder::new(1, "Brindabella", 5)
            .group_counts(&[(0, 3), (1, 2)])
            .build()
            .unwrap();
        let r = rot(&[2, 0, 4, 1, 3]);
        let t = |g, c| translate_dbci_to_sci(&layout, g, c, &r).unwrap();
        assert_eq!(t(0, 0), 1);
        assert_eq!(t(0, 1), 2);
        assert_eq!(t(0, 2), 0);
        assert_eq!(t(1, 0), 0);
        assert_eq!(t(1, 1), 1);
    }

    #[test]
    fn translate_split_group_adds_column_offset() {
        let layout = LayoutBuilder::new(1, "Brindabella", 5)
            .group_counts(&[(0, 4)])
            .splits(&[ColumnSplit {
                group_index: 0,
                physical_column_index: 0,
                candidate_count: 3,
            }])
            .build()
            .unwrap();
        assert_eq!(layout.physical_columns(), &[3, 1]);
        let r = rot(&[2, 0, 4, 1, 3]);
        // Column 1 has a single candidate: local index 0, offset 3.
        assert_eq!(translate_dbci_to_sci(&layout, 0, 3, &r), Ok(3));
        assert_eq!(translate_dbci_to_sci(&layout, 0, 2, &r), Ok(0));
    }

    #[test]
    fn translate_is_a_bijection_on_each_group() {
        let layout = LayoutBuilder::new(7, "Murrumbidgee", 5)
            .group_counts(&[(0, 2), (1, 9), (2, 5)])
            .splits(&[
                ColumnSplit {
                    group_index: 1,
                    physical_column_index: 0,
                    candidate_count: 4,
                },
                ColumnSplit {
                    group_index: 1,
                    physical_column_index: 1,
                    candidate_count: 3,
                },
            ])
            .build()
            .unwrap();
        assert_eq!(layout.physical_columns(), &[2, 4, 3, 2, 5]);
        for perm in permutations(5) {
            let r = rot(&perm);
            for g in 0..layout.num_groups() as u32 {
                let total = layout.group_candidate_count(g).unwrap();
                let image: HashSet<u32> = (0..total)
                    .map(|c| translate_dbci_to_sci(&layout, g, c, &r).unwrap())
                    .collect();
                let expected: HashSet<u32> = (0..total).collect();
                assert_eq!(image, expected, "group {} rotation {:?}", g, perm);
            }
        }
    }

    #[test]
    fn translate_rejects_unknown_group() {
        let layout = LayoutBuilder::new(1, "Brindabella", 5)
            .group_counts(&[(0, 3)])
            .build()
            .unwrap();
        assert_eq!(
            translate_dbci_to_sci(&layout, 1, 0, &rot(&[0, 1, 2, 3, 4])),
            Err(TranslationError::UnknownGroup {
                group_index: 1,
                num_groups: 1
            })
        );
    }

    #[test]
    fn translate_rejects_candidate_outside_group() {
        let layout = LayoutBuilder::new(1, "Brindabella", 5)
            .group_counts(&[(0, 3), (1, 2)])
            .build()
            .unwrap();
        assert_eq!(
            translate_dbci_to_sci(&layout, 0, 3, &rot(&[0, 1, 2, 3, 4])),
            Err(TranslationError::CandidateOutsideGroup {
                group_index: 0,
                db_candidate_index: 3,
                group_candidates: 3
            })
        );
    }

    #[test]
    fn translate_rejects_rotation_smaller_than_column() {
        let layout = LayoutBuilder::new(1, "Brindabella", 5)
            .group_counts(&[(0, 5)])
            .build()
            .unwrap();
        assert!(matches!(
            translate_dbci_to_sci(&layout, 0, 0, &rot(&[1, 0, 2])),
            Err(TranslationError::ColumnLargerThanRotation { .. })
        ));
    }

    #[test]
    fn paper_without_rotation_has_no_screen_index() {
        let layout = LayoutBuilder::new(1, "Brindabella", 5)
            .group_counts(&[(0, 3), (1, 2)])
            .build()
            .unwrap();
        let mut prefs = preferences::unpack_preferences("010002020100").unwrap();
        translate_preferences(&layout, &mut prefs, None).unwrap();
        assert!(prefs.iter().all(|p| p.screen_candidate_index.is_none()));

        let r = rot(&[2, 0, 4, 1, 3]);
        translate_preferences(&layout, &mut prefs, Some(&r)).unwrap();
        let screen: Vec<Option<u32>> = prefs.iter().map(|p| p.screen_candidate_index).collect();
        assert_eq!(screen, vec![Some(0), Some(0)]);
    }
}
