//! Predictor selection: the filtered-diff merge and everything that has to
//! follow a selection change (config entries, HRF set, dependent pruning).

use std::collections::BTreeSet;

use neuroscout_interchange::{
    AnalysisConfig, Contrast, Predictor, PredictorConfig, PredictorId, Transformation,
};

use crate::draft::AnalysisDraft;

/// Merge a selection made in a (possibly search-narrowed) view into the
/// current set.
///
/// Ids that were visible in `filtered` but are not in `selected` are
/// removed; ids in `selected` are added. Ids outside `filtered` keep their
/// current membership. The result is `(current ∖ (filtered ∖ selected)) ∪
/// selected`, in current order followed by newly selected ids.
pub fn merge_filtered(
    current: &[PredictorId],
    filtered: &[PredictorId],
    selected: &[PredictorId],
) -> Vec<PredictorId> {
    let filtered: BTreeSet<PredictorId> = filtered.iter().copied().collect();
    let chosen: BTreeSet<PredictorId> = selected.iter().copied().collect();

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(current.len() + selected.len());
    for id in current {
        let dropped = filtered.contains(id) && !chosen.contains(id);
        if !dropped && seen.insert(*id) {
            out.push(*id);
        }
    }
    for id in selected {
        if seen.insert(*id) {
            out.push(*id);
        }
    }
    out
}

/// Config with exactly one entry per id in `ids`: existing entries are
/// kept, missing ones get the default, entries for other ids are dropped.
pub fn sync_predictor_configs(config: &AnalysisConfig, ids: &[PredictorId]) -> AnalysisConfig {
    let predictor_configs = ids
        .iter()
        .map(|id| {
            let entry = config
                .predictor_configs
                .get(id)
                .cloned()
                .unwrap_or_else(PredictorConfig::default);
            (*id, entry)
        })
        .collect();
    AnalysisConfig { predictor_configs }
}

/// Names of `ids` in `available`, in id order. Unknown ids are dropped.
pub fn names_for(ids: &[PredictorId], available: &[Predictor]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| available.iter().find(|p| p.id == *id))
        .map(|p| p.name.clone())
        .collect()
}

/// Drop transformations and contrasts that reference a name which is
/// neither selected nor produced by an earlier transformation.
pub fn prune_dependents(
    transformations: &[Transformation],
    contrasts: &[Contrast],
    selected_names: &[String],
) -> (Vec<Transformation>, Vec<Contrast>) {
    let mut known: BTreeSet<String> = selected_names.iter().cloned().collect();

    let mut kept = Vec::with_capacity(transformations.len());
    for xform in transformations {
        let refs_ok = xform
            .input
            .iter()
            .chain(xform.other.iter().flatten())
            .all(|name| known.contains(name));
        if refs_ok {
            known.extend(xform.produced_names().iter().cloned());
            kept.push(xform.clone());
        }
    }

    let contrasts = contrasts
        .iter()
        .filter(|c| c.condition_list.iter().all(|name| known.contains(name)))
        .cloned()
        .collect();

    (kept, contrasts)
}

/// Apply a main-set selection made in a view showing `filtered`.
///
/// Ids not in `available` are ignored. Deselected predictors also leave the
/// HRF set, and anything referencing them is pruned.
pub fn apply_predictor_selection(
    draft: &mut AnalysisDraft,
    available: &[Predictor],
    filtered: &[PredictorId],
    selected: &[PredictorId],
) {
    let merged = merge_filtered(&draft.predictor_ids, filtered, selected);
    draft.predictor_ids = restrict_to(&merged, available);
    refresh_dependents(draft, available);
}

/// Apply an HRF-set selection made in a view showing `filtered`. The HRF
/// set never grows beyond the main selection.
pub fn apply_hrf_selection(
    draft: &mut AnalysisDraft,
    filtered: &[PredictorId],
    selected: &[PredictorId],
) {
    let merged = merge_filtered(&draft.hrf_predictor_ids, filtered, selected);
    let main: BTreeSet<PredictorId> = draft.predictor_ids.iter().copied().collect();
    draft.hrf_predictor_ids = merged.into_iter().filter(|id| main.contains(id)).collect();
}

/// Re-validate the selection against a freshly fetched predictor list.
pub fn reconcile_available(draft: &mut AnalysisDraft, available: &[Predictor]) {
    draft.predictor_ids = restrict_to(&draft.predictor_ids, available);
    refresh_dependents(draft, available);
}

fn restrict_to(ids: &[PredictorId], available: &[Predictor]) -> Vec<PredictorId> {
    ids.iter()
        .copied()
        .filter(|id| available.iter().any(|p| p.id == *id))
        .collect()
}

fn refresh_dependents(draft: &mut AnalysisDraft, available: &[Predictor]) {
    let main: BTreeSet<PredictorId> = draft.predictor_ids.iter().copied().collect();
    draft.hrf_predictor_ids.retain(|id| main.contains(id));
    draft.config = sync_predictor_configs(&draft.config, &draft.predictor_ids);

    let names = names_for(&draft.predictor_ids, available);
    let (transformations, contrasts) =
        prune_dependents(&draft.transformations, &draft.contrasts, &names);
    draft.transformations = transformations;
    draft.contrasts = contrasts;
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuroscout_interchange::Convolution;

    fn predictors(names: &[&str]) -> Vec<Predictor> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Predictor {
                id: i as u64 + 1,
                name: n.to_string(),
                description: None,
                source: None,
            })
            .collect()
    }

    fn as_set(v: &[u64]) -> BTreeSet<u64> {
        v.iter().copied().collect()
    }

    #[test]
    fn merge_matches_set_formula() {
        let cases: &[(&[u64], &[u64], &[u64])] = &[
            (&[1, 2, 3], &[2, 3, 4], &[3, 4]),
            (&[], &[1, 2], &[2]),
            (&[5], &[], &[]),
            (&[1, 2], &[1, 2], &[]),
            (&[1], &[2], &[1, 2]),
        ];
        for (old, filtered, selected) in cases {
            let got = as_set(&merge_filtered(old, filtered, selected));
            let removed: BTreeSet<u64> =
                as_set(filtered).difference(&as_set(selected)).copied().collect();
            let expected: BTreeSet<u64> = as_set(old)
                .difference(&removed)
                .copied()
                .chain(selected.iter().copied())
                .collect();
            assert_eq!(got, expected, "old={:?} filtered={:?} selected={:?}", old, filtered, selected);
        }
    }

    #[test]
    fn merge_keeps_selection_hidden_by_filter() {
        // "a" was chosen under another search; the current view shows only 2 and 3.
        assert_eq!(merge_filtered(&[1, 2], &[2, 3], &[3]), vec![1, 3]);
    }

    #[test]
    fn merge_does_not_duplicate() {
        assert_eq!(merge_filtered(&[1, 2], &[1, 2], &[2, 1, 2]), vec![1, 2]);
    }

    #[test]
    fn selecting_two_of_three_creates_two_default_configs() {
        let available = predictors(&["P1", "P2", "P3"]);
        let mut draft = AnalysisDraft::default();
        apply_predictor_selection(&mut draft, &available, &[1, 2, 3], &[1, 2]);

        assert_eq!(draft.predictor_ids, vec![1, 2]);
        assert_eq!(draft.config.predictor_configs.len(), 2);
        for cfg in draft.config.predictor_configs.values() {
            assert_eq!(cfg.convolution, Convolution::Gamma);
            assert!(cfg.temporal_derivative);
            assert!(!cfg.orthogonalize);
        }
    }

    #[test]
    fn existing_config_survives_reselection() {
        let available = predictors(&["P1", "P2"]);
        let mut draft = AnalysisDraft::default();
        apply_predictor_selection(&mut draft, &available, &[1, 2], &[1]);
        draft
            .config
            .predictor_configs
            .get_mut(&1)
            .unwrap()
            .convolution = Convolution::Glover;
        apply_predictor_selection(&mut draft, &available, &[1, 2], &[1, 2]);
        assert_eq!(draft.config.predictor_configs[&1].convolution, Convolution::Glover);
        assert_eq!(draft.config.predictor_configs[&2], PredictorConfig::default());
    }

    #[test]
    fn deselection_prunes_hrf_and_contrasts() {
        let available = predictors(&["P1", "P2"]);
        let mut draft = AnalysisDraft::default();
        apply_predictor_selection(&mut draft, &available, &[1, 2], &[1, 2]);
        apply_hrf_selection(&mut draft, &[1, 2], &[1, 2]);
        draft.contrasts = vec![Contrast::new(
            "C1",
            vec!["P1".into(), "P2".into()],
            vec![1.0, -1.0],
        )];

        apply_predictor_selection(&mut draft, &available, &[1, 2], &[1]);

        assert_eq!(draft.hrf_predictor_ids, vec![1]);
        assert!(draft.contrasts.is_empty());
        assert_eq!(draft.config.predictor_configs.len(), 1);
    }

    #[test]
    fn unknown_ids_are_not_selected() {
        let available = predictors(&["P1"]);
        let mut draft = AnalysisDraft::default();
        apply_predictor_selection(&mut draft, &available, &[1, 9], &[1, 9]);
        assert_eq!(draft.predictor_ids, vec![1]);
    }

    #[test]
    fn hrf_set_is_bounded_by_main_set() {
        let available = predictors(&["P1", "P2"]);
        let mut draft = AnalysisDraft::default();
        apply_predictor_selection(&mut draft, &available, &[1, 2], &[1]);
        apply_hrf_selection(&mut draft, &[1, 2], &[1, 2]);
        assert_eq!(draft.hrf_predictor_ids, vec![1]);
    }

    #[test]
    fn transformation_outputs_keep_dependents_alive() {
        let mut scale = Transformation::new("Scale", vec!["P1".into()]);
        scale.output = Some(vec!["P1_z".into()]);
        let contrasts = vec![Contrast::identity("P1_z"), Contrast::identity("P9")];
        let (xforms, kept) = prune_dependents(&[scale], &contrasts, &["P1".to_string()]);
        assert_eq!(xforms.len(), 1);
        assert_eq!(kept, vec![Contrast::identity("P1_z")]);
    }

    #[test]
    fn orthogonalize_against_removed_predictor_is_pruned() {
        let mut orth = Transformation::new("Orthogonalize", vec!["P1".into()]);
        orth.other = Some(vec!["P2".into()]);
        let (xforms, _) = prune_dependents(&[orth], &[], &["P1".to_string()]);
        assert!(xforms.is_empty());
    }

    #[test]
    fn reconcile_drops_predictors_that_disappeared() {
        let mut draft = AnalysisDraft {
            predictor_ids: vec![1, 2, 3],
            hrf_predictor_ids: vec![3],
            ..Default::default()
        };
        reconcile_available(&mut draft, &predictors(&["P1", "P2"]));
        assert_eq!(draft.predictor_ids, vec![1, 2]);
        assert!(draft.hrf_predictor_ids.is_empty());
        assert_eq!(draft.config.predictor_configs.len(), 2);
    }
}
