//! Transformation validation and the derived `Convolve` step.

use std::collections::BTreeSet;

use neuroscout_interchange::Transformation;

pub const CONVOLVE: &str = "Convolve";
pub const ORTHOGONALIZE: &str = "Orthogonalize";

/// Transformations the builder offers. `Convolve` is absent: it is derived
/// from the HRF predictor selection, never edited directly.
pub const EDITABLE_TRANSFORMS: &[&str] = &[
    "Scale",
    "Threshold",
    ORTHOGONALIZE,
    "Replace",
    "Demean",
    "Lag",
];

/// Human-readable problems with `xform`. Empty means valid.
pub fn validate_xform(xform: &Transformation) -> Vec<String> {
    let mut errors = Vec::new();
    if xform.name.trim().is_empty() {
        errors.push("Select a transformation".to_string());
    }
    if xform.input.is_empty() {
        errors.push("Select at least one input predictor".to_string());
    }
    if xform.name == ORTHOGONALIZE && xform.other.as_ref().map_or(true, |o| o.is_empty()) {
        errors.push("Select at least one predictor to orthogonalize with respect to".to_string());
    }
    errors
}

/// Names listed both as `Input` and `Other` of an `Orthogonalize`.
/// A predictor cannot be orthogonalized against itself.
pub fn orthogonalize_overlap(xform: &Transformation) -> Vec<String> {
    if xform.name != ORTHOGONALIZE {
        return Vec::new();
    }
    let inputs: BTreeSet<&str> = xform.input.iter().map(String::as_str).collect();
    xform
        .other
        .iter()
        .flatten()
        .filter(|o| inputs.contains(o.as_str()))
        .cloned()
        .collect()
}

pub fn is_convolve(xform: &Transformation) -> bool {
    xform.name == CONVOLVE
}

/// The `Convolve` step for the given HRF predictor names, or `None` when
/// nothing is convolved.
pub fn synthesize_convolve(hrf_names: &[String]) -> Option<Transformation> {
    if hrf_names.is_empty() {
        return None;
    }
    Some(Transformation::new(CONVOLVE, hrf_names.to_vec()))
}

/// Split off every `Convolve` entry, returning the remaining list and the
/// last `Convolve` seen.
pub fn strip_convolve(list: &[Transformation]) -> (Vec<Transformation>, Option<Transformation>) {
    let mut rest = Vec::with_capacity(list.len());
    let mut convolve = None;
    for xform in list {
        if is_convolve(xform) {
            convolve = Some(xform.clone());
        } else {
            rest.push(xform.clone());
        }
    }
    (rest, convolve)
}

/// `list` with any existing `Convolve` replaced by `convolve`, which goes
/// last so that it sees every other transformation's output.
pub fn with_convolve(list: &[Transformation], convolve: Option<Transformation>) -> Vec<Transformation> {
    let (mut out, _) = strip_convolve(list);
    out.extend(convolve);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_scale_has_no_errors() {
        let x = Transformation::new("Scale", names(&["P1"]));
        assert!(validate_xform(&x).is_empty());
    }

    #[test]
    fn missing_name_and_input_are_both_reported() {
        let errors = validate_xform(&Transformation::default());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn orthogonalize_without_other_has_exactly_one_error() {
        let mut x = Transformation::new(ORTHOGONALIZE, names(&["P1"]));
        x.other = Some(vec![]);
        let errors = validate_xform(&x);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("orthogonalize"));

        x.other = None;
        assert_eq!(validate_xform(&x).len(), 1);

        x.other = Some(names(&["P2"]));
        assert!(validate_xform(&x).is_empty());
    }

    #[test]
    fn other_is_only_required_for_orthogonalize() {
        let x = Transformation::new("Threshold", names(&["P1"]));
        assert!(validate_xform(&x).is_empty());
    }

    #[test]
    fn overlap_lists_shared_names() {
        let mut x = Transformation::new(ORTHOGONALIZE, names(&["P1", "P2"]));
        x.other = Some(names(&["P2", "P3"]));
        assert_eq!(orthogonalize_overlap(&x), names(&["P2"]));
    }

    #[test]
    fn convolve_is_replaced_not_duplicated() {
        let list = vec![
            Transformation::new(CONVOLVE, names(&["old"])),
            Transformation::new("Scale", names(&["P1"])),
        ];
        let out = with_convolve(&list, synthesize_convolve(&names(&["P1", "P2"])));
        assert_eq!(out.len(), 2);
        assert_eq!(out.iter().filter(|x| is_convolve(x)).count(), 1);
        assert_eq!(out[1].input, names(&["P1", "P2"]));

        let cleared = with_convolve(&out, synthesize_convolve(&[]));
        assert_eq!(cleared.len(), 1);
        assert!(!cleared.iter().any(is_convolve));
    }
}
