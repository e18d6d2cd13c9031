//! Contrast validation and dummy-contrast generation.

use neuroscout_interchange::{Contrast, Predictor};

/// Human-readable problems with `contrast`. Empty means valid.
pub fn validate_contrast(contrast: &Contrast) -> Vec<String> {
    let mut errors = Vec::new();
    if contrast.name.trim().is_empty() {
        errors.push("Contrast name is required".to_string());
    }
    if contrast.condition_list.len() != contrast.weights.len() {
        errors.push(format!(
            "Number of weights ({}) must match number of conditions ({})",
            contrast.weights.len(),
            contrast.condition_list.len()
        ));
    }
    if contrast.weights.iter().any(|w| !w.is_finite()) {
        errors.push("Weights must be numeric".to_string());
    }
    errors
}

fn is_identity_for(contrast: &Contrast, name: &str) -> bool {
    contrast.condition_list.len() == 1
        && contrast.condition_list[0] == name
        && contrast.weights == [1.0]
}

/// `existing` plus one identity contrast per non-confound predictor that
/// does not already have one. Running it on its own output changes nothing.
pub fn generate_dummy_contrasts(existing: &[Contrast], predictors: &[&Predictor]) -> Vec<Contrast> {
    let mut out = existing.to_vec();
    for predictor in predictors.iter().filter(|p| !p.is_confound()) {
        if !out.iter().any(|c| is_identity_for(c, &predictor.name)) {
            out.push(Contrast::identity(&predictor.name));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor(id: u64, name: &str, source: Option<&str>) -> Predictor {
        Predictor {
            id,
            name: name.to_string(),
            description: None,
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn balanced_contrast_is_valid() {
        let c = Contrast::new("C1", vec!["P1".into(), "P2".into()], vec![1.0, -1.0]);
        assert!(validate_contrast(&c).is_empty());
    }

    #[test]
    fn each_violation_is_reported() {
        let c = Contrast::new("", vec!["P1".into()], vec![1.0, f64::NAN]);
        let errors = validate_contrast(&c);
        assert_eq!(errors.len(), 3);
        assert!(errors[1].contains("(2)"));
    }

    #[test]
    fn infinite_weight_is_not_numeric() {
        let c = Contrast::new("C", vec!["P1".into()], vec![f64::INFINITY]);
        assert_eq!(validate_contrast(&c), vec!["Weights must be numeric".to_string()]);
    }

    #[test]
    fn dummy_contrasts_skip_confounds_and_existing() {
        let face = predictor(1, "face", Some("Clarifai"));
        let speech = predictor(2, "speech", None);
        let motion = predictor(3, "rot_x", Some("fmriprep"));
        let existing = vec![Contrast::identity("face")];

        let out = generate_dummy_contrasts(&existing, &[&face, &speech, &motion]);
        let names: Vec<&str> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["face", "speech"]);
    }

    #[test]
    fn dummy_contrasts_are_idempotent() {
        let a = predictor(1, "a", None);
        let b = predictor(2, "b", None);
        let once = generate_dummy_contrasts(&[], &[&a, &b]);
        let twice = generate_dummy_contrasts(&once, &[&a, &b]);
        assert_eq!(once, twice);
    }

    #[test]
    fn weighted_single_condition_is_not_an_identity() {
        let a = predictor(1, "a", None);
        let existing = vec![Contrast::new("a2", vec!["a".into()], vec![2.0])];
        let out = generate_dummy_contrasts(&existing, &[&a]);
        assert_eq!(out.len(), 2);
    }
}
