//! Scripted analysis creation for `neuroscout create`.
//!
//! A plan names everything by what a user sees (dataset, task and
//! predictor names) and is replayed through the wizard tab by tab, so it
//! gets the same validation, autosaving and model building as an
//! interactive session.
//!
//! # Example
//!
//! ```toml
//! name = "Faces vs speech"
//! dataset = "Budapest"
//! task = "movie"
//! subjects = ["sid000005"]
//! predictors = ["face", "speech"]
//! hrf = ["face", "speech"]
//! dummy_contrasts = true
//!
//! [[transformations]]
//! name = "Scale"
//! input = ["speech"]
//!
//! [[contrasts]]
//! name = "face_vs_speech"
//! conditions = ["face", "speech"]
//! weights = [1, -1]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use neuroscout_client::Session;
use neuroscout_core::wizard::{
    Action, ContrastEdit, Navigation, OverviewEdit, PredictorEdit, Tab, TransformationEdit,
};
use neuroscout_interchange::{Contrast, ContrastType, Dataset, DatasetId, Transformation};
use serde::Deserialize;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A dataset given by numeric id or by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DatasetRef {
    Id(DatasetId),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub predictions: String,
    #[serde(default)]
    pub private: bool,
    pub dataset: DatasetRef,
    /// Required when the dataset has more than one task.
    #[serde(default)]
    pub task: Option<String>,
    /// Explicit run ids. Without them every run of the task is used.
    #[serde(default)]
    pub runs: Option<Vec<u64>>,
    /// Keep only runs of these subjects.
    #[serde(default)]
    pub subjects: Vec<String>,
    pub predictors: Vec<String>,
    /// Predictors to convolve. Defaults to every non-confound predictor.
    #[serde(default)]
    pub hrf: Option<Vec<String>>,
    #[serde(default)]
    pub transformations: Vec<PlanTransformation>,
    #[serde(default)]
    pub contrasts: Vec<PlanContrast>,
    /// Add an identity contrast per non-confound predictor.
    #[serde(default)]
    pub dummy_contrasts: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanTransformation {
    pub name: String,
    pub input: Vec<String>,
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub other: Vec<String>,
    /// Transform-specific settings, passed through as-is.
    #[serde(flatten)]
    pub params: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanContrast {
    pub name: String,
    pub conditions: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default, rename = "type")]
    pub contrast_type: ContrastType,
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a plan TOML file from `path`.
pub fn read_plan(path: &Path) -> Result<Plan, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

impl PlanTransformation {
    pub fn to_transformation(&self) -> Result<Transformation, String> {
        let mut xform = Transformation::new(&self.name, self.input.clone());
        if !self.output.is_empty() {
            xform.output = Some(self.output.clone());
        }
        if !self.other.is_empty() {
            xform.other = Some(self.other.clone());
        }
        for (key, value) in &self.params {
            let value = serde_json::to_value(value)
                .map_err(|e| format!("transformation '{}': {}: {}", self.name, key, e))?;
            xform.params.insert(key.clone(), value);
        }
        Ok(xform)
    }
}

impl PlanContrast {
    pub fn to_contrast(&self) -> Contrast {
        Contrast {
            contrast_type: self.contrast_type,
            ..Contrast::new(&self.name, self.conditions.clone(), self.weights.clone())
        }
    }
}

pub fn find_dataset<'a>(datasets: &'a [Dataset], wanted: &DatasetRef) -> Option<&'a Dataset> {
    datasets.iter().find(|d| match wanted {
        DatasetRef::Id(id) => d.id == *id,
        DatasetRef::Name(name) => d.name.eq_ignore_ascii_case(name),
    })
}

/// Replay `plan` through `session`, ending on the submit tab.
pub async fn run_plan(session: &mut Session, plan: &Plan) -> Result<(), String> {
    let dataset = find_dataset(&session.state().datasets, &plan.dataset)
        .cloned()
        .ok_or_else(|| format!("unknown dataset {:?}", plan.dataset))?;

    // ── Overview ──
    step(session, Action::Overview(OverviewEdit::Name(plan.name.clone()))).await?;
    step(
        session,
        Action::Overview(OverviewEdit::Description(plan.description.clone())),
    )
    .await?;
    step(
        session,
        Action::Overview(OverviewEdit::Predictions(plan.predictions.clone())),
    )
    .await?;
    step(session, Action::Overview(OverviewEdit::Private(plan.private))).await?;
    step(session, Action::Overview(OverviewEdit::Dataset(dataset.id))).await?;
    if session.state().runs_load || session.state().available_runs.is_empty() {
        return Err(format!("no runs available for dataset '{}'", dataset.name));
    }

    match &plan.task {
        Some(name) => {
            let task = dataset
                .tasks
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| format!("dataset '{}' has no task '{}'", dataset.name, name))?;
            step(session, Action::Overview(OverviewEdit::Task(task.id))).await?;
        }
        None if session.state().draft.task_id.is_none() => {
            return Err(format!(
                "dataset '{}' has several tasks; set `task` in the plan",
                dataset.name
            ));
        }
        None => {}
    }

    let state = session.state();
    let task_id = state.draft.task_id;
    let run_ids: Vec<u64> = state
        .available_runs
        .iter()
        .filter(|r| task_id.map_or(true, |t| r.task == t))
        .filter(|r| {
            plan.subjects.is_empty()
                || r.subject.as_ref().is_some_and(|s| plan.subjects.contains(s))
        })
        .filter(|r| plan.runs.as_ref().map_or(true, |ids| ids.contains(&r.id)))
        .map(|r| r.id)
        .collect();
    if run_ids.is_empty() {
        return Err("no runs match the plan".to_string());
    }
    step(session, Action::Overview(OverviewEdit::Runs(run_ids))).await?;
    navigate(session, Tab::Predictors).await?;

    // ── Predictors ──
    let available = session.state().available_predictors.clone();
    let ids_for = |names: &[String]| -> Result<Vec<u64>, String> {
        let missing: Vec<&str> = names
            .iter()
            .filter(|n| !available.iter().any(|p| &p.name == *n))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(format!("unknown predictors: {}", missing.join(", ")));
        }
        Ok(available
            .iter()
            .filter(|p| names.contains(&p.name))
            .map(|p| p.id)
            .collect())
    };
    let all: Vec<u64> = available.iter().map(|p| p.id).collect();
    let selected = ids_for(&plan.predictors)?;
    step(
        session,
        Action::Predictors(PredictorEdit::Select {
            filtered: all.clone(),
            selected: selected.clone(),
        }),
    )
    .await?;
    navigate(session, Tab::Transformations).await?;

    // ── Transformations ──
    for planned in &plan.transformations {
        let xform = planned.to_transformation()?;
        step(
            session,
            Action::Transformations(TransformationEdit::Begin(xform)),
        )
        .await?;
        step(session, Action::Transformations(TransformationEdit::Commit)).await?;
    }
    navigate(session, Tab::Hrf).await?;

    // ── HRF ──
    let hrf = match &plan.hrf {
        Some(names) => ids_for(names)?,
        None => available
            .iter()
            .filter(|p| selected.contains(&p.id) && !p.is_confound())
            .map(|p| p.id)
            .collect(),
    };
    step(
        session,
        Action::Predictors(PredictorEdit::SelectHrf {
            filtered: all,
            selected: hrf,
        }),
    )
    .await?;
    navigate(session, Tab::Contrasts).await?;

    // ── Contrasts ──
    for planned in &plan.contrasts {
        step(
            session,
            Action::Contrasts(ContrastEdit::Add(planned.to_contrast())),
        )
        .await?;
    }
    if plan.dummy_contrasts {
        step(session, Action::Contrasts(ContrastEdit::GenerateDummy)).await?;
    }
    navigate(session, Tab::Review).await?;
    navigate(session, Tab::Submit).await
}

async fn step(session: &mut Session, action: Action) -> Result<(), String> {
    session.dispatch(action).await.map_err(|e| e.to_string())
}

async fn navigate(session: &mut Session, tab: Tab) -> Result<(), String> {
    step(session, Action::Navigate(Navigation::Goto(tab))).await?;
    tracing::info!(%tab, "plan step");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_by_name_or_id() {
        let plan: Plan = toml::from_str(
            r#"
name = "A"
dataset = 5
predictors = ["face"]
"#,
        )
        .unwrap();
        assert_eq!(plan.dataset, DatasetRef::Id(5));

        let plan: Plan = toml::from_str(
            r#"
name = "A"
dataset = "Budapest"
predictors = ["face"]
"#,
        )
        .unwrap();
        assert_eq!(plan.dataset, DatasetRef::Name("Budapest".into()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<Plan, _> = toml::from_str(
            r#"
name = "A"
dataset = 1
predictors = []
colour = "blue"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn transformation_params_pass_through() {
        let plan: Plan = toml::from_str(
            r#"
name = "A"
dataset = 1
predictors = ["face"]

[[transformations]]
name = "Threshold"
input = ["face"]
Threshold = 0.5
Binarize = true
"#,
        )
        .unwrap();
        let xform = plan.transformations[0].to_transformation().unwrap();
        assert_eq!(xform.params.get("Threshold"), Some(&serde_json::json!(0.5)));
        assert_eq!(xform.params.get("Binarize"), Some(&serde_json::json!(true)));
        assert!(xform.output.is_none());
    }

    #[test]
    fn contrast_type_defaults_to_t() {
        let plan: Plan = toml::from_str(
            r#"
name = "A"
dataset = 1
predictors = ["face"]

[[contrasts]]
name = "c"
conditions = ["face"]
weights = [1]

[[contrasts]]
name = "f"
conditions = ["face"]
weights = [1.0]
type = "F"
"#,
        )
        .unwrap();
        assert_eq!(plan.contrasts[0].to_contrast().contrast_type, ContrastType::T);
        assert_eq!(plan.contrasts[0].to_contrast().weights, vec![1.0]);
        assert_eq!(plan.contrasts[1].to_contrast().contrast_type, ContrastType::F);
    }
}
