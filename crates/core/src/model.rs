//! Model builder: derives the backend statistical model from a draft.

use std::collections::BTreeSet;

use neuroscout_interchange::{
    ContrastType, Dataset, DummyContrasts, ModelDocument, ModelInput, ModelStep, Predictor, Run,
    StepLevel, StepModel, TaskId,
};

use crate::draft::AnalysisDraft;
use crate::selection::names_for;
use crate::transform::{synthesize_convolve, with_convolve};

/// Build the three-level model document for `draft`.
///
/// Pure: the same inputs always give the same document. Selected ids that
/// do not appear in `runs` / `predictors` are skipped.
pub fn build_model(
    draft: &AnalysisDraft,
    runs: &[Run],
    predictors: &[Predictor],
    datasets: &[Dataset],
) -> ModelDocument {
    let selected_runs: Vec<&Run> = runs
        .iter()
        .filter(|r| draft.run_ids.contains(&r.id))
        .collect();

    let numbers: BTreeSet<u32> = selected_runs.iter().filter_map(|r| r.number).collect();
    let sessions: BTreeSet<String> = selected_runs.iter().filter_map(|r| r.session.clone()).collect();
    let subjects: BTreeSet<String> = selected_runs.iter().filter_map(|r| r.subject.clone()).collect();

    let input = ModelInput {
        run: numbers.into_iter().collect(),
        session: sessions.into_iter().collect(),
        subject: subjects.into_iter().collect(),
        task: resolve_task_name(draft, &selected_runs, datasets)
            .into_iter()
            .collect(),
    };

    let x = names_for(&draft.predictor_ids, predictors);
    let convolve = synthesize_convolve(&names_for(&draft.hrf_predictor_ids, predictors));

    let run_step = ModelStep {
        level: StepLevel::Run,
        transformations: with_convolve(&draft.transformations, convolve),
        contrasts: draft.contrasts.clone(),
        model: Some(StepModel { x }),
        dummy_contrasts: None,
    };

    ModelDocument {
        name: draft.name.clone(),
        description: draft.description.clone(),
        input,
        steps: vec![
            run_step,
            dummy_step(StepLevel::Subject, ContrastType::Fema),
            dummy_step(StepLevel::Dataset, ContrastType::T),
        ],
    }
}

fn dummy_step(level: StepLevel, contrast_type: ContrastType) -> ModelStep {
    ModelStep {
        level,
        transformations: Vec::new(),
        contrasts: Vec::new(),
        model: None,
        dummy_contrasts: Some(DummyContrasts { contrast_type }),
    }
}

/// The task name for the draft's dataset. Without an explicit task the
/// selected runs decide, provided they agree on one.
fn resolve_task_name(draft: &AnalysisDraft, selected: &[&Run], datasets: &[Dataset]) -> Option<String> {
    let dataset = datasets.iter().find(|d| Some(d.id) == draft.dataset_id)?;
    let task_id = draft.task_id.or_else(|| single_task(selected))?;
    dataset.task(task_id).map(|t| t.name.clone())
}

fn single_task(selected: &[&Run]) -> Option<TaskId> {
    let tasks: BTreeSet<TaskId> = selected.iter().map(|r| r.task).collect();
    match tasks.len() {
        1 => tasks.into_iter().next(),
        _ => None,
    }
}
