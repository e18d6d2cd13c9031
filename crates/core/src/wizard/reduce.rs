//! The wizard reducer: applies one action to the state and returns the
//! effects its driver should run.

use std::collections::BTreeSet;

use neuroscout_interchange::{AnalysisStatus, ApiAnalysis, Contrast, RunId, Transformation};

use crate::contrast::{generate_dummy_contrasts, validate_contrast};
use crate::draft::AnalysisDraft;
use crate::list;
use crate::selection::{apply_hrf_selection, apply_predictor_selection, reconcile_available};
use crate::transform::{is_convolve, orthogonalize_overlap, validate_xform};

use super::action::{
    Action, ContrastEdit, Effect, Navigation, Notice, OverviewEdit, PredictorEdit, Request,
    RuntimeEvent, TransformationEdit,
};
use super::state::{ActiveTransformation, WizardState};
use super::tab::Tab;
use super::WizardError;

/// Apply `action` to `state`.
///
/// A rejected user action leaves the draft unchanged (apart from an open
/// transformation committed on the way) and stores its messages in
/// `state.errors`. Runtime events never fail; stale responses are dropped.
pub fn reduce(state: &mut WizardState, action: Action) -> Result<Vec<Effect>, WizardError> {
    let result = match action {
        Action::Runtime(event) => return Ok(reduce_runtime(state, event)),
        Action::CancelPolling => {
            state.tickets.issue_poll();
            return Ok(vec![Effect::StopPolling]);
        }
        Action::Navigate(nav) => navigate(state, nav),
        Action::Overview(edit) => ensure_editable(state).and_then(|_| overview(state, edit)),
        Action::Predictors(edit) => ensure_editable(state).and_then(|_| predictors(state, edit)),
        Action::Transformations(edit) => {
            ensure_editable(state).and_then(|_| transformations(state, edit))
        }
        Action::Contrasts(edit) => ensure_editable(state).and_then(|_| contrasts(state, edit)),
        Action::Submit { build } => ensure_editable(state).and_then(|_| submit(state, build)),
    };

    state.errors = match &result {
        Ok(_) => Vec::new(),
        Err(e) => e.messages(),
    };
    result
}

fn ensure_editable(state: &WizardState) -> Result<(), WizardError> {
    if state.is_editable() {
        Ok(())
    } else {
        Err(WizardError::NotEditable(state.draft.status))
    }
}

// ──────────────────────────────────────────────
// Overview
// ──────────────────────────────────────────────

fn overview(state: &mut WizardState, edit: OverviewEdit) -> Result<Vec<Effect>, WizardError> {
    match edit {
        OverviewEdit::Name(name) => state.draft.name = name,
        OverviewEdit::Description(text) => state.draft.description = text,
        OverviewEdit::Predictions(text) => state.draft.predictions = text,
        OverviewEdit::Private(private) => state.draft.private = private,
        OverviewEdit::Dataset(dataset_id) => {
            if state.draft.dataset_id == Some(dataset_id) {
                return Ok(Vec::new());
            }
            state.draft.set_dataset(dataset_id);
            state.available_runs.clear();
            state.available_predictors.clear();
            state.active_transformation = None;
            state.pending_hrf_names = None;
            state.model = None;
            state.tickets.issue_predictors();
            state.predictors_load = false;
            state.unsaved = true;
            return Ok(vec![request_runs(state, dataset_id)]);
        }
        OverviewEdit::Task(task_id) => {
            if state.draft.task_id != Some(task_id) {
                state.draft.task_id = Some(task_id);
                state.unsaved = true;
            }
            let runs = allowed_runs(state, &state.draft.run_ids);
            return Ok(change_runs(state, runs));
        }
        OverviewEdit::Runs(ids) => {
            let runs = allowed_runs(state, &ids);
            return Ok(change_runs(state, runs));
        }
    }
    state.unsaved = true;
    Ok(Vec::new())
}

/// `ids` restricted to loaded runs of the selected task, deduplicated.
fn allowed_runs(state: &WizardState, ids: &[RunId]) -> Vec<RunId> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .copied()
        .filter(|id| {
            state.available_runs.iter().any(|r| {
                r.id == *id && state.draft.task_id.map_or(true, |task| r.task == task)
            })
        })
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Replace the run selection, refetching predictors when it changed.
fn change_runs(state: &mut WizardState, run_ids: Vec<RunId>) -> Vec<Effect> {
    let before: BTreeSet<RunId> = state.draft.run_ids.iter().copied().collect();
    let after: BTreeSet<RunId> = run_ids.iter().copied().collect();
    state.draft.run_ids = run_ids;
    if before == after {
        return Vec::new();
    }
    state.unsaved = true;

    if state.draft.run_ids.is_empty() {
        state.tickets.issue_predictors();
        state.predictors_load = false;
        state.available_predictors.clear();
        reconcile_available(&mut state.draft, &[]);
        return Vec::new();
    }
    vec![request_predictors(state)]
}

fn request_runs(state: &mut WizardState, dataset_id: u64) -> Effect {
    state.runs_load = true;
    Effect::FetchRuns {
        dataset_id,
        ticket: state.tickets.issue_runs(),
    }
}

fn request_predictors(state: &mut WizardState) -> Effect {
    state.predictors_load = true;
    Effect::FetchPredictors {
        run_ids: state.draft.run_ids.clone(),
        ticket: state.tickets.issue_predictors(),
    }
}

// ──────────────────────────────────────────────
// Predictors
// ──────────────────────────────────────────────

fn predictors(state: &mut WizardState, edit: PredictorEdit) -> Result<Vec<Effect>, WizardError> {
    match edit {
        PredictorEdit::Select { filtered, selected } => {
            ensure_catalogue(state)?;
            apply_predictor_selection(
                &mut state.draft,
                &state.available_predictors,
                &filtered,
                &selected,
            );
        }
        PredictorEdit::SelectHrf { filtered, selected } => {
            ensure_catalogue(state)?;
            apply_hrf_selection(&mut state.draft, &filtered, &selected);
        }
        PredictorEdit::Configure {
            predictor_id,
            config,
        } => {
            if !state.draft.predictor_ids.contains(&predictor_id) {
                return Err(WizardError::PredictorNotSelected(predictor_id));
            }
            state
                .draft
                .config
                .predictor_configs
                .insert(predictor_id, config);
        }
        PredictorEdit::Fill => {
            let analysis_id = state
                .draft
                .analysis_id
                .clone()
                .ok_or(WizardError::NotSaved)?;
            return Ok(vec![Effect::Fill {
                analysis_id,
                predictor_ids: state.draft.predictor_ids.clone(),
            }]);
        }
    }
    state.unsaved = true;
    Ok(Vec::new())
}

/// Selection edits need the catalogue for the current runs.
fn ensure_catalogue(state: &WizardState) -> Result<(), WizardError> {
    if state.predictors_load
        || state.available_predictors.is_empty()
        || state.pending_hrf_names.is_some()
    {
        return Err(WizardError::PredictorsLoading);
    }
    Ok(())
}

/// Whether every selected predictor can be named from the catalogue. Until
/// then a serialized draft would lose its model columns and HRF step.
fn catalogue_resolved(state: &WizardState) -> bool {
    state.pending_hrf_names.is_none()
        && state
            .draft
            .predictor_ids
            .iter()
            .all(|id| state.available_predictors.iter().any(|p| p.id == *id))
}

// ──────────────────────────────────────────────
// Transformations
// ──────────────────────────────────────────────

fn reject_convolve(xform: &Transformation) -> Result<(), WizardError> {
    if is_convolve(xform) {
        Err(WizardError::ManagedTransformation)
    } else {
        Ok(())
    }
}

fn ensure_no_open_entry(state: &WizardState) -> Result<(), WizardError> {
    match &state.active_transformation {
        Some(active) if active.index.is_some() => Err(WizardError::EditInProgress),
        _ => Ok(()),
    }
}

fn transformations(
    state: &mut WizardState,
    edit: TransformationEdit,
) -> Result<Vec<Effect>, WizardError> {
    let items = &state.draft.transformations;
    let updated = match edit {
        TransformationEdit::Begin(xform) => {
            reject_convolve(&xform)?;
            state.active_transformation = Some(ActiveTransformation { index: None, xform });
            return Ok(Vec::new());
        }
        TransformationEdit::Open(index) => {
            let xform = items
                .get(index)
                .cloned()
                .ok_or(WizardError::NoSuchItem(index))?;
            state.active_transformation = Some(ActiveTransformation {
                index: Some(index),
                xform,
            });
            return Ok(Vec::new());
        }
        TransformationEdit::Update(xform) => {
            reject_convolve(&xform)?;
            match &mut state.active_transformation {
                Some(active) => active.xform = xform,
                None => {
                    state.active_transformation = Some(ActiveTransformation { index: None, xform })
                }
            }
            return Ok(Vec::new());
        }
        TransformationEdit::Commit => {
            commit_active(state)?;
            return Ok(Vec::new());
        }
        TransformationEdit::Discard => {
            state.active_transformation = None;
            return Ok(Vec::new());
        }
        TransformationEdit::Remove(index) => {
            ensure_no_open_entry(state)?;
            if index >= items.len() {
                return Err(WizardError::NoSuchItem(index));
            }
            list::remove_at(items, index)
        }
        TransformationEdit::Move(index, direction) => {
            ensure_no_open_entry(state)?;
            list::move_item(items, index, direction)
        }
        TransformationEdit::Reorder { from, to } => {
            ensure_no_open_entry(state)?;
            list::reorder(items, from, to)
        }
    };

    if updated != state.draft.transformations {
        state.draft.transformations = updated;
        state.unsaved = true;
    }
    Ok(Vec::new())
}

/// Validate the open transformation and put it into the list. Nothing open
/// is not an error.
fn commit_active(state: &mut WizardState) -> Result<(), WizardError> {
    let Some(active) = state.active_transformation.as_ref() else {
        return Ok(());
    };

    let mut errors = validate_xform(&active.xform);
    let overlap = orthogonalize_overlap(&active.xform);
    if !overlap.is_empty() {
        errors.push(format!(
            "Cannot orthogonalize {} with respect to itself",
            overlap.join(", ")
        ));
    }
    if !errors.is_empty() {
        return Err(WizardError::InvalidTransformation(errors));
    }

    let items = &state.draft.transformations;
    state.draft.transformations = match active.index {
        Some(index) if index < items.len() => list::replace_at(items, index, active.xform.clone()),
        _ => list::append(items, active.xform.clone()),
    };
    state.active_transformation = None;
    state.unsaved = true;
    Ok(())
}

// ──────────────────────────────────────────────
// Contrasts
// ──────────────────────────────────────────────

fn check_contrast(contrast: &Contrast) -> Result<(), WizardError> {
    let errors = validate_contrast(contrast);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WizardError::InvalidContrast(errors))
    }
}

fn contrasts(state: &mut WizardState, edit: ContrastEdit) -> Result<Vec<Effect>, WizardError> {
    let items = &state.draft.contrasts;
    let updated = match edit {
        ContrastEdit::Add(contrast) => {
            check_contrast(&contrast)?;
            list::append(items, contrast)
        }
        ContrastEdit::Replace(index, contrast) => {
            check_contrast(&contrast)?;
            if index >= items.len() {
                return Err(WizardError::NoSuchItem(index));
            }
            list::replace_at(items, index, contrast)
        }
        ContrastEdit::Remove(index) => {
            if index >= items.len() {
                return Err(WizardError::NoSuchItem(index));
            }
            list::remove_at(items, index)
        }
        ContrastEdit::Move(index, direction) => list::move_item(items, index, direction),
        ContrastEdit::Reorder { from, to } => list::reorder(items, from, to),
        ContrastEdit::GenerateDummy => {
            let selected = state.selected_predictors();
            generate_dummy_contrasts(&state.draft.contrasts, &selected)
        }
    };

    if updated != state.draft.contrasts {
        state.draft.contrasts = updated;
        state.unsaved = true;
    }
    Ok(Vec::new())
}

// ──────────────────────────────────────────────
// Navigation & submission
// ──────────────────────────────────────────────

fn navigate(state: &mut WizardState, nav: Navigation) -> Result<Vec<Effect>, WizardError> {
    let current = state.tab;
    let target = match nav {
        Navigation::Next => current.next(),
        Navigation::Previous => current.prev(),
        Navigation::Goto(tab) => Some(tab),
    };
    let Some(target) = target else {
        return Ok(Vec::new());
    };
    if target == current {
        return Ok(Vec::new());
    }

    let editable = state.is_editable();
    if target.is_editing() != editable {
        return Err(WizardError::TabUnavailable(target));
    }
    if !editable {
        state.tab = target;
        return Ok(Vec::new());
    }

    if state.draft.name.trim().is_empty() {
        return Err(WizardError::NameRequired);
    }
    if target.is_past(Tab::Contrasts)
        && !current.is_past(Tab::Contrasts)
        && state.draft.contrasts.is_empty()
        && !state.resumed_past_contrasts
    {
        return Err(WizardError::ContrastRequired);
    }
    if current == Tab::Transformations {
        commit_active(state)?;
    }

    state.tab = target;
    if !target.is_past(Tab::Contrasts) {
        state.resumed_past_contrasts = false;
    }
    if target == Tab::Review {
        state.model = Some(state.build_model());
    }

    let mut effects = Vec::new();
    // Unresolved predictors stay unsaved until their catalogue arrives.
    if state.unsaved && catalogue_resolved(state) {
        effects.push(save_effect(state));
    }
    if let Some(analysis_id) = &state.draft.analysis_id {
        effects.push(Effect::StoreBookmark {
            analysis_id: analysis_id.clone(),
            tab: target,
        });
    }
    Ok(effects)
}

fn save_effect(state: &mut WizardState) -> Effect {
    state.unsaved = false;
    let model = state.build_model();
    Effect::Save(state.draft.to_api(&state.available_predictors, Some(model)))
}

fn submit(state: &mut WizardState, build: bool) -> Result<Vec<Effect>, WizardError> {
    commit_active(state)?;
    if !catalogue_resolved(state) {
        return Err(WizardError::PredictorsLoading);
    }
    let errors = state.draft.submit_errors();
    if !errors.is_empty() {
        return Err(WizardError::NotReady(errors));
    }

    let save = save_effect(state);
    state.draft.status = AnalysisStatus::Submitting;
    state.draft.traceback = None;
    sync_tab(state);
    Ok(vec![save, Effect::Compile { build }])
}

/// Keep the tab on the path that matches the draft's editability.
fn sync_tab(state: &mut WizardState) {
    let editable = state.is_editable();
    if editable && !state.tab.is_editing() {
        state.tab = Tab::Submit;
    } else if !editable && state.tab.is_editing() {
        state.tab = Tab::Summary;
        state.active_transformation = None;
    }
}

// ──────────────────────────────────────────────
// Runtime events
// ──────────────────────────────────────────────

fn reduce_runtime(state: &mut WizardState, event: RuntimeEvent) -> Vec<Effect> {
    match event {
        RuntimeEvent::DatasetsLoaded(datasets) => {
            state.datasets = datasets;
            infer_task(state);
            Vec::new()
        }
        RuntimeEvent::AnalysisLoaded { analysis, bookmark } => load_analysis(state, analysis, bookmark),
        RuntimeEvent::RunsLoaded { ticket, runs } => {
            if ticket != state.tickets.runs {
                return Vec::new();
            }
            state.runs_load = false;
            state.available_runs = runs;
            infer_task(state);
            let allowed = allowed_runs(state, &state.draft.run_ids);
            let effects = change_runs(state, allowed);
            refresh_review_model(state);
            effects
        }
        RuntimeEvent::PredictorsLoaded { ticket, predictors } => {
            if ticket != state.tickets.predictors {
                return Vec::new();
            }
            state.predictors_load = false;
            state.available_predictors = predictors;
            if let Some(names) = state.pending_hrf_names.take() {
                resolve_hrf_names(state, &names);
            }
            let before = state.draft.clone();
            reconcile_available(&mut state.draft, &state.available_predictors);
            if state.draft != before {
                state.unsaved = true;
            }
            refresh_review_model(state);
            Vec::new()
        }
        RuntimeEvent::Saved(analysis) => saved(state, analysis),
        RuntimeEvent::Compiled(analysis) => compiled(state, analysis),
        RuntimeEvent::Filled(analysis) => filled(state, analysis),
        RuntimeEvent::StatusPolled { ticket, analysis } => {
            if ticket != state.tickets.poll {
                return Vec::new();
            }
            status_polled(state, analysis)
        }
        RuntimeEvent::Failed { request, message } => failed(state, request, message),
    }
}

fn load_analysis(state: &mut WizardState, analysis: ApiAnalysis, bookmark: Option<Tab>) -> Vec<Effect> {
    let (draft, hrf_names) = AnalysisDraft::from_api(analysis);
    state.draft = draft;
    state.pending_hrf_names = (!hrf_names.is_empty()).then_some(hrf_names);
    state.available_runs.clear();
    state.available_predictors.clear();
    state.active_transformation = None;
    state.model = None;
    state.errors.clear();
    state.unsaved = false;

    let editable = state.is_editable();
    state.tab = match bookmark {
        Some(tab) if tab.is_editing() == editable => tab,
        _ if editable => Tab::Overview,
        _ => Tab::Summary,
    };
    state.resumed_past_contrasts = editable && state.tab.is_past(Tab::Contrasts);

    let mut effects = Vec::new();
    if let Some(dataset_id) = state.draft.dataset_id {
        effects.push(request_runs(state, dataset_id));
    }
    if state.draft.run_ids.is_empty() {
        state.tickets.issue_predictors();
        state.predictors_load = false;
    } else {
        effects.push(request_predictors(state));
    }
    if !editable && state.draft.status.is_in_progress() {
        if let Some(analysis_id) = state.draft.analysis_id.clone() {
            effects.push(Effect::StartPolling {
                analysis_id,
                ticket: state.tickets.issue_poll(),
            });
        }
    }
    effects
}

/// Pick the task when it is unambiguous: the selected runs share one, or
/// the dataset only has one.
fn infer_task(state: &mut WizardState) {
    if state.draft.task_id.is_some() {
        return;
    }
    let from_runs: BTreeSet<u64> = state
        .available_runs
        .iter()
        .filter(|r| state.draft.run_ids.contains(&r.id))
        .map(|r| r.task)
        .collect();
    if from_runs.len() == 1 {
        state.draft.task_id = from_runs.into_iter().next();
        return;
    }
    if let Some(dataset) = state.dataset() {
        if dataset.tasks.len() == 1 {
            state.draft.task_id = Some(dataset.tasks[0].id);
        }
    }
}

fn resolve_hrf_names(state: &mut WizardState, names: &[String]) {
    state
        .draft
        .resolve_hrf_names(names, &state.available_predictors);
}

fn refresh_review_model(state: &mut WizardState) {
    if state.tab == Tab::Review {
        state.model = Some(state.build_model());
    }
}

fn saved(state: &mut WizardState, analysis: ApiAnalysis) -> Vec<Effect> {
    let mut effects = Vec::new();
    let had_id = state.draft.analysis_id.is_some();
    if let Some(id) = analysis.hash_id.as_deref() {
        if !state.draft.assign_id(id) {
            effects.push(Effect::Notify(Notice::warning(format!(
                "server returned analysis '{}' while editing '{}'",
                id,
                state.draft.analysis_id.as_deref().unwrap_or_default()
            ))));
        } else if !had_id {
            effects.push(Effect::StoreBookmark {
                analysis_id: id.to_string(),
                tab: state.tab,
            });
        }
    }
    state.draft.modified_at = analysis.modified_at;
    if state.draft.status != AnalysisStatus::Submitting {
        state.draft.status = analysis.status;
        sync_tab(state);
    }
    effects
}

fn compiled(state: &mut WizardState, analysis: ApiAnalysis) -> Vec<Effect> {
    state.draft.status = analysis.status;
    state.draft.traceback = analysis.traceback;
    sync_tab(state);

    let mut effects = vec![Effect::Notify(Notice::info(
        "analysis submitted for compilation",
    ))];
    if state.draft.status.is_in_progress() {
        if let Some(analysis_id) = state.draft.analysis_id.clone() {
            effects.push(Effect::StartPolling {
                analysis_id,
                ticket: state.tickets.issue_poll(),
            });
        }
    }
    effects
}

fn status_polled(state: &mut WizardState, analysis: ApiAnalysis) -> Vec<Effect> {
    let previous = state.draft.status;
    state.draft.status = analysis.status;
    state.draft.traceback = analysis.traceback;
    state.draft.modified_at = analysis.modified_at;
    sync_tab(state);

    if previous == state.draft.status {
        return Vec::new();
    }
    match state.draft.status {
        AnalysisStatus::Passed => vec![Effect::Notify(Notice::info("analysis compiled successfully"))],
        AnalysisStatus::Failed => vec![Effect::Notify(Notice::error(
            "analysis compilation failed; see the traceback",
        ))],
        _ => Vec::new(),
    }
}

fn filled(state: &mut WizardState, analysis: ApiAnalysis) -> Vec<Effect> {
    let (filled, hrf_names) = AnalysisDraft::from_api(analysis);
    state.draft.predictor_ids = filled.predictor_ids;
    state.draft.transformations = filled.transformations;
    state.draft.contrasts = filled.contrasts;
    state.draft.config = filled.config;
    if !hrf_names.is_empty() {
        resolve_hrf_names(state, &hrf_names);
    }
    reconcile_available(&mut state.draft, &state.available_predictors);
    state.unsaved = true;
    vec![Effect::Notify(Notice::info("model filled from selected predictors"))]
}

fn failed(state: &mut WizardState, request: Request, message: String) -> Vec<Effect> {
    match request {
        Request::Runs(ticket) => {
            if ticket != state.tickets.runs {
                return Vec::new();
            }
            state.runs_load = false;
        }
        Request::Predictors(ticket) => {
            if ticket != state.tickets.predictors {
                return Vec::new();
            }
            state.predictors_load = false;
        }
        Request::Poll(ticket) => {
            if ticket != state.tickets.poll {
                return Vec::new();
            }
        }
        Request::Save => {
            state.unsaved = true;
            revert_submission(state);
        }
        Request::Compile => revert_submission(state),
        Request::Datasets | Request::Analysis | Request::Fill => {}
    }
    vec![Effect::Notify(Notice::error(format!(
        "{} failed: {}",
        request.label(),
        message
    )))]
}

fn revert_submission(state: &mut WizardState) {
    if state.draft.status == AnalysisStatus::Submitting {
        state.draft.status = AnalysisStatus::Draft;
        sync_tab(state);
    }
}
