mod config;
mod logging;
mod offline;
mod plan;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use neuroscout_client::{
    poll_status, ClientError, FileStore, HttpApi, KeyValueStore, NeuroscoutApi,
    PollHandle, PollOutcome, Session, TOKEN_KEY,
};
use neuroscout_core::wizard::{Action, Notice, NoticeLevel, PredictorEdit};
use neuroscout_core::EditableStatuses;
use neuroscout_interchange::{AnalysisStatus, ApiAnalysis, RunId};
use serde::Serialize;

use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Build, validate and submit Neuroscout analyses.
#[derive(Parser)]
#[command(
    name = "neuroscout",
    version,
    about = "Build, validate and submit Neuroscout analyses"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a neuroscout.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an API token for later commands
    Login {
        /// JWT issued by the Neuroscout API
        token: String,
    },

    /// Forget the stored API token
    Logout,

    /// List datasets
    Datasets {
        /// Include inactive datasets
        #[arg(long)]
        all: bool,
    },

    /// List the runs of a dataset
    Runs {
        /// Dataset id
        dataset: u64,
    },

    /// List predictors available for a set of runs
    Predictors {
        /// Comma-separated run ids
        #[arg(value_delimiter = ',', required = true)]
        runs: Vec<RunId>,
    },

    /// List your analyses
    Analyses,

    /// Show one analysis
    Show {
        /// Analysis hash id
        id: String,
    },

    /// Validate an analysis JSON document
    Validate {
        /// Path to the analysis JSON file
        file: PathBuf,
    },

    /// Print the statistical model for a local analysis snapshot
    Model {
        /// JSON file with `analysis`, `runs`, `predictors` and optional `datasets`
        snapshot: PathBuf,
    },

    /// Create an analysis from a TOML plan
    Create {
        /// Path to the plan file
        plan: PathBuf,
        /// Submit the analysis once it is built
        #[arg(long)]
        submit: bool,
        /// Compile without building the analysis bundle
        #[arg(long)]
        no_build: bool,
        /// Wait for compilation to finish (with --submit)
        #[arg(long)]
        watch: bool,
    },

    /// Submit a saved analysis for compilation
    Submit {
        /// Analysis hash id
        id: String,
        /// Compile without building the analysis bundle
        #[arg(long)]
        no_build: bool,
        /// Wait for compilation to finish
        #[arg(long)]
        watch: bool,
    },

    /// Show the compilation status of an analysis
    Status {
        /// Analysis hash id
        id: String,
        /// Keep polling until compilation finishes
        #[arg(long)]
        watch: bool,
    },

    /// Ask the server to fill in a default model for the selected predictors
    Fill {
        /// Analysis hash id
        id: String,
    },

    /// Show the design-matrix report of an analysis
    Report {
        /// Analysis hash id
        id: String,
        /// Request a fresh report instead of reading the last one
        #[arg(long)]
        generate: bool,
    },

    /// Show the bibliography of an analysis
    Bibliography {
        /// Analysis hash id
        id: String,
    },

    /// Clone an analysis into a new draft
    Clone {
        /// Analysis hash id
        id: String,
    },

    /// Delete a draft or failed analysis
    Delete {
        /// Analysis hash id
        id: String,
    },
}

/// Everything a command needs besides its own arguments.
struct Context {
    config: Config,
    output: OutputFormat,
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let ctx = Context {
        config,
        output: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Login { token } => cmd_login(&ctx, &token),
        Commands::Logout => cmd_logout(&ctx),
        Commands::Datasets { all } => cmd_datasets(&ctx, all),
        Commands::Runs { dataset } => cmd_runs(&ctx, dataset),
        Commands::Predictors { runs } => cmd_predictors(&ctx, &runs),
        Commands::Analyses => cmd_analyses(&ctx),
        Commands::Show { id } => cmd_show(&ctx, &id),
        Commands::Validate { file } => cmd_validate(&ctx, &file),
        Commands::Model { snapshot } => cmd_model(&ctx, &snapshot),
        Commands::Create {
            plan,
            submit,
            no_build,
            watch,
        } => cmd_create(&ctx, &plan, submit, !no_build, watch),
        Commands::Submit {
            id,
            no_build,
            watch,
        } => cmd_submit(&ctx, &id, !no_build, watch),
        Commands::Status { id, watch } => cmd_status(&ctx, &id, watch),
        Commands::Fill { id } => cmd_fill(&ctx, &id),
        Commands::Report { id, generate } => cmd_report(&ctx, &id, generate),
        Commands::Bibliography { id } => cmd_bibliography(&ctx, &id),
        Commands::Clone { id } => cmd_clone(&ctx, &id),
        Commands::Delete { id } => cmd_delete(&ctx, &id),
    }
}

impl Context {
    fn fail(&self, msg: &str) -> ! {
        report_error(msg, self.output, self.quiet);
        process::exit(1);
    }

    fn fail_client(&self, e: &ClientError) -> ! {
        if e.is_unauthorized() {
            self.fail(&format!(
                "{} (run `neuroscout login <token>` first)",
                e
            ));
        }
        self.fail(&e.to_string())
    }

    fn store(&self) -> Arc<FileStore> {
        Arc::new(FileStore::new(self.config.store_path()))
    }

    fn api(&self, store: &dyn KeyValueStore) -> Arc<HttpApi> {
        match HttpApi::from_store(
            &self.config.api.base_url,
            store,
            self.config.api.token.clone(),
        ) {
            Ok(api) => Arc::new(api),
            Err(e) => self.fail(&format!("cannot read stored token: {}", e)),
        }
    }

    fn session(&self) -> Session {
        let store = self.store();
        let api = self.api(store.as_ref());
        Session::new(api, store).with_poll_interval(self.config.poll_interval())
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(future),
            Err(e) => self.fail(&format!("failed to create tokio runtime: {}", e)),
        }
    }

    /// Print `value` as JSON, or run `text` in text mode.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) {
        if self.quiet {
            return;
        }
        match self.output {
            OutputFormat::Json => print_json(value),
            OutputFormat::Text => text(value),
        }
    }

    fn show_notices(&self, notices: &[Notice]) {
        if self.quiet {
            return;
        }
        for notice in notices {
            let label = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Warning => "warning",
                NoticeLevel::Error => "error",
            };
            eprintln!("{}: {}", label, notice.message);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

// ── Account ───────────────────────────────────────────────────────────────────

fn cmd_login(ctx: &Context, token: &str) {
    let store = ctx.store();
    if let Err(e) = store.set(TOKEN_KEY, token.trim()) {
        ctx.fail(&e.to_string());
    }
    ctx.emit(&serde_json::json!({ "logged_in": true }), |_| {
        println!("token stored in {}", store.path().display())
    });
}

fn cmd_logout(ctx: &Context) {
    let store = ctx.store();
    if let Err(e) = store.remove(TOKEN_KEY) {
        ctx.fail(&e.to_string());
    }
    ctx.emit(&serde_json::json!({ "logged_in": false }), |_| {
        println!("logged out")
    });
}

// ── Catalogue ─────────────────────────────────────────────────────────────────

fn cmd_datasets(ctx: &Context, all: bool) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let active_only = ctx.config.api.active_only && !all;
    let datasets = match ctx.block_on(api.datasets(active_only)) {
        Ok(datasets) => datasets,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&datasets, |datasets| {
        for d in datasets {
            let tasks: Vec<&str> = d.tasks.iter().map(|t| t.name.as_str()).collect();
            println!("{}\t{}\t{}", d.id, d.name, tasks.join(","));
        }
    });
}

fn cmd_runs(ctx: &Context, dataset_id: u64) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let runs = match ctx.block_on(api.runs(dataset_id)) {
        Ok(runs) => runs,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&runs, |runs| {
        for r in runs {
            println!(
                "{}\tsub-{}\tses-{}\trun-{}\ttask {}",
                r.id,
                r.subject.as_deref().unwrap_or("?"),
                r.session.as_deref().unwrap_or("-"),
                r.number.map_or("-".to_string(), |n| n.to_string()),
                r.task
            );
        }
    });
}

fn cmd_predictors(ctx: &Context, run_ids: &[RunId]) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let predictors = match ctx.block_on(api.predictors(run_ids)) {
        Ok(predictors) => predictors,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&predictors, |predictors| {
        for p in predictors {
            println!(
                "{}\t{}\t{}",
                p.id,
                p.name,
                p.source.as_deref().unwrap_or("")
            );
        }
    });
}

fn cmd_analyses(ctx: &Context) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let analyses = match ctx.block_on(api.analyses()) {
        Ok(analyses) => analyses,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&analyses, |analyses| {
        for a in analyses {
            println!(
                "{}\t{}\t{}",
                a.hash_id.as_deref().unwrap_or("-"),
                a.status,
                a.name
            );
        }
    });
}

fn cmd_show(ctx: &Context, id: &str) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let analysis = match ctx.block_on(api.get_analysis(id)) {
        Ok(analysis) => analysis,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&analysis, print_analysis);
}

fn print_analysis(a: &ApiAnalysis) {
    println!("{} ({})", a.name, a.hash_id.as_deref().unwrap_or("unsaved"));
    println!("  status:          {}", a.status);
    if let Some(dataset) = a.dataset_id {
        println!("  dataset:         {}", dataset);
    }
    println!("  runs:            {}", a.runs.len());
    println!("  predictors:      {}", a.predictors.len());
    let xforms: Vec<&str> = a.transformations.iter().map(|t| t.name.as_str()).collect();
    println!("  transformations: {}", xforms.join(", "));
    let contrasts: Vec<&str> = a.contrasts.iter().map(|c| c.name.as_str()).collect();
    println!("  contrasts:       {}", contrasts.join(", "));
    if let Some(modified) = &a.modified_at {
        println!("  modified:        {}", modified);
    }
    if let Some(traceback) = &a.traceback {
        println!("  traceback:\n{}", traceback);
    }
}

// ── Offline ───────────────────────────────────────────────────────────────────

fn cmd_validate(ctx: &Context, file: &Path) {
    let doc = match offline::read_json(file) {
        Ok(doc) => doc,
        Err(e) => ctx.fail(&e),
    };
    let report = match offline::validate_analysis(&doc) {
        Ok(report) => report,
        Err(e) => ctx.fail(&e),
    };

    if report.is_valid() {
        let json = serde_json::json!({
            "valid": true,
            "ready": report.problems.is_empty(),
            "problems": report.problems,
        });
        ctx.emit(&json, |_| {
            println!("valid");
            for problem in &report.problems {
                println!("  not ready: {}", problem);
            }
        });
    } else {
        match ctx.output {
            OutputFormat::Text => {
                if !ctx.quiet {
                    eprintln!("invalid analysis");
                    for err in &report.errors {
                        eprintln!("  - {}", err);
                    }
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": false,
                    "errors": report.errors,
                });
                print_json(&json);
            }
        }
        process::exit(1);
    }
}

fn cmd_model(ctx: &Context, file: &Path) {
    let snapshot = match offline::read_json(file) {
        Ok(doc) => doc,
        Err(e) => ctx.fail(&e),
    };
    match offline::model_from_snapshot(&snapshot) {
        Ok(model) => print_json(&model),
        Err(e) => ctx.fail(&e),
    }
}

// ── Wizard ────────────────────────────────────────────────────────────────────

fn cmd_create(ctx: &Context, plan_path: &Path, submit: bool, build: bool, watch: bool) {
    let plan = match plan::read_plan(plan_path) {
        Ok(plan) => plan,
        Err(e) => ctx.fail(&e),
    };
    let mut session = ctx.session();

    let result = ctx.block_on(async {
        session
            .load_datasets(false)
            .await
            .map_err(|e| e.to_string())?;
        plan::run_plan(&mut session, &plan).await?;
        ctx.show_notices(&session.take_notices());
        if submit {
            submit_analysis(ctx, &mut session, build, watch).await?;
        }
        Ok::<(), String>(())
    });
    ctx.show_notices(&session.take_notices());
    if let Err(e) = result {
        ctx.fail(&e);
    }
    print_outcome(ctx, &session);
}

fn cmd_submit(ctx: &Context, id: &str, build: bool, watch: bool) {
    let mut session = ctx.session();
    let result = ctx.block_on(async {
        session
            .load_datasets(false)
            .await
            .map_err(|e| e.to_string())?;
        session.open(id).await.map_err(|e| e.to_string())?;
        submit_analysis(ctx, &mut session, build, watch).await
    });
    ctx.show_notices(&session.take_notices());
    if let Err(e) = result {
        ctx.fail(&e);
    }
    print_outcome(ctx, &session);
}

/// Submit the session's analysis and optionally wait for the result.
async fn submit_analysis(
    ctx: &Context,
    session: &mut Session,
    build: bool,
    watch: bool,
) -> Result<(), String> {
    session
        .dispatch(Action::Submit { build })
        .await
        .map_err(|e| e.messages().join("; "))?;

    let status = session.state().draft.status;
    if !status.is_in_progress() && status != AnalysisStatus::Passed {
        let notices = session.take_notices();
        ctx.show_notices(&notices);
        return Err(notices
            .iter()
            .rev()
            .find(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message.clone())
            .unwrap_or_else(|| "submission failed".to_string()));
    }
    if !watch {
        return Ok(());
    }

    cancel_on_interrupt(session.poll_handle());
    match session.watch().await.map_err(|e| e.to_string())? {
        Some(PollOutcome::Cancelled) => {
            if !ctx.quiet {
                eprintln!("stopped watching; the analysis keeps compiling");
            }
        }
        Some(PollOutcome::Finished(_)) | None => {}
    }
    Ok(())
}

fn print_outcome(ctx: &Context, session: &Session) {
    let state = session.state();
    let json = serde_json::json!({
        "id": state.draft.analysis_id,
        "name": state.draft.name,
        "status": state.draft.status,
        "tab": state.tab.as_str(),
    });
    ctx.emit(&json, |_| {
        println!(
            "{} {} ({}, at {})",
            state.draft.analysis_id.as_deref().unwrap_or("unsaved"),
            state.draft.name,
            state.draft.status,
            state.tab
        );
    });
    if state.draft.status == AnalysisStatus::Failed {
        process::exit(1);
    }
}

fn cmd_status(ctx: &Context, id: &str, watch: bool) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());

    let result = ctx.block_on(async {
        let analysis = api.get_analysis(id).await?;
        if !watch || !analysis.status.is_in_progress() {
            return Ok(PollOutcome::Finished(analysis));
        }
        let handle = PollHandle::new();
        cancel_on_interrupt(handle.clone());
        let generation = handle.begin();
        let mut last = analysis.status;
        poll_status(
            api.as_ref(),
            id,
            &handle,
            generation,
            ctx.config.poll_interval(),
            |update| {
                if update.status != last && !ctx.quiet && ctx.output == OutputFormat::Text {
                    eprintln!("{}: {}", id, update.status);
                }
                last = update.status;
            },
        )
        .await
    });

    match result {
        Ok(PollOutcome::Finished(analysis)) => {
            let json = serde_json::json!({
                "id": id,
                "status": analysis.status,
                "traceback": analysis.traceback,
            });
            ctx.emit(&json, |_| {
                println!("{}", analysis.status);
                if let Some(traceback) = &analysis.traceback {
                    println!("{}", traceback);
                }
            });
            if watch && analysis.status == AnalysisStatus::Failed {
                process::exit(1);
            }
        }
        Ok(PollOutcome::Cancelled) => {
            if !ctx.quiet {
                eprintln!("stopped watching");
            }
        }
        Err(e) => ctx.fail_client(&e),
    }
}

fn cmd_fill(ctx: &Context, id: &str) {
    let mut session = ctx.session();
    let result = ctx.block_on(async {
        session
            .load_datasets(false)
            .await
            .map_err(|e| e.to_string())?;
        session.open(id).await.map_err(|e| e.to_string())?;
        session
            .dispatch(Action::Predictors(PredictorEdit::Fill))
            .await
            .map_err(|e| e.messages().join("; "))
    });
    let notices = session.take_notices();
    ctx.show_notices(&notices);
    if let Err(e) = result {
        ctx.fail(&e);
    }
    if notices.iter().any(|n| n.level == NoticeLevel::Error) {
        process::exit(1);
    }
    let filled = neuroscout_client::snapshot(session.state());
    ctx.emit(&filled, print_analysis);
}

// ── Artifacts ─────────────────────────────────────────────────────────────────

fn cmd_report(ctx: &Context, id: &str, generate: bool) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let report = ctx.block_on(async {
        if generate {
            api.generate_report(id).await
        } else {
            api.report(id).await
        }
    });
    let report = match report {
        Ok(report) => report,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&report, |report| {
        println!("{}", report.status);
        if let Some(at) = &report.generated_at {
            println!("  generated: {}", at);
        }
        if let Some(traceback) = &report.traceback {
            println!("{}", traceback);
        }
    });
}

fn cmd_bibliography(ctx: &Context, id: &str) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let bibliography = match ctx.block_on(api.bibliography(id)) {
        Ok(bibliography) => bibliography,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&bibliography, |b| {
        for (title, entries) in [
            ("Tools", &b.tools),
            ("Data", &b.data),
            ("Feature extraction", &b.extraction),
        ] {
            if entries.is_empty() {
                continue;
            }
            println!("{}:", title);
            for entry in entries {
                println!("  {}", entry);
            }
        }
    });
}

fn cmd_clone(ctx: &Context, id: &str) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let cloned = match ctx.block_on(api.clone_analysis(id)) {
        Ok(cloned) => cloned,
        Err(e) => ctx.fail_client(&e),
    };
    ctx.emit(&cloned, |a| {
        println!("{}", a.hash_id.as_deref().unwrap_or("-"))
    });
}

fn cmd_delete(ctx: &Context, id: &str) {
    let store = ctx.store();
    let api = ctx.api(store.as_ref());
    let result = ctx.block_on(async {
        let analysis = api.get_analysis(id).await?;
        if !EditableStatuses::default().contains(analysis.status) {
            return Ok(Some(analysis.status));
        }
        api.delete_analysis(id).await.map(|_| None)
    });
    match result {
        Ok(None) => ctx.emit(&serde_json::json!({ "deleted": id }), |_| {
            println!("deleted {}", id)
        }),
        Ok(Some(status)) => ctx.fail(&format!(
            "analysis {} is {}; only draft or failed analyses can be deleted",
            id, status
        )),
        Err(e) => ctx.fail_client(&e),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Stop `handle`'s polling on Ctrl-C. Must run inside the runtime.
fn cancel_on_interrupt(handle: PollHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
}

/// Report an error message to stderr in the appropriate format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
