//! Subcommand implementations.
//!
//! Every tab command opens a session, applies at most one change, waits for
//! the draft to reach the remote draft folder and prints the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use tabmap_cli::config::{CliConfig, load_config};
use tabmap_cli::source::CsvSheetSource;
use tabmap_map::closest_fields;
use tabmap_model::{FieldSchema, Phase};
use tabmap_session::{
    CachedSheetSource, JsonDraftDir, JsonMappingRepository, MappingSession, SessionBackends,
    SessionError, SystemClock, TokioScheduler,
};

use crate::cli::{
    AuthorityArgs, CategorizeArgs, Cli, ColumnArgs, Command, FieldArgs, FieldsArgs,
    HeaderRowArgs, TabArgs,
};
use crate::render::{print_fields, print_match_report, print_store};

type FileBackends = SessionBackends<JsonDraftDir, JsonDraftDir, JsonMappingRepository>;
type FileSession =
    MappingSession<JsonDraftDir, JsonDraftDir, JsonMappingRepository, TokioScheduler, SystemClock>;

/// Settings shared by every subcommand.
pub struct Context {
    config: CliConfig,
    schema: FieldSchema,
    backends: FileBackends,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = load_config(cli.config.as_deref());
        if let Some(dir) = &cli.state_dir {
            config.state_dir = Some(dir.clone());
        }
        if let Some(path) = &cli.schema {
            config.schema = Some(path.clone());
        }

        let schema = match &config.schema {
            Some(path) => load_schema(path)?,
            None => FieldSchema::builtin(),
        };

        let state_dir = config.resolved_state_dir();
        tracing::debug!(state_dir = %state_dir.display(), "using state directory");
        let backends = SessionBackends {
            local: Arc::new(JsonDraftDir::new(state_dir.join("drafts").join("local"))?),
            remote: Arc::new(JsonDraftDir::new(state_dir.join("drafts").join("remote"))?),
            saved: Arc::new(JsonMappingRepository::new(state_dir.join("mappings"))?),
        };
        Ok(Self {
            config,
            schema,
            backends,
        })
    }

    async fn open(&self, args: &TabArgs) -> Result<FileSession> {
        let (dir, tab) = split_csv_path(&args.csv)?;
        let source_id = match &args.source_id {
            Some(id) => id.clone(),
            None => default_source_id(&dir),
        };
        let scheduler = TokioScheduler::current().context("no async runtime")?;
        let clock = Arc::new(SystemClock);
        let mut session = MappingSession::new(
            source_id.clone(),
            tab.clone(),
            self.backends.clone(),
            Arc::new(scheduler),
            Arc::clone(&clock),
            self.config.session.clone(),
        );
        let source = CachedSheetSource::new(
            CsvSheetSource::new(dir),
            self.config.session.cache_ttl(),
            clock,
        );
        session
            .load_from(&source)
            .await
            .map_err(|error| user_facing(error, "load tab"))?;
        Ok(session)
    }

    fn show(&self, session: &FileSession) {
        let restored = session.restored().map(|r| r.source.to_string());
        print_store(
            session.source_id(),
            session.tab(),
            restored.as_deref(),
            session.store(),
            &self.schema,
        );
    }
}

fn load_schema(path: &Path) -> Result<FieldSchema> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read schema: {}", path.display()))?;
    FieldSchema::from_json(&raw).with_context(|| format!("parse schema: {}", path.display()))
}

/// Folder and tab name of a CSV path.
fn split_csv_path(path: &Path) -> Result<(PathBuf, String)> {
    let Some(tab) = path.file_stem().and_then(|stem| stem.to_str()) else {
        bail!("not a CSV file path: {}", path.display());
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, tab.to_string()))
}

fn default_source_id(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "local".to_string())
}

fn user_facing(error: SessionError, action: &str) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(format!("{action}: {message}"))
}

fn ensure_column(session: &FileSession, index: usize) -> Result<()> {
    if session.store().column(index).is_none() {
        bail!(
            "no column {index}; the tab has {} columns",
            session.store().len()
        );
    }
    Ok(())
}

pub async fn run(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Show(args) => {
            let session = ctx.open(&args).await?;
            ctx.show(&session);
        }
        Command::Categorize(args) => categorize(ctx, &args).await?,
        Command::Key(args) => toggle_key(ctx, &args).await?,
        Command::Field(args) => set_field(ctx, args).await?,
        Command::Authority(args) => set_authority(ctx, &args).await?,
        Command::HeaderRow(args) => change_header_row(ctx, &args).await?,
        Command::Advance(args) => advance(ctx, &args).await?,
        Command::Back(args) => {
            let mut session = ctx.open(&args).await?;
            if !session.back_to_classify() {
                bail!("only a tab in the map phase can go back to classification");
            }
            finish(ctx, &session).await;
        }
        Command::Commit(args) => commit(ctx, &args).await?,
        Command::Fields(FieldsArgs { entity }) => print_fields(&ctx.schema, entity),
    }
    Ok(())
}

async fn finish(ctx: &Context, session: &FileSession) {
    session.settle().await;
    ctx.show(session);
}

async fn categorize(ctx: &Context, args: &CategorizeArgs) -> Result<()> {
    let mut session = ctx.open(&args.tab).await?;
    let changed = session.set_category_bulk(&args.columns, args.category);
    if changed == 0 {
        bail!("none of the listed columns exist");
    }
    tracing::info!(changed, category = %args.category, "categorized columns");
    finish(ctx, &session).await;
    Ok(())
}

async fn toggle_key(ctx: &Context, args: &ColumnArgs) -> Result<()> {
    let mut session = ctx.open(&args.tab).await?;
    ensure_column(&session, args.column)?;
    if !session.toggle_key(args.column) {
        bail!("column {} is not an entity column", args.column);
    }
    finish(ctx, &session).await;
    Ok(())
}

async fn set_field(ctx: &Context, args: FieldArgs) -> Result<()> {
    let FieldArgs { column, field } = args;
    let mut session = ctx.open(&column.tab).await?;
    let index = column.column;
    ensure_column(&session, index)?;

    if let Some(name) = &field {
        let category = session.store().columns()[index].category;
        let Some(entity) = category.entity() else {
            bail!("column {index} is {category}; only entity columns have target fields");
        };
        if ctx.schema.field(entity, name).is_none() {
            let hints: Vec<&str> = closest_fields(name, ctx.schema.fields_for(entity), 3)
                .into_iter()
                .map(|hint| hint.field.name.as_str())
                .collect();
            bail!("{entity} has no field '{name}'; closest: {}", hints.join(", "));
        }
    }
    session.set_target_field(index, field);
    finish(ctx, &session).await;
    Ok(())
}

async fn set_authority(ctx: &Context, args: &AuthorityArgs) -> Result<()> {
    let mut session = ctx.open(&args.column.tab).await?;
    ensure_column(&session, args.column.column)?;
    session.set_authority(args.column.column, args.authority);
    finish(ctx, &session).await;
    Ok(())
}

async fn change_header_row(ctx: &Context, args: &HeaderRowArgs) -> Result<()> {
    let mut session = ctx.open(&args.tab).await?;
    let rows = session.sheet().map_or(0, |sheet| sheet.rows.len());
    if args.row >= rows {
        bail!("row {} is out of range; the tab has {rows} rows", args.row);
    }
    session
        .change_header_row(args.row)
        .map_err(|error| user_facing(error, "change header row"))?;
    finish(ctx, &session).await;
    Ok(())
}

async fn advance(ctx: &Context, args: &TabArgs) -> Result<()> {
    let mut session = ctx.open(args).await?;
    match session.store().phase() {
        Phase::Preview => {
            session.begin_classification();
        }
        Phase::Classify => {
            if let Some(report) = session.enter_map_phase(&ctx.schema) {
                print_match_report(&report, session.store());
            }
        }
        Phase::Map => bail!("the tab is already in the map phase; commit it instead"),
    }
    finish(ctx, &session).await;
    Ok(())
}

async fn commit(ctx: &Context, args: &TabArgs) -> Result<()> {
    let mut session = ctx.open(args).await?;
    if session.store().phase() != Phase::Map {
        bail!("only a tab in the map phase can be committed; run `advance` first");
    }
    let request = session
        .commit(ctx.backends.saved.as_ref())
        .await
        .map_err(|error| user_facing(error, "commit"))?;
    let primary = request
        .primary_entity
        .map_or_else(|| "none".to_string(), |entity| entity.to_string());
    println!(
        "Committed {} columns of '{}' (primary entity: {primary})",
        request.columns.len(),
        session.tab()
    );
    Ok(())
}
