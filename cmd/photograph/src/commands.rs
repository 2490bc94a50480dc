//! Subcommand implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, ValueEnum};
use photograph_embed::HttpEncoder;
use photograph_pipeline::{IngestRequest, QueryMode, QueryRequest, Service, ServiceConfig};
use photograph_store::RedbStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::Cli;
use crate::config::{Config, load_config};

#[derive(Args)]
pub struct IngestCommand {}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Text,
    VectorSource,
}

impl From<ModeArg> for QueryMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Text => QueryMode::Text,
            ModeArg::VectorSource => QueryMode::VectorSource,
        }
    }
}

#[derive(Args)]
pub struct QueryCommand {
    /// Project to search (ignored with -f)
    #[arg(short = 'p', long)]
    pub project: Option<String>,

    /// How to interpret the payload
    #[arg(short = 'm', long, value_enum, default_value = "text")]
    pub mode: ModeArg,

    /// Number of results
    #[arg(short = 'k', long = "top-k", default_value_t = photograph_pipeline::DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Query text or source reference
    pub payload: Option<String>,
}

#[derive(Args)]
pub struct ProjectArg {
    /// Project id
    pub project: String,
}

impl IngestCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let path = cli
            .input
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("ingest requires -f <request file>"))?;
        let req: IngestRequest = load_request(path)?;
        let svc = open_service(cli)?;
        let resp = svc.ingest(&req).await?;
        write_output(cli, &resp)
    }
}

impl QueryCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let req = match cli.input.as_deref() {
            Some(path) => load_request(path)?,
            None => {
                let project = self
                    .project
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("query requires --project or -f"))?;
                let payload = self
                    .payload
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("query requires a payload or -f"))?;
                let mut req = QueryRequest::new(project, self.mode.into(), payload);
                req.top_k = self.top_k;
                req
            }
        };
        let svc = open_service(cli)?;
        let results = svc.query(&req).await?;
        write_output(cli, &results)
    }
}

pub fn run_points(cli: &Cli, args: &ProjectArg) -> anyhow::Result<()> {
    let svc = open_service(cli)?;
    write_output(cli, &svc.points(&args.project)?)
}

pub fn run_model(cli: &Cli, args: &ProjectArg) -> anyhow::Result<()> {
    let svc = open_service(cli)?;
    let model = svc
        .model(&args.project)?
        .ok_or_else(|| anyhow::anyhow!("no model for project {}", args.project))?;
    write_output(cli, &model)
}

fn open_service(cli: &Cli) -> anyhow::Result<Service> {
    let cfg: Config = load_config(cli.config.as_deref())?;
    let db_path = match &cli.db {
        Some(p) => PathBuf::from(p),
        None => cfg.db_path()?,
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    debug!("opening {}", db_path.display());
    let db = Arc::new(
        RedbStore::open(&db_path).with_context(|| format!("open {}", db_path.display()))?,
    );

    let encoder = Arc::new(HttpEncoder::with_config(cfg.encoder_config()));
    let mut svc_cfg = ServiceConfig::new(db.clone(), db, encoder);
    svc_cfg.projector = cfg.projector_config(svc_cfg.projector.dim);
    svc_cfg.pipeline = cfg.pipeline_config();
    Ok(Service::new(svc_cfg)?)
}

/// Loads a request from a YAML or JSON file.
pub fn load_request<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    parse_request(&data, path)
}

fn parse_request<T: DeserializeOwned>(data: &[u8], path: &Path) -> anyhow::Result<T> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_slice(data)?),
        Some("json") => Ok(serde_json::from_slice(data)?),
        // YAML is a superset of JSON.
        _ => Ok(serde_yaml::from_slice(data)?),
    }
}

fn write_output<T: Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    match &cli.output {
        Some(path) => fs::write(path, out + "\n")?,
        None => println!("{out}"),
    }
    Ok(())
}
