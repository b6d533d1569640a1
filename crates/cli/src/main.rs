mod backend;

use anyhow::Context;
use backend::CommandBackend;
use clap::{Parser, Subcommand, ValueEnum};
use itemdef_core::config::{
    boost_factor_from_env_value, resolve_schema_path, strategy_from_env_value,
    word_count_from_env_value,
};
use itemdef_core::constants::{DEFAULT_MAX_WORDS, DEFAULT_MIN_WORDS, DEFAULT_WORDS_PER_WEIGHT};
use itemdef_core::{
    Document, EngineConfig, ItemDefinitionService, SchemaSource, SchemaStore, SectionSchema,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "itemdef")]
#[command(about = "ISO 26262 item definition generator")]
struct Cli {
    /// Schema file (defaults to ITEMDEF_SCHEMA_PATH, then the built-in schema)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sections of the schema in generation order
    Schema,
    /// Write a blank annotated template
    Template {
        /// Name of the system the template is for
        #[arg(long)]
        system_name: Option<String>,
    },
    /// Generate a complete item definition
    Generate {
        /// Name of the system under definition
        system_name: String,
        /// Item identifier (derived from the name when omitted)
        #[arg(long)]
        system_id: Option<String>,
        /// Section id or title to emphasise
        #[arg(long)]
        focus: Option<String>,
        /// Shell command producing section text from the prompt on stdin
        #[arg(long)]
        backend_cmd: String,
        /// Per-section time limit for the backend command
        #[arg(long, default_value_t = 300)]
        backend_timeout_secs: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
    Yaml,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("itemdef=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = engine_config()?;
    let store = Arc::new(SchemaStore::new(schema_source(cli.schema)?));

    match cli.command {
        Commands::Schema => {
            let service = ItemDefinitionService::template_only(store, config);
            let sections = service.describe_schema()?;
            print!("{}", render_sections(&sections, cli.format)?);
        }
        Commands::Template { system_name } => {
            let service = ItemDefinitionService::template_only(store, config);
            let document = service.generate_template(system_name.as_deref())?;
            print!("{}", render_document(&service, &document, cli.format)?);
        }
        Commands::Generate {
            system_name,
            system_id,
            focus,
            backend_cmd,
            backend_timeout_secs,
        } => {
            let backend = CommandBackend::new(
                backend_cmd,
                Duration::from_secs(backend_timeout_secs),
            );
            let service = ItemDefinitionService::new(store, Arc::new(backend), config);
            let document = service
                .generate_document(&system_name, system_id.as_deref(), focus.as_deref())
                .with_context(|| format!("failed to generate item definition for {system_name}"))?;
            print!("{}", render_document(&service, &document, cli.format)?);

            if !document.validation_report().passed {
                anyhow::bail!(
                    "generated document failed completeness validation with {} error(s)",
                    document.validation_report().errors().count()
                );
            }
        }
    }

    Ok(())
}

/// Engine configuration from `ITEMDEF_*` environment variables.
fn engine_config() -> anyhow::Result<EngineConfig> {
    let env = |key: &str| std::env::var(key).ok();
    let config = EngineConfig::new(
        boost_factor_from_env_value(env("ITEMDEF_BOOST_FACTOR"))?,
        word_count_from_env_value(env("ITEMDEF_WORDS_PER_WEIGHT"), DEFAULT_WORDS_PER_WEIGHT)?,
        word_count_from_env_value(env("ITEMDEF_MIN_WORDS"), DEFAULT_MIN_WORDS)?,
        word_count_from_env_value(env("ITEMDEF_MAX_WORDS"), DEFAULT_MAX_WORDS)?,
        strategy_from_env_value(env("ITEMDEF_STRATEGY"))?,
    )?;
    tracing::debug!(?config, "resolved engine configuration");
    Ok(config)
}

fn schema_source(flag: Option<PathBuf>) -> anyhow::Result<SchemaSource> {
    let requested = flag.or_else(|| std::env::var_os("ITEMDEF_SCHEMA_PATH").map(PathBuf::from));
    Ok(match resolve_schema_path(requested)? {
        Some(path) => SchemaSource::File(path),
        None => SchemaSource::Builtin,
    })
}

fn render_document(
    service: &ItemDefinitionService,
    document: &Document,
    format: OutputFormat,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Markdown => service.render_markdown(document),
        OutputFormat::Json => document.to_json()? + "\n",
        OutputFormat::Yaml => document.to_yaml()?,
    })
}

fn render_sections(sections: &[SectionSchema], format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Markdown => {
            let mut out = String::from("| # | id | title | required | weight | references |\n");
            out.push_str("|---|----|-------|----------|--------|------------|\n");
            for section in sections {
                let references = section
                    .references
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} |\n",
                    section.order,
                    section.id,
                    section.title,
                    if section.required { "yes" } else { "no" },
                    section.default_weight,
                    references
                ));
            }
            out
        }
        OutputFormat::Json => serde_json::to_string_pretty(sections)? + "\n",
        OutputFormat::Yaml => serde_yaml::to_string(sections)?,
    })
}
