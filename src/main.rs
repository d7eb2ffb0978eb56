use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use job_tracker::applications::{ApplicationSelector, linked_emails_for_user, list_applications};
use job_tracker::config::{DEFAULT_DB_PATH, TrackerConfig};
use job_tracker::llm::create_provider;
use job_tracker::pipeline::{Classifier, EmailProcessor, InboundEmail, Reconciler, TitleRanker};
use job_tracker::store::{Database, LibSqlBackend};

#[derive(Parser)]
#[command(name = "job-tracker", version)]
#[command(about = "Track job applications from application emails")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// libSQL database file
    #[arg(long, global = true, env = "JOB_TRACKER_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Process an email (or a JSON array of emails) and print the outcome
    Process {
        /// JSON file, or `-` for stdin
        #[arg(value_name = "FILE")]
        input: String,
    },
    /// List job applications
    List {
        /// User whose applications to list
        user_id: Option<String>,
        /// Application id (repeatable, takes precedence over users)
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<String>,
        /// List several users at once (repeatable)
        #[arg(long = "user", value_name = "USER_ID")]
        users: Vec<String>,
    },
    /// Link a mailbox address to a user
    Link { email: String, user_id: String },
    /// List mailbox addresses linked to a user
    Linked { user_id: String },
}

impl Commands {
    /// Selector for `list`, or `None` when nothing was selected.
    fn selector(&self) -> Option<ApplicationSelector> {
        match self {
            Commands::List {
                user_id,
                ids,
                users,
            } => ApplicationSelector::from_parts(ids, user_id.as_deref(), users),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Logs go to stderr; stdout carries JSON results.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Process { input } => cmd_process(&cli.db, input).await,
        Commands::List { .. } => {
            let Some(selector) = cli.command.selector() else {
                bail!("list needs a user id, --id or --user");
            };
            let db = open_db(&cli.db).await?;
            print_json(&list_applications(db.as_ref(), &selector).await)
        }
        Commands::Link { email, user_id } => {
            let db = open_db(&cli.db).await?;
            db.link_account(email, user_id).await?;
            print_json(&serde_json::json!({ "success": true, "email": email, "userId": user_id }))
        }
        Commands::Linked { user_id } => {
            let db = open_db(&cli.db).await?;
            print_json(&linked_emails_for_user(db.as_ref(), user_id).await?)
        }
    }
}

async fn cmd_process(db_path: &Path, input: &str) -> anyhow::Result<()> {
    let mut config = TrackerConfig::from_env()?;
    config.db_path = db_path.to_path_buf();

    let raw = read_input(input)?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("Input is not valid JSON")?;
    let single = !value.is_array();
    let emails: Vec<InboundEmail> = if single {
        vec![serde_json::from_value(value).context("Input is not an email")?]
    } else {
        serde_json::from_value(value).context("Input is not an array of emails")?
    };

    let db = open_db(&config.db_path).await?;
    let classifier_llm = create_provider(&config.classifier)?;
    let similarity_llm = create_provider(&config.similarity)?;

    let processor = EmailProcessor::new(
        Classifier::new(classifier_llm),
        Reconciler::new(db, TitleRanker::new(similarity_llm), config.reconcile),
    );

    let outcomes = processor.process_batch(&emails).await;
    if single {
        print_json(&outcomes[0])
    } else {
        print_json(&outcomes)
    }
}

async fn open_db(path: &Path) -> anyhow::Result<Arc<dyn Database>> {
    let backend = LibSqlBackend::new_local(path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(backend))
}

fn read_input(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {source}"))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("job-tracker").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_by_user() {
        let cli = parse(&["list", "u1"]);
        assert_eq!(
            cli.command.selector(),
            Some(ApplicationSelector::ByUser("u1".into()))
        );
    }

    #[test]
    fn list_ids_take_precedence() {
        let cli = parse(&["list", "u1", "--id", "a", "--id", "b", "--user", "u2"]);
        assert_eq!(
            cli.command.selector(),
            Some(ApplicationSelector::ByIds(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn list_by_several_users() {
        let cli = parse(&["list", "--user", "u2", "--user", "u3"]);
        assert_eq!(
            cli.command.selector(),
            Some(ApplicationSelector::ByUsers(vec!["u2".into(), "u3".into()]))
        );
    }

    #[test]
    fn list_without_selection_is_none() {
        assert_eq!(parse(&["list"]).command.selector(), None);
    }

    #[test]
    fn db_flag_overrides_default() {
        let cli = parse(&["--db", "/tmp/jobs.db", "linked", "u1"]);
        assert_eq!(cli.db, PathBuf::from("/tmp/jobs.db"));
        assert!(matches!(cli.command, Commands::Linked { ref user_id } if user_id == "u1"));
    }

    #[test]
    fn link_requires_both_arguments() {
        assert!(Cli::try_parse_from(["job-tracker", "link", "a@x.com"]).is_err());
        assert!(Cli::try_parse_from(["job-tracker", "frobnicate"]).is_err());
    }
}
