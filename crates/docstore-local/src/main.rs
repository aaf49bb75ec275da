mod cli;

use std::path::Path;

use clap::Parser;
use docstore_core::{CommandContext, ContentStream, DocumentStore, OperationResult, TemplateStore};
use docstore_local::{LocalDocumentStore, LocalTemplateStore};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{Config, Operation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let repo_config = config.repository_config()?;

    debug!("Repository root: {}", repo_config.root.display());
    debug!(
        "  Locking: {}, versioning: {}, templates: {}, commands: {}",
        repo_config.locking(),
        repo_config.versioning(),
        repo_config.template_creation_enabled,
        repo_config.commands_enabled
    );

    let documents = LocalDocumentStore::new(repo_config.clone());
    let templates = LocalTemplateStore::new(repo_config);
    let actor = config.actor.as_str();

    match config.operation {
        Operation::Exists { document } => print_json(&documents.exists(&document).await?)?,
        Operation::Length { document, version } => {
            print_json(&documents.length(&document, version).await?)?
        }
        Operation::Read { document, version } => {
            copy_to_stdout(documents.open_read(&document, version).await?).await?
        }
        Operation::Save { document, input } => {
            let mut content = open_input(input.as_deref()).await?;
            let result = documents.save(&document, actor, content.as_mut()).await?;
            report(result)?
        }
        Operation::Checkout { document } => report(documents.checkout(&document, actor).await?)?,
        Operation::Checkin {
            document,
            description,
        } => report(documents.checkin(&document, actor, &description).await?)?,
        Operation::UndoCheckout { document } => {
            report(documents.undo_checkout(&document, actor).await?)?
        }
        Operation::State { document } => {
            print_json(&documents.checkout_state(&document, actor).await?)?
        }
        Operation::Versions { document } => {
            let mut versions = documents.versions(&document).await?;
            versions.sort();
            print_json(&versions)?
        }
        Operation::Delete { document } => report(documents.delete(&document).await?)?,
        Operation::Properties { document } => {
            print_json(&documents.properties(&document).await?)?
        }
        Operation::Capabilities => print_json(&documents.capabilities().to_map())?,
        Operation::TemplateTypes => print_json(&templates.template_types())?,
        Operation::TemplateSave {
            template,
            language,
            input,
        } => {
            let mut content = open_input(input.as_deref()).await?;
            templates
                .save_template(&template, language.as_deref(), content.as_mut())
                .await?;
            info!("Saved template {}", template);
        }
        Operation::TemplateCreate { template, language } => {
            report(templates.create_template(&template, language.as_deref()).await?)?
        }
        Operation::TemplateRead { template, language } => {
            copy_to_stdout(templates.open_template(&template, language.as_deref()).await?).await?
        }
        Operation::TemplateDelete { template, language } => {
            print_json(&templates.delete_template(&template, language.as_deref()).await?)?
        }
        Operation::TemplateLanguages { template } => {
            print_json(&templates.template_languages(&template).await?)?
        }
        Operation::Exec {
            name,
            document,
            document_id,
        } => {
            let context = CommandContext {
                document_ref: document,
                document_id,
            };
            print_json(&documents.execute_command(&name, &context).await?)?
        }
    }

    Ok(())
}

/// Print a lock-gated result; refusals exit non-zero.
fn report(result: OperationResult) -> anyhow::Result<()> {
    print_json(&result)?;
    if !result.succeeded {
        anyhow::bail!(result.message.unwrap_or_else(|| "Operation refused".to_string()));
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn AsyncRead + Send + Unpin>> {
    Ok(match path {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    })
}

async fn copy_to_stdout(mut stream: ContentStream) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut stream, &mut stdout).await?;
    stdout.flush().await?;
    Ok(())
}
