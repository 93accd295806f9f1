//! Command handlers wiring configuration into the pipeline.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use colored::Colorize;

use crate::backends::{self, BackendKind};
use crate::clarify;
use crate::config::Config;
use crate::log_debug;
use crate::orchestrator;
use crate::publish::{self, github::GithubClient};
use crate::repair::{self, RepairReport};
use crate::types::{GenerationRequest, GenerationResult, PublishManifest, RepositoryTarget};
use crate::ui;

/// Path of the generated component inside a published repository
const APP_SOURCE_PATH: &str = "src/App.jsx";

fn resolve_preferred(config: &Config, override_name: Option<&str>) -> Result<BackendKind> {
    match override_name {
        Some(name) => BackendKind::from_str(name)
            .map_err(|_| anyhow!("Unknown backend '{name}'")),
        None => config.default_backend_kind(),
    }
}

/// Run generation plus repair and return the final source with its report
async fn generate_source(
    config: &Config,
    prompt: &str,
    backend_override: Option<&str>,
    enrichment: Option<String>,
) -> Result<(GenerationResult, RepairReport)> {
    let preferred = resolve_preferred(config, backend_override)?;
    let mut request = GenerationRequest::new(prompt).with_preferred_backend(preferred);
    if let Some(enrichment) = enrichment {
        request = request.with_enrichment(enrichment);
    }

    let adapters = backends::build_adapters(config.backend_descriptors());
    let spinner = ui::create_spinner("Generating your app...");
    let outcome = orchestrator::generate(&request, &adapters, &config.generation.limits()).await;
    spinner.finish_and_clear();

    let result = outcome.map_err(|e| anyhow!(e))?;
    let (text, report) = repair::repair(&result.text);
    Ok((
        GenerationResult {
            text,
            backend: result.backend,
            model: result.model,
        },
        report,
    ))
}

fn print_repair_summary(report: &RepairReport) {
    if report.is_clean() {
        return;
    }
    ui::print_info("Applied repairs:");
    for fix in &report.fixes_applied {
        ui::print_message(&format!("  • {fix}"));
    }
}

/// Handle the 'generate' command
pub async fn handle_generate(
    config: &Config,
    prompt: &str,
    backend_override: Option<&str>,
    output: Option<PathBuf>,
    enrichment: Option<String>,
) -> Result<()> {
    let (result, report) = generate_source(config, prompt, backend_override, enrichment).await?;

    ui::print_success(&format!(
        "Generated with {} ({})",
        result.backend, result.model
    ));
    print_repair_summary(&report);

    if let Some(path) = output {
        fs::write(&path, &result.text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        ui::print_success(&format!("Saved to {}", path.display()));
    } else {
        ui::print_bordered_content(&result.text);
    }
    Ok(())
}

/// Handle the 'clarify' command
pub async fn handle_clarify(config: &Config, prompt: &str) -> Result<()> {
    let adapters = backends::build_adapters(config.backend_descriptors());
    let spinner = ui::create_spinner("Thinking about your idea...");
    let questions = clarify::clarify(prompt, &adapters).await;
    spinner.finish_and_clear();

    for (i, clarification) in questions.iter().enumerate() {
        ui::print_message(&format!(
            "{} {}",
            format!("{}.", i + 1).cyan().bold(),
            clarification.question.bold()
        ));
        for option in &clarification.options {
            ui::print_message(&format!("   - {option}"));
        }
        ui::print_newline();
    }
    ui::print_info("Re-run generate with --enrich to fold your answers in.");
    Ok(())
}

/// Handle the 'publish' command
pub async fn handle_publish(
    config: &Config,
    prompt: Option<&str>,
    file: Option<PathBuf>,
    name: &str,
    message: Option<&str>,
    backend_override: Option<&str>,
    private: bool,
) -> Result<()> {
    let source = match (&file, prompt) {
        (Some(path), _) => {
            log_debug!("publish: using existing source from {}", path.display());
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?
        }
        (None, Some(prompt)) => {
            let (result, report) =
                generate_source(config, prompt, backend_override, None).await?;
            ui::print_success(&format!(
                "Generated with {} ({})",
                result.backend, result.model
            ));
            print_repair_summary(&report);
            result.text
        }
        (None, None) => {
            return Err(anyhow!(
                "Nothing to publish: pass an app description or --file <path>"
            ));
        }
    };

    let token = config.publish.effective_token();
    if token.is_empty() {
        return Err(anyhow!(
            "No GitHub token configured. Set one with `appforge config --github-token <token>` or export GITHUB_TOKEN"
        ));
    }

    let manifest = build_manifest(&source, name, prompt);
    let mut target = RepositoryTarget::new(name);
    target.branch = config.publish.branch.clone();
    target.private = private || config.publish.private;
    target.description = prompt.map_or_else(
        || "Generated with Appforge".to_string(),
        |p| crate::backends::truncate_message(p),
    );

    let client = GithubClient::new(token);
    let commit_message = message.unwrap_or("Publish generated app");

    let spinner = ui::create_spinner("Publishing to GitHub...");
    let outcome = publish::publish(&client, &manifest, &target, commit_message).await;
    spinner.finish_and_clear();

    let outcome = outcome.map_err(|e| anyhow!(e))?;
    ui::print_success(&format!("Published to {}", outcome.repository.url));
    ui::print_message(&format!("  commit {}", outcome.commit.commit_sha));
    Ok(())
}

/// Assemble the fixed file set for one publish attempt
fn build_manifest(source: &str, name: &str, prompt: Option<&str>) -> PublishManifest {
    let mut manifest = PublishManifest::new();
    manifest.insert(APP_SOURCE_PATH, source);
    manifest.insert("README.md", build_readme(name, prompt));
    manifest
}

fn build_readme(name: &str, prompt: Option<&str>) -> String {
    let mut readme = format!("# {name}\n\n");
    if let Some(prompt) = prompt {
        readme.push_str(&format!("> {prompt}\n\n"));
    }
    readme.push_str("Built with [Appforge](https://github.com/appforge-dev/appforge). ");
    readme.push_str(&format!(
        "The app lives in `{APP_SOURCE_PATH}` as a single React component.\n"
    ));
    readme
}

/// Handle the 'config' command
#[allow(clippy::too_many_arguments)]
pub fn handle_config(
    mut config: Config,
    backend: Option<&str>,
    api_key: Option<String>,
    models: Option<Vec<String>>,
    default_backend: Option<&str>,
    github_token: Option<String>,
    branch: Option<String>,
) -> Result<()> {
    let mut changes_made = false;

    if api_key.is_some() || models.is_some() {
        let kind = resolve_preferred(&config, backend)?;
        let backend_config = config.backend_config_mut(kind);

        if let Some(key) = api_key
            && backend_config.api_key != key
        {
            backend_config.api_key = key;
            changes_made = true;
        }
        if let Some(models) = models
            && backend_config.models != models
        {
            backend_config.models = models;
            changes_made = true;
        }
    }

    if let Some(name) = default_backend {
        let kind = BackendKind::from_str(name).map_err(|_| anyhow!("Unknown backend '{name}'"))?;
        if config.default_backend != kind.name() {
            config.default_backend = kind.name().to_string();
            changes_made = true;
        }
    }

    if let Some(token) = github_token
        && config.publish.token != token
    {
        config.publish.token = token;
        changes_made = true;
    }

    if let Some(branch) = branch
        && config.publish.branch != branch
    {
        config.publish.branch = branch;
        changes_made = true;
    }

    if changes_made {
        config.save()?;
        ui::print_success("Configuration updated");
    } else {
        print_config_summary(&config);
    }
    Ok(())
}

fn print_config_summary(config: &Config) {
    ui::print_info("Current configuration:");
    ui::print_message(&format!("  Default backend: {}", config.default_backend));
    ui::print_message(&format!(
        "  Publish branch: {} ({})",
        config.publish.branch,
        if config.publish.private {
            "private"
        } else {
            "public"
        }
    ));
    ui::print_message(&format!(
        "  GitHub token: {}",
        if config.publish.effective_token().is_empty() {
            "not set".red().to_string()
        } else {
            "set".green().to_string()
        }
    ));
    handle_list_backends(config);
}

/// Handle the 'list-backends' command
pub fn handle_list_backends(config: &Config) {
    ui::print_info("Backends:");
    for descriptor in config.backend_descriptors() {
        let credential = if descriptor.has_credential() {
            "key set".green().to_string()
        } else {
            "no key".red().to_string()
        };
        ui::print_message(&format!(
            "  {} [{}] models: {}",
            descriptor.kind.name().bold(),
            credential,
            descriptor.models.join(" → ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_contains_app_and_readme() {
        let manifest = build_manifest("export default App;", "demo-app", Some("a todo list"));
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries()[0].path, APP_SOURCE_PATH);
        assert!(manifest.entries()[1].content.contains("demo-app"));
        assert!(manifest.entries()[1].content.contains("a todo list"));
    }
}
