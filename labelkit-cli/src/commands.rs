//! Subcommand implementations

use crate::watch::FileChanges;
use crate::{Args, PreviewArgs};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use labelkit_code_editor::{CodeEditorPlugin, FILE_EDITOR_KEY};
use labelkit_core::{
    ApiClient, Config, EditorShell, JobOutcome, LabelEngine, ObjectUrlStore, OutputOpener,
    PluginConfig, ReloadOutcome, TemplateKind,
};
use labelkit_pdf_preview::PdfPreviewPlugin;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Quiet period before a burst of file events triggers a render
const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Engine with the built-in plugins registered
async fn build_engine(config: Config) -> anyhow::Result<(LabelEngine, Arc<ObjectUrlStore>)> {
    let mut engine = LabelEngine::new(config)?;
    engine
        .register_plugin(Box::new(CodeEditorPlugin::new()))
        .await?;

    let preview = PdfPreviewPlugin::new();
    let store = preview.object_urls();
    engine.register_plugin(Box::new(preview)).await?;
    Ok((engine, store))
}

/// Point the file editor at `file` and make it the default editor
fn use_file_editor(config: &mut Config, file: &Path) {
    let name = labelkit_code_editor::PLUGIN_NAME;
    let mut entry = config
        .get_plugin_config(name)
        .cloned()
        .unwrap_or_else(|| PluginConfig::new(name.to_string()));
    entry.config.insert(
        "file_path".to_string(),
        serde_json::json!(file.to_string_lossy()),
    );

    config.plugins.retain(|p| p.name != name);
    config.plugins.push(entry);
    config.render.default_editor = FILE_EDITOR_KEY.to_string();
}

/// Render once and write the document to `output`
async fn render(
    shell: &EditorShell,
    store: &ObjectUrlStore,
    output: &Path,
    save: bool,
) -> anyhow::Result<()> {
    match shell.reload(save).await? {
        ReloadOutcome::Updated(Some(url)) => {
            let (bytes, content_type) = store
                .read(&url)?
                .ok_or_else(|| anyhow!("Rendered document {} is no longer available", url))?;
            tokio::fs::write(output, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "✅ Wrote {} ({} bytes, {})",
                output.display(),
                bytes.len(),
                content_type
            );
        }
        ReloadOutcome::Updated(None) => warn!("Preview produced no document"),
        ReloadOutcome::Failed(message) | ReloadOutcome::Unavailable(message) => bail!(message),
        ReloadOutcome::Superseded => debug!("Render superseded by a newer one"),
    }
    Ok(())
}

pub async fn preview(args: &Args, preview: &PreviewArgs) -> anyhow::Result<()> {
    let mut config = args.load_config()?;
    if let Some(file) = &preview.file {
        use_file_editor(&mut config, file);
    }
    config.validate()?;

    let (mut engine, store) = build_engine(config).await?;
    let (template, body) = engine.load_template(preview.kind, preview.template).await?;
    println!(
        "📄 {} template {} \"{}\"",
        preview.kind, template.template.pk, template.template.name
    );

    // An existing local copy wins over the server body
    let code = match &preview.file {
        Some(file) => match tokio::fs::read_to_string(file).await {
            Ok(local) if !local.trim().is_empty() => {
                info!("Using template source from {}", file.display());
                local
            }
            _ => body,
        },
        None => body,
    };

    let shell = engine.open_shell(template, code).await?;
    shell.set_target(Some(preview.target)).await;

    let first = render(&shell, &store, &preview.output, preview.save).await;

    match (&preview.file, preview.watch) {
        (Some(file), true) => {
            if let Err(e) = first {
                error!("❌ Render failed: {:#}", e);
            }
            watch_and_render(&shell, &store, file, preview).await?;
        }
        _ => first?,
    }

    shell.close().await?;
    engine.shutdown().await?;
    Ok(())
}

async fn watch_and_render(
    shell: &EditorShell,
    store: &ObjectUrlStore,
    file: &Path,
    preview: &PreviewArgs,
) -> anyhow::Result<()> {
    let mut changes = FileChanges::watch(file)?;
    println!(
        "👀 Watching {} for changes. Press Ctrl+C to stop.",
        file.display()
    );

    loop {
        tokio::select! {
            change = changes.next(WATCH_DEBOUNCE) => {
                if change.is_none() {
                    warn!("File watcher stopped");
                    break;
                }
                info!("Template file changed, re-rendering");
                if let Err(e) = render(shell, store, &preview.output, preview.save).await {
                    error!("❌ Render failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n🛑 Stopping watch");
                break;
            }
        }
    }
    Ok(())
}

/// Downloads finished job outputs into a directory
struct DownloadOpener {
    api: ApiClient,
    dir: PathBuf,
}

#[async_trait]
impl OutputOpener for DownloadOpener {
    async fn open(&self, location: &str) -> labelkit_core::Result<()> {
        let blob = self.api.fetch_artifact(location).await?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(output_file_name(location));
        tokio::fs::write(&path, &blob.bytes).await?;
        println!("📥 Saved {} ({})", path.display(), blob.content_type);
        Ok(())
    }
}

/// Last path segment of an output location
fn output_file_name(location: &str) -> String {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("output")
        .to_string()
}

pub async fn poll(
    args: &Args,
    job_id: u64,
    title: &str,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = args.load_config()?;
    config.validate()?;

    let dir = output_dir
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut engine = LabelEngine::new(config)?;
    let opener = DownloadOpener {
        api: engine.api().clone(),
        dir,
    };
    engine.set_output_opener(Arc::new(opener));

    let watch = engine
        .watch_job(Some(job_id), title)
        .ok_or_else(|| anyhow!("No job to follow"))?;
    println!("⏳ Following data output {}", watch.job_id());

    // Dropping the watch on Ctrl+C cancels the poll
    let outcome = tokio::select! {
        outcome = watch.outcome() => outcome,
        _ = tokio::signal::ctrl_c() => JobOutcome::Cancelled,
    };

    engine.shutdown().await?;
    match outcome {
        JobOutcome::Complete { output: Some(output) } => {
            println!("✅ Data output {} complete: {}", job_id, output);
            Ok(())
        }
        JobOutcome::Complete { output: None } => {
            println!("✅ Data output {} complete", job_id);
            Ok(())
        }
        JobOutcome::Failed { message } => bail!(message),
        JobOutcome::Cancelled => {
            println!("🛑 Stopped following data output {}", job_id);
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct TargetRow<'a> {
    pk: u64,
    label: &'a str,
}

pub async fn targets(
    args: &Args,
    kind: TemplateKind,
    template: u64,
    search: Option<&str>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let config = args.load_config()?;
    config.validate()?;
    let engine = LabelEngine::new(config)?;

    let template = engine.api().fetch_template(kind, template).await?;
    let options = engine
        .api()
        .list_preview_targets(&template, search, limit)
        .await?;

    if json {
        let rows: Vec<TargetRow> = options
            .iter()
            .map(|o| TargetRow {
                pk: o.pk,
                label: &o.label,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if options.is_empty() {
        println!("No {} records found for \"{}\"", template.model_type, template.name);
        return Ok(());
    }

    println!("🎯 Preview targets for \"{}\" ({})", template.name, template.model_type);
    for option in &options {
        println!("  {:>8}  {}", option.pk, option.label);
    }
    Ok(())
}

pub async fn list_plugins(args: &Args) -> anyhow::Result<()> {
    println!("🔌 Built-in Plugins\n");

    let config = args.load_config()?;
    let (mut engine, _store) = build_engine(config).await?;

    for plugin in engine.get_loaded_plugins() {
        println!("📦 {}", plugin.name);
        println!("   Version: {}", plugin.version);
        println!("   Status: {:?}", plugin.status);
        if !plugin.dependencies.is_empty() {
            println!("   Dependencies: {}", plugin.dependencies.join(", "));
        }
        if !plugin.provided_panels.is_empty() {
            println!("   Panels: {}", plugin.provided_panels.join(", "));
        }
        println!();
    }

    let panels = engine.panels();
    println!("📝 Editors:");
    for editor in panels.editors().await {
        println!("   {} ({})", editor.key, editor.name);
    }
    println!("🖼️  Previews:");
    for preview in panels.previews().await {
        println!("   {} ({})", preview.key, preview.name);
    }

    engine.shutdown().await?;
    Ok(())
}

pub fn validate_config(args: &Args) -> anyhow::Result<()> {
    println!("🔍 Validating Configuration\n");

    let config = args.load_config()?;
    let result = config.validate_comprehensive();

    for warning in &result.warnings {
        println!("⚠️  {}: {}", warning.field_path, warning.message);
    }

    if !result.is_valid {
        for error in &result.errors {
            println!("❌ {}: {}", error.field_path, error.message);
        }
        bail!("{} configuration error(s) found", result.errors.len());
    }

    println!("✅ Configuration is valid");
    println!("   Server: {}{}", config.server.base_url, config.server.api_prefix);
    println!(
        "   Polling: every {} ms, inline cap {}",
        config.polling.interval_ms,
        config
            .polling
            .max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "   Panels: editor '{}', preview '{}'",
        config.render.default_editor, config.render.default_preview
    );
    Ok(())
}
