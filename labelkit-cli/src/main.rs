//! Labelkit CLI - preview label and report templates against a live server

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use labelkit_core::{Config, PreviewTarget, TemplateKind};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info, Level};

mod commands;
mod watch;

/// Options of the `preview` subcommand
#[derive(Debug, Clone)]
pub struct PreviewArgs {
    pub kind: TemplateKind,
    pub template: u64,
    pub target: PreviewTarget,
    pub file: Option<PathBuf>,
    pub save: bool,
    pub output: PathBuf,
    pub watch: bool,
}

/// Subcommand selected on the command line
#[derive(Debug, Clone)]
pub enum Action {
    Preview(PreviewArgs),
    Poll {
        job_id: u64,
        title: String,
        output_dir: Option<PathBuf>,
    },
    Targets {
        kind: TemplateKind,
        template: u64,
        search: Option<String>,
        limit: usize,
        json: bool,
    },
    None,
}

/// CLI arguments structure
#[derive(Debug, Clone)]
pub struct Args {
    pub config_file: Option<PathBuf>,
    pub server: Option<String>,
    pub token: Option<String>,
    pub dev_mode: bool,
    pub list_plugins: bool,
    pub validate_config: bool,
    pub action: Action,
}

fn kind_arg() -> Arg {
    Arg::new("kind")
        .short('k')
        .long("kind")
        .help("Template family: label or report")
        .default_value("label")
        .value_parser(|s: &str| s.parse::<TemplateKind>())
}

fn template_arg() -> Arg {
    Arg::new("template")
        .short('t')
        .long("template")
        .help("Primary key of the template")
        .required(true)
        .value_parser(clap::value_parser!(u64))
}

impl Args {
    /// Parse command line arguments
    pub fn parse() -> Self {
        let matches = Self::command().get_matches();
        Self::from_matches(&matches)
    }

    fn command() -> Command {
        Command::new("labelkit")
            .version("0.1.0")
            .about("Live preview client for label and report templates")
            .long_about(
                "Labelkit edits label and report templates stored on a remote server, \
                renders them server-side against a chosen record and writes the \
                resulting document to disk. Long running render jobs are followed \
                until they finish.",
            )
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .global(true)
                    .help("Path to configuration file (JSON format)")
                    .long_help(
                        "Path to a JSON configuration file with server, polling, render \
                        and plugin settings. Defaults to labelkit/config.json in the user \
                        configuration directory when that file exists.",
                    )
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("server")
                    .short('s')
                    .long("server")
                    .global(true)
                    .help("Base URL of the server, e.g. https://inventory.example.com")
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                Arg::new("token")
                    .long("token")
                    .global(true)
                    .help("API token sent as `Authorization: Token <token>`")
                    .value_parser(clap::value_parser!(String)),
            )
            .arg(
                Arg::new("dev-mode")
                    .long("dev-mode")
                    .global(true)
                    .help("Enable debug logging")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("list-plugins")
                    .long("list-plugins")
                    .help("List built-in plugins and the panels they provide, then exit")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("validate-config")
                    .long("validate-config")
                    .help("Validate the configuration and exit")
                    .action(clap::ArgAction::SetTrue),
            )
            .subcommand(
                Command::new("preview")
                    .about("Render a template and write the document to disk")
                    .arg(kind_arg())
                    .arg(template_arg())
                    .arg(
                        Arg::new("target")
                            .long("target")
                            .help("Record to render against, or `aggregate`")
                            .required(true)
                            .value_parser(|s: &str| s.parse::<PreviewTarget>()),
                    )
                    .arg(
                        Arg::new("file")
                            .short('f')
                            .long("file")
                            .help("Edit the template through a local file")
                            .long_help(
                                "Mirror the template into a local file. An existing non-empty \
                                file is used as the template source, otherwise it is filled \
                                with the body stored on the server.",
                            )
                            .value_parser(clap::value_parser!(PathBuf)),
                    )
                    .arg(
                        Arg::new("save")
                            .long("save")
                            .help("Upload the template body before rendering")
                            .action(clap::ArgAction::SetTrue),
                    )
                    .arg(
                        Arg::new("output")
                            .short('o')
                            .long("output")
                            .help("Where to write the rendered document")
                            .default_value("preview.pdf")
                            .value_parser(clap::value_parser!(PathBuf)),
                    )
                    .arg(
                        Arg::new("watch")
                            .short('w')
                            .long("watch")
                            .help("Re-render whenever the template file changes")
                            .requires("file")
                            .action(clap::ArgAction::SetTrue),
                    ),
            )
            .subcommand(
                Command::new("poll")
                    .about("Follow a data output job until it finishes")
                    .arg(
                        Arg::new("job-id")
                            .help("Primary key of the data output")
                            .required(true)
                            .index(1)
                            .value_parser(clap::value_parser!(u64)),
                    )
                    .arg(
                        Arg::new("title")
                            .long("title")
                            .help("Title of the progress indicator")
                            .default_value("Processing")
                            .value_parser(clap::value_parser!(String)),
                    )
                    .arg(
                        Arg::new("output-dir")
                            .long("output-dir")
                            .help("Directory finished outputs are downloaded to")
                            .value_parser(clap::value_parser!(PathBuf)),
                    ),
            )
            .subcommand(
                Command::new("targets")
                    .about("List records a template can be previewed against")
                    .arg(kind_arg())
                    .arg(template_arg())
                    .arg(
                        Arg::new("search")
                            .long("search")
                            .help("Only list records matching this text")
                            .value_parser(clap::value_parser!(String)),
                    )
                    .arg(
                        Arg::new("limit")
                            .long("limit")
                            .default_value("25")
                            .value_parser(clap::value_parser!(usize)),
                    )
                    .arg(
                        Arg::new("json")
                            .long("json")
                            .help("Print the list as JSON")
                            .action(clap::ArgAction::SetTrue),
                    ),
            )
            .after_help(
                "EXAMPLES:\n    \
                labelkit preview -k label -t 7 --target 42                 Render label 7 for stock item 42\n    \
                labelkit preview -t 7 --target 42 -f label.html --watch   Re-render on every save\n    \
                labelkit preview -k report -t 3 --target aggregate --save  Upload, then render\n    \
                labelkit poll 99                                            Follow data output 99\n    \
                labelkit targets -k report -t 3 --search BO-0012            Find a build order\n    \
                labelkit --validate-config --config config.json             Validate configuration",
            )
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let action = match matches.subcommand() {
            Some(("preview", sub)) => Action::Preview(PreviewArgs {
                kind: sub
                    .get_one::<TemplateKind>("kind")
                    .copied()
                    .unwrap_or(TemplateKind::Label),
                template: sub.get_one::<u64>("template").copied().unwrap_or_default(),
                target: sub
                    .get_one::<PreviewTarget>("target")
                    .copied()
                    .unwrap_or(PreviewTarget::Aggregate),
                file: sub.get_one::<PathBuf>("file").cloned(),
                save: sub.get_flag("save"),
                output: sub
                    .get_one::<PathBuf>("output")
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from("preview.pdf")),
                watch: sub.get_flag("watch"),
            }),
            Some(("poll", sub)) => Action::Poll {
                job_id: sub.get_one::<u64>("job-id").copied().unwrap_or_default(),
                title: sub
                    .get_one::<String>("title")
                    .cloned()
                    .unwrap_or_else(|| "Processing".to_string()),
                output_dir: sub.get_one::<PathBuf>("output-dir").cloned(),
            },
            Some(("targets", sub)) => Action::Targets {
                kind: sub
                    .get_one::<TemplateKind>("kind")
                    .copied()
                    .unwrap_or(TemplateKind::Label),
                template: sub.get_one::<u64>("template").copied().unwrap_or_default(),
                search: sub.get_one::<String>("search").cloned(),
                limit: sub.get_one::<usize>("limit").copied().unwrap_or(25),
                json: sub.get_flag("json"),
            },
            _ => Action::None,
        };

        Self {
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            server: matches.get_one::<String>("server").cloned(),
            token: matches.get_one::<String>("token").cloned(),
            dev_mode: matches.get_flag("dev-mode"),
            list_plugins: matches.get_flag("list-plugins"),
            validate_config: matches.get_flag("validate-config"),
            action,
        }
    }

    /// Configuration file to read, if any
    fn config_path(&self) -> Option<PathBuf> {
        self.config_file
            .clone()
            .or_else(|| Config::default_path().filter(|path| path.exists()))
    }

    /// Load the configuration file, then apply environment and CLI overrides
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match self.config_path() {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Config::from_file(&path).with_context(|| {
                    format!(
                        "Failed to load configuration file {}\n\n\
                        You can validate it with: labelkit --validate-config --config {}",
                        path.display(),
                        path.display()
                    )
                })?
            }
            None => {
                info!("Using default configuration");
                Config::new()
            }
        };

        config.apply_process_environment()?;
        config.apply_cli_overrides(&self.cli_overrides())?;
        Ok(config)
    }

    fn cli_overrides(&self) -> HashMap<String, serde_json::Value> {
        let mut overrides = HashMap::new();
        if let Some(server) = &self.server {
            overrides.insert("server.base_url".to_string(), serde_json::json!(server));
        }
        if let Some(token) = &self.token {
            overrides.insert("server.token".to_string(), serde_json::json!(token));
        }
        overrides.insert("global.dev_mode".to_string(), serde_json::json!(self.dev_mode));
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.dev_mode {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(args.dev_mode)
        .with_line_number(args.dev_mode)
        .with_file(args.dev_mode)
        .with_writer(std::io::stderr);

    if args.dev_mode {
        subscriber.with_ansi(true).pretty().init();
        info!("🔧 Development mode enabled");
    } else {
        subscriber.with_ansi(true).init();
    }

    if args.list_plugins {
        if let Err(e) = commands::list_plugins(&args).await {
            eprintln!("❌ Failed to list plugins: {:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    if args.validate_config {
        if let Err(e) = commands::validate_config(&args) {
            eprintln!("❌ Configuration validation failed:\n{:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    let result = match &args.action {
        Action::Preview(preview) => commands::preview(&args, preview).await,
        Action::Poll {
            job_id,
            title,
            output_dir,
        } => commands::poll(&args, *job_id, title, output_dir.clone()).await,
        Action::Targets {
            kind,
            template,
            search,
            limit,
            json,
        } => commands::targets(&args, *kind, *template, search.as_deref(), *limit, *json).await,
        Action::None => {
            Args::command().print_help()?;
            return Ok(());
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        let matches = Args::command().try_get_matches_from(argv).unwrap();
        Args::from_matches(&matches)
    }

    #[test]
    fn test_preview_arguments() {
        let args = parse(&[
            "labelkit", "preview", "-k", "report", "-t", "3", "--target", "aggregate", "--save",
        ]);
        match args.action {
            Action::Preview(preview) => {
                assert_eq!(preview.kind, TemplateKind::Report);
                assert_eq!(preview.template, 3);
                assert_eq!(preview.target, PreviewTarget::Aggregate);
                assert!(preview.save);
                assert!(!preview.watch);
                assert_eq!(preview.output, PathBuf::from("preview.pdf"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_watch_requires_file() {
        let result = Args::command().try_get_matches_from([
            "labelkit", "preview", "-t", "7", "--target", "42", "--watch",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_kind_rejected() {
        let result = Args::command().try_get_matches_from([
            "labelkit", "targets", "-k", "invoice", "-t", "7",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let args = parse(&[
            "labelkit",
            "poll",
            "99",
            "--server",
            "https://inventory.example.com",
            "--token",
            "secret",
        ]);
        assert!(matches!(args.action, Action::Poll { job_id: 99, .. }));

        let overrides = args.cli_overrides();
        assert_eq!(
            overrides["server.base_url"],
            serde_json::json!("https://inventory.example.com")
        );
        assert_eq!(overrides["server.token"], serde_json::json!("secret"));
    }
}
