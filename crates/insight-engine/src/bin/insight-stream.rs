//! `insight-stream` command line: run agents and read feeds

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use insight_core::{InsightConfig, OwnerId};
use insight_engine::{schedule_agent, Pipeline, PipelineError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn owner_arg() -> Arg {
    Arg::new("owner")
        .long("owner")
        .default_value("cli")
        .help("Feed owner (device or session id)")
}

fn cli() -> Command {
    Command::new("insight-stream")
        .version(insight_core::VERSION)
        .about("Turn an agent's live output into feed cards")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run an agent and print the resulting feed")
                .arg(
                    Arg::new("agent")
                        .long("agent")
                        .value_parser(value_parser!(PathBuf))
                        .help("Agent definition (defaults to the configured agent)"),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .help("Task input handed to the agent"),
                )
                .arg(
                    Arg::new("destination")
                        .long("destination")
                        .default_value("")
                        .help("Destination hint used for images"),
                )
                .arg(owner_arg())
                .arg(
                    Arg::new("schedule")
                        .long("schedule")
                        .action(ArgAction::SetTrue)
                        .help("Keep running the agent's proactive schedule after the run"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Print an agent's manifest")
                .arg(
                    Arg::new("agent")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("feed")
                .about("Print an owner's feed, newest first")
                .arg(owner_arg())
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of cards"),
                ),
        )
        .subcommand(
            Command::new("clear")
                .about("Delete an owner's feed")
                .arg(owner_arg()),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn owner(args: &ArgMatches) -> OwnerId {
    args.get_one::<String>("owner")
        .map_or_else(|| OwnerId::new("cli"), |o| OwnerId::new(o.as_str()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(pipeline: Pipeline, args: &ArgMatches) -> anyhow::Result<()> {
    let owner = owner(args);
    let input = args
        .get_one::<String>("input")
        .map(String::as_str)
        .unwrap_or_default();
    let destination = args
        .get_one::<String>("destination")
        .map(String::as_str)
        .unwrap_or_default();
    let agent = args.get_one::<PathBuf>("agent");

    let request = pipeline.request(agent.map(PathBuf::as_path), input)?;
    let report = pipeline.run(&owner, &request, destination).await?;
    print_json(&report)?;
    print_json(&pipeline.feed(&owner, None).await?)?;

    if args.get_flag("schedule") {
        let pipeline = Arc::new(pipeline);
        let handle = schedule_agent(Arc::clone(&pipeline), &request.agent).await?;
        tokio::signal::ctrl_c().await?;
        pipeline.cancel();
        let ticks = handle.await?;
        eprintln!("proactive schedule stopped after {ticks} runs");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = InsightConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("loading configuration")?;
    let pipeline = Pipeline::from_config(config)?;

    match matches.subcommand() {
        Some(("run", args)) => match run(pipeline, args).await {
            Err(e) if matches!(e.downcast_ref::<PipelineError>(), Some(PipelineError::Reader(_))) => {
                eprintln!("{e}");
                std::process::exit(2);
            }
            other => other?,
        },
        Some(("inspect", args)) => {
            let agent = args
                .get_one::<PathBuf>("agent")
                .context("agent path required")?;
            print_json(&pipeline.inspect(agent).await?)?;
        }
        Some(("feed", args)) => {
            let limit = args.get_one::<usize>("limit").copied();
            print_json(&pipeline.feed(&owner(args), limit).await?)?;
        }
        Some(("clear", args)) => {
            let removed = pipeline.clear_feed(&owner(args)).await?;
            println!("removed {removed} cards");
        }
        _ => {}
    }
    Ok(())
}
