use super::*;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["geobench-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_and_seed_commands() {
    let migrate = Cli::try_parse_from(["geobench-cli", "db", "migrate"]).unwrap();
    assert!(matches!(
        migrate.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));

    let seed = Cli::try_parse_from(["geobench-cli", "db", "seed"]).unwrap();
    assert!(matches!(
        seed.command,
        Some(Commands::Db {
            command: DbCommands::Seed
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["geobench-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn run_defaults_to_manual_trigger_and_all_engines() {
    let cli = Cli::try_parse_from(["geobench-cli", "run"]).unwrap();
    match cli.command {
        Some(Commands::Run {
            trigger,
            engines,
            query_limit,
        }) => {
            assert_eq!(trigger, TriggerType::Manual);
            assert!(engines.is_empty());
            assert_eq!(query_limit, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn run_accepts_repeated_engines_and_limit() {
    let cli = Cli::try_parse_from([
        "geobench-cli",
        "run",
        "--engine",
        "grok_web_search",
        "--engine",
        "claude_parametric",
        "--query-limit",
        "5",
        "--trigger",
        "scheduled",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Run {
            trigger,
            engines,
            query_limit,
        }) => {
            assert_eq!(trigger, TriggerType::Scheduled);
            assert_eq!(
                engines,
                vec![EngineKind::GrokWebSearch, EngineKind::ClaudeParametric]
            );
            assert_eq!(query_limit, Some(5));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn run_rejects_unknown_engine() {
    let result = Cli::try_parse_from(["geobench-cli", "run", "--engine", "bard"]);
    assert!(result.is_err());
}

#[test]
fn parses_resume_with_force() {
    let cli = Cli::try_parse_from(["geobench-cli", "resume", "42", "--force"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Resume {
            run_id: 42,
            force: true
        })
    ));
}

#[test]
fn resume_requires_run_id() {
    assert!(Cli::try_parse_from(["geobench-cli", "resume"]).is_err());
}

#[test]
fn parses_runs_list_default_limit() {
    let cli = Cli::try_parse_from(["geobench-cli", "runs", "list"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Runs {
            command: RunsCommands::List { limit: 20 }
        })
    ));
}

#[test]
fn parses_runs_show_and_aggregate() {
    let show = Cli::try_parse_from(["geobench-cli", "runs", "show", "7"]).unwrap();
    assert!(matches!(
        show.command,
        Some(Commands::Runs {
            command: RunsCommands::Show { run_id: 7 }
        })
    ));

    let aggregate = Cli::try_parse_from(["geobench-cli", "aggregate", "7"]).unwrap();
    assert!(matches!(
        aggregate.command,
        Some(Commands::Aggregate { run_id: 7 })
    ));
}
