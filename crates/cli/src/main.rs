use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use earshot_config::ConfigManager;
use earshot_core::BookId;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod commands;
mod engine;
mod library;

fn book_arg() -> Arg {
    Arg::new("book")
        .required(true)
        .value_name("BOOK_ID")
        .help("Book id from the library manifest")
}

fn direct_arg() -> Arg {
    Arg::new("direct")
        .long("direct")
        .help("Skip stream negotiation and use direct file URLs")
        .action(ArgAction::SetTrue)
}

fn build_cli() -> Command {
    Command::new("earshot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Audiobook playback timeline and streaming client")
        .arg(
            Arg::new("library")
                .short('l')
                .long("library")
                .value_name("PATH")
                .help("Path to the JSON library manifest")
                .default_value("library.json")
                .global(true),
        )
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config dir)")
                .global(true),
        )
        .subcommand(Command::new("list").about("List the books in the library"))
        .subcommand(
            Command::new("timeline")
                .about("Show how a book's files line up on one timeline")
                .arg(book_arg()),
        )
        .subcommand(
            Command::new("resolve")
                .about("Find the file and offset for a book position")
                .arg(book_arg())
                .arg(
                    Arg::new("position")
                        .required(true)
                        .value_name("POSITION")
                        .allow_negative_numbers(true)
                        .help("Milliseconds, or [H:]M:SS"),
                ),
        )
        .subcommand(
            Command::new("prepare")
                .about("Prepare a book for playback, negotiating streams with the server")
                .arg(book_arg())
                .arg(direct_arg()),
        )
        .subcommand(
            Command::new("listen")
                .about("Play a book on a simulated engine and save progress")
                .arg(book_arg())
                .arg(direct_arg())
                .arg(
                    Arg::new("for")
                        .long("for")
                        .value_name("SECONDS")
                        .help("How long to listen")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("60"),
                )
                .arg(
                    Arg::new("speed")
                        .short('s')
                        .long("speed")
                        .value_name("SPEED")
                        .help("Playback speed (0.5-3.0); remembered for this book")
                        .value_parser(clap::value_parser!(f32))
                        .conflicts_with("steps"),
                )
                .arg(
                    Arg::new("steps")
                        .long("steps")
                        .value_name("N")
                        .help("Change the resume speed by N speed steps")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(i32)),
                )
                .arg(
                    Arg::new("sleep")
                        .long("sleep")
                        .value_name("MINUTES")
                        .help("Pause after this many minutes")
                        .value_parser(clap::value_parser!(u32))
                        .conflicts_with("end-of-chapter"),
                )
                .arg(
                    Arg::new("end-of-chapter")
                        .long("end-of-chapter")
                        .help("Pause at the end of the current chapter")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create the config file")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("init").about("Write a default config file"))
                .subcommand(Command::new("check").about("Report problems in the config file"))
                .subcommand(
                    Command::new("reset").about("Overwrite the config file with defaults"),
                ),
        )
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    match matches.get_one::<String>("config-dir") {
        Some(dir) => Ok(ConfigManager::with_directory(PathBuf::from(dir))),
        None => ConfigManager::new().context("Failed to locate the config directory"),
    }
}

/// Logger filtered by the configured level; `RUST_LOG` still wins
fn init_logging(config: &ConfigManager) {
    let level = config.load_or_default().app.log_level;
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .init();
}

fn book_id(matches: &ArgMatches) -> Result<BookId> {
    matches
        .get_one::<String>("book")
        .map(|id| BookId::new(id.as_str()))
        .ok_or_else(|| anyhow::anyhow!("Book ID is required"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = config_manager(&matches)?;
    init_logging(&config);

    let result = run(&matches, config).await;
    if let Err(err) = &result {
        if let Some(hint) = commands::failure_hint(err) {
            eprintln!("{} {}", console::style("!").red().bold(), hint);
        }
    }
    result
}

async fn run(matches: &ArgMatches, config: ConfigManager) -> Result<()> {
    let library = matches
        .get_one::<String>("library")
        .map(Path::new)
        .unwrap_or_else(|| Path::new("library.json"));

    match matches.subcommand() {
        Some(("list", _)) => commands::list_books(library),
        Some(("timeline", sub)) => commands::show_timeline(library, config, &book_id(sub)?),
        Some(("resolve", sub)) => {
            let position = sub
                .get_one::<String>("position")
                .ok_or_else(|| anyhow::anyhow!("Position is required"))?;
            let position = commands::parse_position(position)?;
            commands::resolve_position(library, config, &book_id(sub)?, position)
        }
        Some(("prepare", sub)) => {
            commands::prepare_book(library, config, &book_id(sub)?, sub.get_flag("direct")).await
        }
        Some(("listen", sub)) => {
            let options = commands::ListenOptions {
                duration: Duration::from_secs(sub.get_one::<u64>("for").copied().unwrap_or(60)),
                speed: sub.get_one::<f32>("speed").copied(),
                speed_steps: sub.get_one::<i32>("steps").copied().unwrap_or(0),
                sleep_minutes: sub.get_one::<u32>("sleep").copied(),
                sleep_end_of_chapter: sub.get_flag("end-of-chapter"),
                direct: sub.get_flag("direct"),
            };
            commands::listen(library, config, &book_id(sub)?, options).await
        }
        Some(("config", sub)) => match sub.subcommand() {
            Some(("show", _)) => commands::config_show(&config),
            Some(("init", _)) => commands::config_init(&config),
            Some(("check", _)) => commands::config_check(&config),
            Some(("reset", _)) => commands::config_reset(&config),
            _ => {
                build_cli().print_help()?;
                Ok(())
            }
        },
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_listen_arguments() {
        let matches = build_cli()
            .try_get_matches_from([
                "earshot", "listen", "b1", "--for", "30", "--steps", "-2", "--sleep", "15",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();

        assert_eq!(book_id(sub).unwrap(), BookId::from("b1"));
        assert_eq!(sub.get_one::<u64>("for"), Some(&30));
        assert_eq!(sub.get_one::<i32>("steps"), Some(&-2));
        assert_eq!(sub.get_one::<u32>("sleep"), Some(&15));
    }

    #[test]
    fn test_sleep_options_conflict() {
        let result = build_cli().try_get_matches_from([
            "earshot",
            "listen",
            "b1",
            "--sleep",
            "10",
            "--end-of-chapter",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_library_flag() {
        let matches = build_cli()
            .try_get_matches_from(["earshot", "timeline", "b1", "--library", "/tmp/lib.json"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("library").map(String::as_str),
            Some("/tmp/lib.json")
        );
    }
}
