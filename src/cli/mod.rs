pub mod add;
pub mod confirm;
pub mod output;

use std::path::PathBuf;

use add::{parse_entry_time, DateStyle};
use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand};
use confirm::StdinConfirm;
use tracing::level_filters::LevelFilter;

use crate::{
    store::{entities::EntryId, kv::FileStorage},
    tracker::Tracker,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, ensure_dir},
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "sticks", version)]
#[command(about = "Log habit events and see how long it has been since the last one", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $STICKS_DIR, then $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Log an entry, now or at a given time")]
    Add {
        #[arg(
            long,
            help = "When it happened. Examples are \"10 minutes ago\", \"yesterday 21:30\", \"15/03/2025 12:00\""
        )]
        at: Option<String>,
        #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
        date_style: DateStyle,
    },
    #[command(about = "Remove a single entry by id")]
    Remove { id: String },
    #[command(about = "Remove every entry")]
    Clear {
        #[arg(short, long, help = "Don't ask for confirmation")]
        yes: bool,
    },
    #[command(about = "Show entries grouped by day with an hourly histogram")]
    List {
        #[arg(short, long, help = "Only show the last N days, today included")]
        days: Option<u32>,
        #[arg(short, long, help = "Only show day headers and histograms")]
        collapsed: bool,
    },
    #[command(about = "Show or change the minimum interval between entries")]
    Interval {
        #[command(subcommand)]
        command: IntervalCommand,
    },
    #[command(about = "Check whether the interval has passed since the last entry")]
    Check,
}

#[derive(Subcommand, Debug)]
enum IntervalCommand {
    #[command(about = "Print the current interval in minutes")]
    Show,
    #[command(about = "Set the interval in minutes")]
    Set {
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

pub fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&app_dir, logging_level, args.log)?;

    let storage = FileStorage::new(app_dir.join("storage"))
        .with_context(|| format!("Failed to open storage in {app_dir:?}"))?;
    let mut tracker = Tracker::open(storage, Box::new(DefaultClock));
    tracker.on_persist_failure(|e| {
        eprintln!(
            "{}",
            output::warning(&format!("Changes were not saved and will be lost: {e}"))
        )
    });

    match args.commands {
        Commands::Add { at, date_style } => {
            let timestamp = match at {
                Some(at) => parse_entry_time(&at, tracker.now(), date_style).map_err(|e| {
                    Args::command().error(clap::error::ErrorKind::ValueValidation, e)
                })?,
                None => tracker.now(),
            };
            let id = tracker.add_at(timestamp);
            println!("{}", output::added(&id, timestamp));
        }
        Commands::Remove { id } => {
            let id = EntryId::from(id);
            if tracker.remove(&id) {
                println!("Removed {id}");
            } else {
                println!("{}", output::warning(&format!("No entry with id {id}")));
            }
        }
        Commands::Clear { yes } => {
            let cleared = if yes {
                tracker.clear(&mut |_: &str| true)
            } else {
                tracker.clear(&mut StdinConfirm)
            };
            if cleared {
                println!("All entries removed");
            }
        }
        Commands::List { days, collapsed } => {
            let now = tracker.now().with_timezone(&Local);
            let views = output::last_days(tracker.view(), now, days);
            print!(
                "{}",
                output::render_days(views, tracker.entries().len(), collapsed, &Local)
            );
        }
        Commands::Interval { command } => match command {
            IntervalCommand::Show => println!("{} minutes", tracker.interval()),
            IntervalCommand::Set { value } => match tracker.set_interval(&value) {
                Ok(v) => println!("Interval set to {v} minutes"),
                Err(e) => {
                    return Err(Args::command()
                        .error(
                            clap::error::ErrorKind::ValueValidation,
                            format!("{e}. Keeping {} minutes", tracker.interval()),
                        )
                        .into());
                }
            },
        },
        Commands::Check => {
            println!("{}", output::check_message(&tracker.check(), tracker.interval()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, Commands, IntervalCommand};

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn negative_interval_reaches_validation() {
        let args = Args::try_parse_from(["sticks", "interval", "set", "-5"]).unwrap();
        let Commands::Interval {
            command: IntervalCommand::Set { value },
        } = args.commands
        else {
            panic!("expected interval set");
        };
        assert_eq!(value, "-5");
    }

    #[test]
    fn global_dir_after_subcommand() {
        let args =
            Args::try_parse_from(["sticks", "list", "--days", "3", "--dir", "/tmp/x"]).unwrap();
        assert_eq!(args.dir.as_deref(), Some(std::path::Path::new("/tmp/x")));
        assert!(matches!(
            args.commands,
            Commands::List {
                days: Some(3),
                collapsed: false
            }
        ));
    }
}
