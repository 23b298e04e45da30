//! qix CLI - Track projects, modules, tasks, sprints and time locally.

use clap::Parser;
use qix::cli::{
    Cli, Commands, ModuleCommands, ProjectCommands, SprintCommands, SystemCommands, TaskCommands,
    TrackCommands,
};
use qix::commands::{self, CommandResult, TaskCreateArgs, TaskEditArgs};
use qix::config::{Config, ConfigOverrides, OutputFormat, ResolvedSettings};
use qix::logging;
use qix::storage::Storage;
use std::process;

fn main() {
    let cli = Cli::parse();

    let mut overrides = ConfigOverrides::new();
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    if let Some(level) = cli.log_level {
        overrides = overrides.with_log_level(level);
    }

    let config = match Config::load(cli.data_dir.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => exit_with_error(&e, cli.human_readable),
    };
    let human = config.settings.output_format.value == OutputFormat::Human;

    // Held until exit so buffered log lines reach the file.
    let log_guard = match logging::init(&config.settings) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {}", e);
            None
        }
    };
    tracing::debug!(data_dir = %config.paths.root().display(), "starting");

    let storage = match Storage::open(config.paths.clone()) {
        Ok(storage) => storage,
        Err(e) => exit_with_error(&e, human),
    };

    let result = run_command(cli.command, &storage, &config.settings, human);

    if let Err(e) = storage.sync_index() {
        tracing::warn!(error = %e, "index snapshot was not written");
    }

    let failed = match result {
        Ok(()) => false,
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            print_error(&e, human);
            true
        }
    };

    drop(storage);
    drop(log_guard);
    if failed {
        process::exit(1);
    }
}

fn print_error(e: &qix::Error, human: bool) {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
}

fn exit_with_error(e: &qix::Error, human: bool) -> ! {
    print_error(e, human);
    process::exit(1);
}

fn run_command(
    command: Commands,
    storage: &Storage,
    settings: &ResolvedSettings,
    human: bool,
) -> Result<(), qix::Error> {
    match command {
        Commands::Project { command } => match command {
            ProjectCommands::Create {
                name,
                description,
                tag,
            } => output(&commands::project_create(storage, &name, &description, tag)?, human),
            ProjectCommands::List => output(&commands::project_list(storage)?, human),
            ProjectCommands::Show { name } => output(&commands::project_show(storage, &name)?, human),
            ProjectCommands::Delete { name } => {
                output(&commands::project_delete(storage, &name)?, human)
            }
            ProjectCommands::Rename { old, new } => {
                output(&commands::project_rename(storage, &old, &new)?, human)
            }
            ProjectCommands::Stats { name } => {
                output(&commands::project_stats(storage, &name)?, human)
            }
        },

        Commands::Module { command } => match command {
            ModuleCommands::Create {
                path,
                description,
                tag,
            } => output(&commands::module_create(storage, &path, &description, tag)?, human),
            ModuleCommands::List { project } => {
                output(&commands::module_list(storage, &project)?, human)
            }
            ModuleCommands::Show { path } => output(&commands::module_show(storage, &path)?, human),
            ModuleCommands::Edit {
                path,
                name,
                description,
                tag,
            } => output(
                &commands::module_edit(storage, &path, name, description, tag)?,
                human,
            ),
            ModuleCommands::Remove { path } => {
                output(&commands::module_remove(storage, &path)?, human)
            }
        },

        Commands::Task { command } => run_task_command(command, storage, settings, human)?,

        Commands::Sprint { command } => match command {
            SprintCommands::Create {
                project,
                name,
                start,
                end,
            } => output(
                &commands::sprint_create(storage, &project, &name, &start, &end)?,
                human,
            ),
            SprintCommands::List { project } => {
                output(&commands::sprint_list(storage, &project)?, human)
            }
            SprintCommands::Show { project, name } => {
                output(&commands::sprint_show(storage, &project, &name)?, human)
            }
            SprintCommands::Assign {
                project,
                sprint,
                task,
            } => output(
                &commands::sprint_assign(storage, &project, &sprint, &task)?,
                human,
            ),
            SprintCommands::Unassign {
                project,
                sprint,
                task,
            } => output(
                &commands::sprint_unassign(storage, &project, &sprint, &task)?,
                human,
            ),
            SprintCommands::Remove { project, name } => {
                output(&commands::sprint_remove(storage, &project, &name)?, human)
            }
        },

        Commands::Track { command } => match command {
            TrackCommands::Start { path, task, switch } => {
                output(&commands::track_start(storage, &path, &task, switch)?, human)
            }
            TrackCommands::Stop { discard } => output(&commands::track_stop(storage, discard)?, human),
            TrackCommands::Status => output(&commands::track_status(storage)?, human),
            TrackCommands::Log { date } => {
                output(&commands::track_log(storage, date.as_deref())?, human)
            }
            TrackCommands::Switch { path, task } => {
                output(&commands::track_switch(storage, &path, &task)?, human)
            }
            TrackCommands::List => output(&commands::track_list(storage)?, human),
        },

        Commands::System { command } => match command {
            SystemCommands::Health => output(&commands::system_health(storage)?, human),
            SystemCommands::Reindex => output(&commands::system_reindex(storage)?, human),
            SystemCommands::Compact => output(&commands::system_compact(storage)?, human),
            SystemCommands::Flush => output(&commands::system_flush(storage)?, human),
            SystemCommands::Stats => output(&commands::system_stats(storage)?, human),
        },
    }

    Ok(())
}

fn run_task_command(
    command: TaskCommands,
    storage: &Storage,
    settings: &ResolvedSettings,
    human: bool,
) -> Result<(), qix::Error> {
    match command {
        TaskCommands::Create {
            path,
            title,
            description,
            priority,
            estimate,
            tag,
            jira,
            parent,
        } => {
            let args = TaskCreateArgs {
                description,
                priority,
                estimate,
                tags: tag,
                jira,
                parent,
            };
            output(&commands::task_create(storage, settings, &path, &title, args)?, human)
        }
        TaskCommands::List { path, status } => output(
            &commands::task_list(storage, &path, status.as_deref())?,
            human,
        ),
        TaskCommands::Show { id, project } => output(
            &commands::task_show(storage, settings, &id, project.as_deref())?,
            human,
        ),
        TaskCommands::Update { id, status, project } => output(
            &commands::task_update(storage, &id, &status, project.as_deref())?,
            human,
        ),
        TaskCommands::Edit {
            id,
            project,
            title,
            description,
            priority,
            estimate,
            tag,
            jira,
        } => {
            let args = TaskEditArgs {
                title,
                description,
                priority,
                estimate,
                tags: tag,
                jira,
            };
            output(
                &commands::task_edit(storage, &id, project.as_deref(), args)?,
                human,
            )
        }
        TaskCommands::Remove { id, project } => output(
            &commands::task_remove(storage, &id, project.as_deref())?,
            human,
        ),
        TaskCommands::Link {
            child,
            parent,
            project,
        } => output(
            &commands::task_link(storage, &child, &parent, project.as_deref())?,
            human,
        ),
        TaskCommands::Unlink { id, project } => output(
            &commands::task_unlink(storage, &id, project.as_deref())?,
            human,
        ),
        TaskCommands::Depend { id, on, project } => output(
            &commands::task_depend(storage, &id, &on, project.as_deref())?,
            human,
        ),
        TaskCommands::Undepend { id, on, project } => output(
            &commands::task_undepend(storage, &id, &on, project.as_deref())?,
            human,
        ),
        TaskCommands::Recur {
            id,
            pattern,
            project,
        } => output(
            &commands::task_recur(storage, &id, &pattern, project.as_deref())?,
            human,
        ),
        TaskCommands::Unrecur { id, project } => output(
            &commands::task_unrecur(storage, &id, project.as_deref())?,
            human,
        ),
        TaskCommands::Due { date } => output(&commands::task_due(storage, date.as_deref())?, human),
        TaskCommands::Complete { id, project } => output(
            &commands::task_complete(storage, &id, project.as_deref())?,
            human,
        ),
        TaskCommands::Time {
            id,
            hours,
            date,
            project,
        } => output(
            &commands::task_time(storage, &id, hours, date.as_deref(), project.as_deref())?,
            human,
        ),
        TaskCommands::Locate { id } => output(&commands::task_locate(storage, &id)?, human),
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: CommandResult>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
