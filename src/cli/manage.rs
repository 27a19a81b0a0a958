use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Subcommand;

use super::{parse_moment, validation_error, AppContext, DateStyle};
use crate::{
    report::group_by_date,
    store::{
        entities::{
            DefaultView, Locale, NewProject, NewTag, NewTimeEntry, ProjectPatch, SettingsPatch,
            ThemeMode, TimeEntryPatch, WeekStart,
        },
        DataStore,
    },
    utils::time::{entry_date, format_duration, TIME_FORMAT},
};

const DEFAULT_PROJECT_COLOR: &str = "#E03131";
const DEFAULT_TAG_COLOR: &str = "blue";
const MIN_PROJECT_NAME: usize = 2;

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    #[command(about = "Create a project")]
    Add {
        name: String,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long, short, default_value = DEFAULT_PROJECT_COLOR)]
        color: String,
        #[arg(long, help = "Create the project as inactive")]
        inactive: bool,
    },
    #[command(about = "List projects, active ones first")]
    List {},
    #[command(about = "Change a project")]
    Update {
        id: String,
        #[arg(long, short)]
        name: Option<String>,
        #[arg(long, short, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long, short)]
        color: Option<String>,
        #[arg(long, help = "Mark the project active or inactive")]
        active: Option<bool>,
    },
    #[command(about = "Delete a project. Its entries are kept")]
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum EntryCommand {
    #[command(about = "Record time that wasn't tracked live")]
    Add {
        #[arg(long, short)]
        project: String,
        #[arg(long, short, help = "Start, for example \"9am\" or \"15/03/2025 09:00\"")]
        start: String,
        #[arg(long, short, help = "End, for example \"now\" or \"15/03/2025 17:30\"")]
        end: String,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long = "tag", short)]
        tags: Vec<String>,
        #[arg(long, default_value_t = DateStyle::Uk)]
        date_style: DateStyle,
    },
    #[command(about = "List recorded entries grouped by day")]
    List {
        #[arg(long, short, help = "Only entries of this project")]
        project: Option<String>,
        #[arg(long, short = 'n', help = "Only the most recent days")]
        days: Option<usize>,
    },
    #[command(about = "Change a recorded entry")]
    Update {
        id: String,
        #[arg(long, short)]
        project: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long, short)]
        start: Option<String>,
        #[arg(long, short)]
        end: Option<String>,
        #[arg(long = "tag", short, help = "Replaces all tags")]
        tags: Option<Vec<String>>,
        #[arg(long, default_value_t = DateStyle::Uk)]
        date_style: DateStyle,
    },
    #[command(about = "Delete a recorded entry")]
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum TagCommand {
    #[command(about = "Create a tag")]
    Add {
        name: String,
        #[arg(long, short, default_value = DEFAULT_TAG_COLOR)]
        color: String,
    },
    #[command(about = "List tags")]
    List {},
    #[command(about = "Delete a tag. Entries keep their reference")]
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    #[command(about = "Print current settings")]
    Show {},
    #[command(about = "Change settings")]
    Set {
        #[arg(long)]
        theme: Option<ThemeMode>,
        #[arg(long)]
        primary_color: Option<String>,
        #[arg(long)]
        locale: Option<Locale>,
        #[arg(long)]
        default_view: Option<DefaultView>,
        #[arg(long)]
        week_starts_on: Option<WeekStart>,
        #[arg(long)]
        idle_reminder: Option<bool>,
        #[arg(long, help = "Minutes of activity before the reminder. 0 turns it off")]
        idle_reminder_minutes: Option<u32>,
    },
}

pub async fn process_project_command(context: &AppContext, command: ProjectCommand) -> Result<()> {
    let mut store = context.open_store().await;
    let result = apply_project_command(&mut store, command);
    store.close().await?;
    result
}

fn apply_project_command(store: &mut DataStore, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::Add {
            name,
            description,
            color,
            inactive,
        } => {
            let project = store.add_project(NewProject {
                name: validate_project_name(name)?,
                description: description.filter(|v| !v.trim().is_empty()),
                color,
                is_active: !inactive,
            });
            println!("{}", project.id);
        }
        ProjectCommand::List {} => {
            for project in &store.data().projects {
                let state = if project.is_active { "" } else { " (inactive)" };
                println!(
                    "{}\t{}\t{}{state}\t{}",
                    project.id,
                    project.color,
                    project.name,
                    project.description.as_deref().unwrap_or_default()
                );
            }
        }
        ProjectCommand::Update {
            id,
            name,
            description,
            clear_description,
            color,
            active,
        } => {
            let description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };
            let patch = ProjectPatch {
                name: name.map(validate_project_name).transpose()?,
                description,
                color,
                is_active: active,
            };
            if !store.update_project(&id, patch) {
                return Err(validation_error(format!("No project with id {id}")));
            }
        }
        ProjectCommand::Delete { id } => {
            if !store.delete_project(&id) {
                return Err(validation_error(format!("No project with id {id}")));
            }
        }
    }
    Ok(())
}

fn validate_project_name(name: String) -> Result<String> {
    let name = name.trim().to_string();
    if name.chars().count() < MIN_PROJECT_NAME {
        return Err(validation_error(format!(
            "Project name must be at least {MIN_PROJECT_NAME} characters"
        )));
    }
    Ok(name)
}

pub async fn process_entry_command(context: &AppContext, command: EntryCommand) -> Result<()> {
    let mut store = context.open_store().await;
    let result = apply_entry_command(&mut store, command, Local::now());
    store.close().await?;
    result
}

fn apply_entry_command(
    store: &mut DataStore,
    command: EntryCommand,
    now: DateTime<Local>,
) -> Result<()> {
    match command {
        EntryCommand::Add {
            project,
            start,
            end,
            description,
            tags,
            date_style,
        } => {
            ensure_project(store, &project)?;
            let start = parse_moment(&start, now, date_style)?.with_timezone(&Utc);
            let end = parse_moment(&end, now, date_style)?.with_timezone(&Utc);
            let duration = span_seconds(start, end)?;
            let entry = store.add_time_entry(NewTimeEntry {
                project_id: Some(project),
                description: description.filter(|v| !v.is_empty()),
                start_time: start,
                end_time: Some(end),
                duration,
                date: entry_date(start),
                tags,
            });
            println!("{}", entry.id);
        }
        EntryCommand::List { project, days } => {
            let entries = store
                .data()
                .time_entries
                .iter()
                .filter(|v| project.is_none() || v.project_id == project)
                .cloned()
                .collect::<Vec<_>>();
            let groups = group_by_date(&entries);
            for (date, entries) in groups.into_iter().take(days.unwrap_or(usize::MAX)) {
                let total = entries.iter().map(|v| v.duration).sum::<u64>();
                println!("{date}\t{}", format_duration(total));
                for entry in entries {
                    println!(
                        "  {}\t{}-{}\t{}\t{}\t{}",
                        entry.id,
                        entry.start_time.with_timezone(&Local).format(TIME_FORMAT),
                        entry
                            .end_time
                            .map(|v| v.with_timezone(&Local).format(TIME_FORMAT).to_string())
                            .unwrap_or_default(),
                        format_duration(entry.duration),
                        store.project_name(entry.project_id.as_deref()),
                        entry.description.as_deref().unwrap_or_default()
                    );
                }
            }
        }
        EntryCommand::Update {
            id,
            project,
            description,
            start,
            end,
            tags,
            date_style,
        } => {
            let Some(current) = store.time_entry(&id).cloned() else {
                return Err(validation_error(format!("No time entry with id {id}")));
            };
            if let Some(project) = project.as_deref() {
                ensure_project(store, project)?;
            }
            let start = start
                .map(|v| parse_moment(&v, now, date_style).map(|v| v.with_timezone(&Utc)))
                .transpose()?;
            let end = end
                .map(|v| parse_moment(&v, now, date_style).map(|v| v.with_timezone(&Utc)))
                .transpose()?;

            let mut patch = TimeEntryPatch {
                project_id: project.map(Some),
                description: description.map(|v| Some(v).filter(|v| !v.is_empty())),
                tags,
                ..Default::default()
            };
            if start.is_some() || end.is_some() {
                let new_start = start.unwrap_or(current.start_time);
                let new_end = end.or(current.end_time);
                if let Some(new_end) = new_end {
                    patch.duration = Some(span_seconds(new_start, new_end)?);
                    patch.end_time = Some(Some(new_end));
                }
                patch.start_time = Some(new_start);
                patch.date = Some(entry_date(new_start));
            }
            store.update_time_entry(&id, patch);
        }
        EntryCommand::Delete { id } => {
            if !store.delete_time_entry(&id) {
                return Err(validation_error(format!("No time entry with id {id}")));
            }
        }
    }
    Ok(())
}

fn ensure_project(store: &DataStore, id: &str) -> Result<()> {
    if store.project(id).is_none() {
        return Err(validation_error(format!("No project with id {id}")));
    }
    Ok(())
}

fn span_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64> {
    if end < start {
        return Err(validation_error("End time must be after start time"));
    }
    Ok((end - start).num_seconds().unsigned_abs())
}

pub async fn process_tag_command(context: &AppContext, command: TagCommand) -> Result<()> {
    let mut store = context.open_store().await;
    let result = apply_tag_command(&mut store, command);
    store.close().await?;
    result
}

fn apply_tag_command(store: &mut DataStore, command: TagCommand) -> Result<()> {
    match command {
        TagCommand::Add { name, color } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(validation_error("Tag name can't be empty"));
            }
            let tag = store.add_tag(NewTag { name, color });
            println!("{}", tag.id);
        }
        TagCommand::List {} => {
            for tag in &store.data().tags {
                println!("{}\t{}\t{}", tag.id, tag.color, tag.name);
            }
        }
        TagCommand::Delete { id } => {
            if !store.delete_tag(&id) {
                return Err(validation_error(format!("No tag with id {id}")));
            }
        }
    }
    Ok(())
}

pub async fn process_settings_command(
    context: &AppContext,
    command: SettingsCommand,
) -> Result<()> {
    let mut store = context.open_store().await;
    let result = apply_settings_command(&mut store, command);
    store.close().await?;
    result
}

fn apply_settings_command(store: &mut DataStore, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show {} => {
            println!("{}", serde_json::to_string_pretty(store.settings())?);
        }
        SettingsCommand::Set {
            theme,
            primary_color,
            locale,
            default_view,
            week_starts_on,
            idle_reminder,
            idle_reminder_minutes,
        } => store.update_settings(SettingsPatch {
            theme,
            primary_color,
            locale,
            default_view,
            week_starts_on,
            idle_reminder_enabled: idle_reminder,
            idle_reminder_minutes,
        }),
    }
    Ok(())
}
