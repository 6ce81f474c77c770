//! Application state and command handling for the line-oriented front end.
//!
//! Each input line is parsed into a [`Command`], applied to the engine and
//! answered with the lines to print. Any change to what is displayed is
//! followed by a fresh rendering of the list.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use doitnow_proto::task::{Category, OwnerId, Priority, TaskId, UnknownVariant};
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::remote::{RemoteError, RemoteTasks};
use crate::sync::{SessionController, SyncEvent};
use crate::tasks::model::parse_due_date;
use crate::tasks::{
    CompletionStateMachine, FilterView, TaskDraft, TaskError, TaskStore, TaskWriter,
    TimeFilter, TimeWindows, WeekStart,
};

const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Message shown when the filtered list is empty.
pub const EMPTY_STATE: &str = "No tasks";

const HELP: &[&str] = &[
    "Commands:",
    "  login <owner>                 sign in and start syncing",
    "  logout                        sign out and clear the list",
    "  add <title> | <category> | <priority> | <due> [| <description>]",
    "  toggle <n>                    complete or reopen task n",
    "  delete <n>                    delete pending task n",
    "  edit <n> key=value;...        keys: title, category, priority, due, description",
    "  category <name>               Work, Daily, Vacation, Me time, Health",
    "  window <name>                 today, week, upcoming, overdue",
    "  list                          show the list again",
    "  help                          show this help",
    "  quit                          exit",
];

/// Fields of an `add` command, as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    /// Title.
    pub title: String,
    /// Category, if given.
    pub category: Option<Category>,
    /// Priority, if given.
    pub priority: Option<Priority>,
    /// Raw due date, if given.
    pub due: Option<String>,
    /// Description.
    pub description: String,
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Establish an owner session.
    Login(OwnerId),
    /// End the owner session.
    Logout,
    /// Create a task.
    Add(AddArgs),
    /// Toggle completion of the n-th displayed task (1-based).
    Toggle(usize),
    /// Delete the n-th displayed task.
    Delete(usize),
    /// Edit the n-th displayed task with `key=value` pairs.
    Edit(usize, Vec<(String, String)>),
    /// Switch category (resets the window to Today).
    Category(Category),
    /// Switch time window.
    Window(TimeFilter),
    /// Render the list.
    List,
    /// Show help.
    Help,
    /// Exit.
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(v, r)| (v, r.trim()));

        match verb.to_ascii_lowercase().as_str() {
            "login" if !rest.is_empty() => Ok(Self::Login(OwnerId::new(rest))),
            "login" => Err("usage: login <owner>".to_string()),
            "logout" => Ok(Self::Logout),
            "add" => parse_add(rest).map(Self::Add),
            "toggle" => parse_index(rest).map(Self::Toggle),
            "delete" => parse_index(rest).map(Self::Delete),
            "edit" => {
                let (index, pairs) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: edit <n> key=value;...".to_string())?;
                Ok(Self::Edit(parse_index(index)?, parse_pairs(pairs)?))
            }
            "category" => rest
                .parse::<Category>()
                .map(Self::Category)
                .map_err(|e| e.to_string()),
            "window" => rest.parse::<TimeFilter>().map(Self::Window),
            "list" | "ls" => Ok(Self::List),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command: {other} (try `help`)")),
        }
    }
}

fn parse_index(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("not a task number: {raw:?}")),
    }
}

fn parse_add(rest: &str) -> Result<AddArgs, String> {
    let mut fields = rest.splitn(5, '|').map(str::trim);
    let title = fields.next().unwrap_or_default().to_string();
    let non_empty = |f: Option<&str>| f.filter(|s| !s.is_empty()).map(str::to_string);

    let category = non_empty(fields.next())
        .map(|s| s.parse::<Category>())
        .transpose()
        .map_err(|e| e.to_string())?;
    let priority = non_empty(fields.next())
        .map(|s| s.parse::<Priority>())
        .transpose()
        .map_err(|e| e.to_string())?;
    let due = non_empty(fields.next());
    let description = fields.next().unwrap_or_default().to_string();

    Ok(AddArgs {
        title,
        category,
        priority,
        due,
        description,
    })
}

fn parse_pairs(raw: &str) -> Result<Vec<(String, String)>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                .ok_or_else(|| format!("expected key=value, got {pair:?}"))
        })
        .collect()
}

/// Labels a due instant relative to the local day of `now`.
///
/// Returns "Today", "Tomorrow" or "Yesterday" when applicable, otherwise
/// the date rendered with `date_format` (ISO `%Y-%m-%d` if that format is
/// invalid).
#[must_use]
pub fn format_due_label<Tz>(due: DateTime<Utc>, now: &DateTime<Tz>, date_format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let local_due = due.with_timezone(&now.timezone());
    match (local_due.date_naive() - now.date_naive()).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        _ => {
            let mut label = String::new();
            if write!(label, "{}", local_due.format(date_format)).is_err() {
                label = local_due.format(FALLBACK_DATE_FORMAT).to_string();
            }
            label
        }
    }
}

/// Main application state.
#[derive(Debug)]
pub struct App<R> {
    remote: Arc<R>,
    session: SessionController<R>,
    writer: TaskWriter<R>,
    completion: CompletionStateMachine,
    view: FilterView,
    default_category: Category,
    week_start: WeekStart,
    date_format: String,
    /// Set once `quit` has been entered.
    pub should_quit: bool,
}

impl<R: RemoteTasks> App<R> {
    /// Wires the engine over `remote`. Sync outcomes are reported on
    /// `events`.
    #[must_use]
    pub fn new(remote: Arc<R>, config: &ClientConfig, events: mpsc::Sender<SyncEvent>) -> Self {
        let store = TaskStore::new();
        Self {
            session: SessionController::new(
                Arc::clone(&remote),
                store.clone(),
                events,
                config.channel_capacity,
            ),
            writer: TaskWriter::new(Arc::clone(&remote), store.clone(), config.max_title_len),
            completion: CompletionStateMachine::new(store.clone(), config.max_title_len),
            view: FilterView::new(store, config.default_category),
            remote,
            default_category: config.default_category,
            week_start: config.week_start,
            date_format: config.date_format.clone(),
            should_quit: false,
        }
    }

    /// The signed-in owner, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&OwnerId> {
        self.session.owner()
    }

    /// Parses and applies one input line, returning the lines to print.
    pub async fn handle_line(&mut self, line: &str, now: DateTime<FixedOffset>) -> Vec<String> {
        match line.parse::<Command>() {
            Ok(command) => self.handle_command(command, now).await,
            Err(e) => vec![format!("Error: {e}")],
        }
    }

    /// Applies one command, returning the lines to print.
    pub async fn handle_command(&mut self, command: Command, now: DateTime<FixedOffset>) -> Vec<String> {
        let outcome = match command {
            Command::Login(owner) => {
                let notice = format!("Signed in as {owner}");
                match self.session.set_owner(Some(owner)).await {
                    // The first snapshot triggers the rendering.
                    Ok(()) => return vec![notice],
                    Err(e) => Err(e.to_string()),
                }
            }
            Command::Logout => self
                .session
                .set_owner(None)
                .await
                .map(|()| vec!["Signed out".to_string()])
                .map_err(|e| e.to_string()),
            Command::Add(args) => self.add(args, now).await,
            Command::Toggle(n) => self.toggle(n, now).await,
            Command::Delete(n) => self.delete(n, now).await,
            Command::Edit(n, pairs) => self.edit(n, &pairs, now).await,
            Command::Category(category) => {
                self.view.select_category(category);
                Ok(Vec::new())
            }
            Command::Window(window) => {
                self.view.select_window(window);
                Ok(Vec::new())
            }
            Command::List => Ok(Vec::new()),
            Command::Help => return HELP.iter().map(ToString::to_string).collect(),
            Command::Quit => {
                self.should_quit = true;
                return Vec::new();
            }
        };

        let mut out = outcome.unwrap_or_else(|e| vec![format!("Error: {e}")]);
        out.extend(self.render(now));
        out
    }

    /// Reacts to a sync outcome, returning the lines to print.
    pub fn on_sync_event(&mut self, event: &SyncEvent, now: DateTime<FixedOffset>) -> Vec<String> {
        let mut out = Vec::new();
        match event {
            SyncEvent::Reconciled { discarded, .. } => {
                if *discarded > 0 {
                    out.push(format!("Skipped {discarded} unreadable task(s)"));
                }
            }
            SyncEvent::ReadFailed(message) => {
                out.push(format!("Error: {}", TaskError::RemoteReadFailure(message.clone())));
            }
            SyncEvent::Closed => {
                if let Some(owner) = self.owner() {
                    out.push(format!("Sync stopped; `login {owner}` to reconnect"));
                }
                return out;
            }
        }
        out.extend(self.render(now));
        out
    }

    /// Renders the header and the displayed list.
    pub fn render(&mut self, now: DateTime<FixedOffset>) -> Vec<String> {
        let windows = TimeWindows::compute(&now, self.week_start);
        let selection = self.view.selection();
        let tasks = self.view.displayed(&windows);

        let who = self
            .owner()
            .map_or_else(|| "signed out".to_string(), ToString::to_string);
        let mut out = vec![format!("[{}] {} ({who})", selection.category, selection.window)];
        if tasks.is_empty() {
            out.push(format!("  {EMPTY_STATE}"));
            return out;
        }
        for (i, task) in tasks.iter().enumerate() {
            out.push(format!(
                "{:>3}. [{}] {:<20} {:<6} {}",
                i + 1,
                if task.is_completed() { 'x' } else { ' ' },
                task.title,
                task.priority,
                format_due_label(task.due_date, &now, &self.date_format),
            ));
        }
        out
    }

    /// The `n`-th (1-based) task currently displayed.
    fn nth_displayed(&mut self, n: usize, now: DateTime<FixedOffset>) -> Result<TaskId, String> {
        let windows = TimeWindows::compute(&now, self.week_start);
        let tasks = self.view.displayed(&windows);
        n.checked_sub(1)
            .and_then(|i| tasks.get(i))
            .map(|t| t.id.clone())
            .ok_or_else(|| format!("no task number {n}"))
    }

    async fn add(&self, args: AddArgs, now: DateTime<FixedOffset>) -> Result<Vec<String>, String> {
        let due_date = match &args.due {
            Some(raw) => parse_due(raw, &now)?,
            None => now.with_timezone(&Utc),
        };
        let draft = TaskDraft {
            title: args.title,
            category: args.category.unwrap_or(self.default_category),
            priority: args.priority.unwrap_or_default(),
            due_date,
            description: args.description,
        };
        let task = self
            .writer
            .submit(self.session.owner(), draft, now.with_timezone(&Utc))
            .await
            .map_err(|e| e.to_string())?;
        Ok(vec![format!("Added \"{}\"", task.title)])
    }

    async fn toggle(&mut self, n: usize, now: DateTime<FixedOffset>) -> Result<Vec<String>, String> {
        let id = self.nth_displayed(n, now)?;
        let task = self
            .completion
            .toggle(&id, now.with_timezone(&Utc))
            .map_err(|e| e.to_string())?;
        let state = if task.is_completed() { "Completed" } else { "Reopened" };
        let saved = self.remote.set_completion(&id, task.completed_at).await;
        Ok(mirrored(format!("{state} \"{}\"", task.title), saved))
    }

    async fn delete(&mut self, n: usize, now: DateTime<FixedOffset>) -> Result<Vec<String>, String> {
        let id = self.nth_displayed(n, now)?;
        let task = self.completion.delete(&id).map_err(|e| e.to_string())?;
        let saved = self.remote.delete(&id).await;
        Ok(mirrored(format!("Deleted \"{}\"", task.title), saved))
    }

    async fn edit(
        &mut self,
        n: usize,
        pairs: &[(String, String)],
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<String>, String> {
        let id = self.nth_displayed(n, now)?;
        let mut draft = self.completion.begin_edit(&id).map_err(|e| e.to_string())?;
        for (key, value) in pairs {
            match key.as_str() {
                "title" => draft.title.clone_from(value),
                "category" => draft.category = value.parse().map_err(|e: UnknownVariant| e.to_string())?,
                "priority" => draft.priority = value.parse().map_err(|e: UnknownVariant| e.to_string())?,
                "due" => draft.due_date = parse_due(value, &now)?,
                "description" => draft.description.clone_from(value),
                other => return Err(format!("unknown field: {other}")),
            }
        }
        let task = self
            .completion
            .apply_edit(&id, draft)
            .map_err(|e| e.to_string())?;
        let saved = self.remote.update_fields(&id, task.record()).await;
        Ok(mirrored(format!("Updated \"{}\"", task.title), saved))
    }
}

fn parse_due(raw: &str, now: &DateTime<FixedOffset>) -> Result<DateTime<Utc>, String> {
    parse_due_date(raw, &now.timezone()).ok_or_else(|| format!("unreadable due date: {raw:?}"))
}

/// A local change succeeded; report whether its remote mirror did too. A
/// failed mirror write is corrected by the next snapshot.
fn mirrored(notice: String, saved: Result<(), RemoteError>) -> Vec<String> {
    match saved {
        Ok(()) => vec![notice],
        Err(e) => {
            tracing::warn!(error = %e, "mirror write failed");
            vec![notice, format!("Error: {}", TaskError::RemoteWriteFailure(e))]
        }
    }
}
