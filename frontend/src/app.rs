use sauron::{
    html::{attributes::*, *},
    prelude::*,
};
use shared::{format_due_date, CreateTaskRequest, DeleteTaskResponse, Task, UpdateTaskRequest};
use uuid::Uuid;
use web_sys::{console, window};

use crate::{
    api,
    error::ClientError,
    state::{Filter, NoticeKind, PendingWrite, RefreshOutcome, RefreshTicket, TaskState, UpdateKind},
};

/// How often local storage is checked for a session appearing or going away.
const SESSION_POLL_MS: i32 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Page {
    All,
    Important,
    Completed,
    Incomplete,
}

impl Page {
    fn to_path(self) -> &'static str {
        match self {
            Page::All => "/",
            Page::Important => "/important",
            Page::Completed => "/completed",
            Page::Incomplete => "/incomplete",
        }
    }

    fn from_path(path: &str) -> Self {
        match path {
            "/important" => Page::Important,
            "/completed" => Page::Completed,
            "/incomplete" => Page::Incomplete,
            _ => Page::All,
        }
    }

    fn filter(self) -> Filter {
        match self {
            Page::All => Filter::All,
            Page::Important => Filter::Important,
            Page::Completed => Filter::Completed,
            Page::Incomplete => Filter::Incomplete,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Page::All => "All Tasks",
            Page::Important => "Important Tasks",
            Page::Completed => "Completed Tasks",
            Page::Incomplete => "Do It Now",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Msg {
    NavigateTo(Page),

    CheckSession,
    SignOut,
    Refresh,
    Refreshed(RefreshTicket, Result<Vec<Task>, ClientError>),

    OpenCreate,
    StartEdit(Uuid),
    CloseModal,
    SetDraftTitle(String),
    SetDraftDescription(String),
    SetDraftDate(String),
    ToggleDraftCompleted,
    ToggleDraftImportant,

    SubmitCreate,
    Created(Result<Task, ClientError>),
    ToggleCompletion(Uuid, bool),
    SubmitEdit,
    Updated(UpdateKind, Uuid, PendingWrite, Result<Task, ClientError>),
    Remove(Uuid),
    Removed(Uuid, Result<DeleteTaskResponse, ClientError>),

    DismissNotice(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modal {
    Create,
    Edit(Uuid),
}

/// Form contents shared by the create and edit modals.
#[derive(Debug, Clone, Default)]
struct TaskDraft {
    title: String,
    description: String,
    date: String,
    completed: bool,
    important: bool,
}

impl TaskDraft {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            date: shared::date::to_wire(task.date),
            completed: task.is_completed,
            important: task.is_important,
        }
    }

    fn to_create_request(&self) -> CreateTaskRequest {
        CreateTaskRequest {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            date: Some(self.date.clone()),
            completed: self.completed,
            important: self.important,
        }
    }

    fn to_update_request(&self) -> UpdateTaskRequest {
        UpdateTaskRequest {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            date: Some(self.date.clone()),
            is_important: Some(self.important),
            ..UpdateTaskRequest::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    current_page: Page,
    state: TaskState,
    modal: Option<Modal>,
    draft: TaskDraft,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            current_page: Page::All,
            state: TaskState::new(),
            modal: None,
            draft: TaskDraft::default(),
        }
    }
}

fn refresh(ticket: Option<RefreshTicket>) -> Cmd<Msg> {
    match ticket {
        Some(ticket) => Cmd::new(async move { Msg::Refreshed(ticket, api::fetch_tasks().await) }),
        None => Cmd::none(),
    }
}

fn check_session_later() -> Cmd<Msg> {
    Cmd::new(async {
        sauron::dom::delay(SESSION_POLL_MS).await;
        Msg::CheckSession
    })
}

fn expire(notice_id: u64, after_ms: u32) -> Cmd<Msg> {
    Cmd::new(async move {
        sauron::dom::delay(after_ms as i32).await;
        Msg::DismissNotice(notice_id)
    })
}

impl Application for Model {
    type MSG = Msg;

    fn init(&mut self) -> Cmd<Msg> {
        if let Some(window) = window() {
            if let Ok(pathname) = window.location().pathname() {
                self.current_page = Page::from_path(&pathname);
            }
        }

        if api::session_token().is_none() {
            console::log_1(&"no session yet; tasks will load after sign-in".into());
        }
        Cmd::new(async { Msg::CheckSession })
    }

    fn update(&mut self, msg: Msg) -> Cmd<Msg> {
        let cmd = self.apply(msg);
        let expiries: Vec<Cmd<Msg>> = self
            .state
            .take_new_notices()
            .into_iter()
            .map(|notice| expire(notice.id, notice.kind.lifetime_ms()))
            .collect();
        if expiries.is_empty() {
            cmd
        } else {
            Cmd::batch(expiries.into_iter().chain(std::iter::once(cmd)))
        }
    }

    fn view(&self) -> Node<Msg> {
        div(
            [class("min-h-screen bg-ctp-base text-ctp-text flex gap-6 p-6")],
            [
                self.view_sidebar(),
                div([class("flex-1 bg-ctp-surface0 rounded-lg shadow-lg p-6 border border-ctp-surface1")], [
                    if self.state.is_ready() {
                        self.view_tasks()
                    } else {
                        self.view_signed_out()
                    },
                ]),
                self.view_modal(),
                self.view_notices(),
            ],
        )
    }
}

impl Model {
    fn apply(&mut self, msg: Msg) -> Cmd<Msg> {
        match msg {
            Msg::NavigateTo(page) => {
                self.current_page = page;
                if let Some(history) = window().and_then(|w| w.history().ok()) {
                    let _ = history.push_state_with_url(
                        &wasm_bindgen::JsValue::NULL,
                        "",
                        Some(page.to_path()),
                    );
                }
                Cmd::none()
            }
            Msg::CheckSession => {
                let has_token = api::session_token().is_some();
                let cmd = match (has_token, self.state.is_ready()) {
                    (true, false) => refresh(self.state.observe_session()),
                    (false, true) => {
                        console::log_1(&"session token is gone; signing out".into());
                        self.end_session();
                        Cmd::none()
                    }
                    _ => Cmd::none(),
                };
                Cmd::batch([cmd, check_session_later()])
            }
            Msg::SignOut => {
                api::clear_session();
                self.end_session();
                Cmd::none()
            }
            Msg::Refresh => refresh(self.state.begin_refresh()),
            Msg::Refreshed(ticket, result) => {
                if let Err(err) = &result {
                    console::log_1(&format!("failed to fetch tasks: {}", err).into());
                }
                match self.state.finish_refresh(ticket, result) {
                    RefreshOutcome::Applied => {}
                    RefreshOutcome::Superseded => {
                        console::log_1(&"discarded a superseded task list".into());
                    }
                    RefreshOutcome::SessionLost => {
                        api::clear_session();
                        self.modal = None;
                    }
                }
                Cmd::none()
            }
            Msg::OpenCreate => {
                self.draft = TaskDraft::default();
                self.modal = Some(Modal::Create);
                Cmd::none()
            }
            Msg::StartEdit(id) => {
                if let Some(task) = self.state.task(id) {
                    self.draft = TaskDraft::from_task(task);
                    self.modal = Some(Modal::Edit(id));
                }
                Cmd::none()
            }
            Msg::CloseModal => {
                self.modal = None;
                Cmd::none()
            }
            Msg::SetDraftTitle(title) => {
                self.draft.title = title;
                Cmd::none()
            }
            Msg::SetDraftDescription(description) => {
                self.draft.description = description;
                Cmd::none()
            }
            Msg::SetDraftDate(date) => {
                self.draft.date = date;
                Cmd::none()
            }
            Msg::ToggleDraftCompleted => {
                self.draft.completed = !self.draft.completed;
                Cmd::none()
            }
            Msg::ToggleDraftImportant => {
                self.draft.important = !self.draft.important;
                Cmd::none()
            }
            Msg::SubmitCreate => {
                let request = self.draft.to_create_request();
                if self.state.begin_create(&request).is_err() {
                    return Cmd::none();
                }
                self.modal = None;
                self.draft = TaskDraft::default();
                Cmd::new(async move { Msg::Created(api::create_task(&request).await) })
            }
            Msg::Created(result) => {
                if let Err(err) = &result {
                    console::log_1(&format!("failed to create task: {}", err).into());
                }
                refresh(self.state.finish_create(result))
            }
            Msg::ToggleCompletion(id, is_completed) => {
                let (request, write) = self.state.begin_toggle(id, is_completed);
                Cmd::new(async move {
                    let result = api::update_task(&request).await;
                    Msg::Updated(UpdateKind::Toggle, id, write, result)
                })
            }
            Msg::SubmitEdit => {
                let Some(Modal::Edit(id)) = self.modal else {
                    return Cmd::none();
                };
                match self.state.begin_edit(id, self.draft.to_update_request()) {
                    Ok((request, write)) => {
                        self.modal = None;
                        Cmd::new(async move {
                            let result = api::update_task(&request).await;
                            Msg::Updated(UpdateKind::Edit, id, write, result)
                        })
                    }
                    Err(_) => Cmd::none(),
                }
            }
            Msg::Updated(kind, id, write, result) => {
                if let Err(err) = &result {
                    console::log_1(&format!("failed to update task {}: {}", id, err).into());
                }
                self.state.finish_update(kind, id, write, result);
                Cmd::none()
            }
            Msg::Remove(id) => {
                let confirmed = window()
                    .and_then(|w| w.confirm_with_message("Are you sure you want to delete this task?").ok())
                    .unwrap_or(false);
                if !confirmed {
                    return Cmd::none();
                }
                self.state.begin_remove(id);
                Cmd::new(async move { Msg::Removed(id, api::delete_task(id).await) })
            }
            Msg::Removed(id, result) => {
                if let Err(err) = &result {
                    console::log_1(&format!("failed to delete task {}: {}", id, err).into());
                }
                refresh(self.state.finish_remove(id, result))
            }
            Msg::DismissNotice(id) => {
                self.state.dismiss(id);
                Cmd::none()
            }
        }
    }

    fn end_session(&mut self) {
        self.state.sign_out();
        self.modal = None;
        self.draft = TaskDraft::default();
    }

    fn view_sidebar(&self) -> Node<Msg> {
        div([class("w-64 flex-shrink-0 bg-ctp-mantle rounded-lg shadow-lg border border-ctp-surface0 p-4")], [
            h1([class("text-2xl font-bold text-ctp-text mb-6")], [text("Tasks")]),
            nav([class("flex flex-col space-y-2")], [
                self.nav_link(Page::All, self.state.tasks().len()),
                self.nav_link(Page::Important, self.state.important_tasks().len()),
                self.nav_link(Page::Completed, self.state.completed_tasks().len()),
                self.nav_link(Page::Incomplete, self.state.incomplete_tasks().len()),
            ]),
            button([
                on_click(|_| Msg::Refresh),
                class("mt-6 w-full bg-ctp-surface1 hover:bg-ctp-surface2 text-ctp-subtext1 font-medium px-4 py-2 rounded-md transition-colors duration-200"),
                disabled(!self.state.is_ready() || self.state.is_loading()),
            ], [text("Refresh")]),
            if self.state.is_ready() {
                button([
                    on_click(|_| Msg::SignOut),
                    class("mt-2 w-full bg-ctp-red/20 hover:bg-ctp-red/30 text-ctp-red font-medium px-4 py-2 rounded-md transition-colors duration-200"),
                ], [text("Sign Out")])
            } else {
                span([], [])
            },
        ])
    }

    fn nav_link(&self, page: Page, count: usize) -> Node<Msg> {
        let is_active = self.current_page == page;
        a([
            href(page.to_path()),
            on_click(move |event| {
                event.prevent_default();
                Msg::NavigateTo(page)
            }),
            class(&format!(
                "flex items-center justify-between px-3 py-2 rounded-md text-sm font-medium transition-colors duration-200 {}",
                if is_active {
                    "bg-ctp-blue text-ctp-base"
                } else {
                    "text-ctp-subtext0 hover:text-ctp-text hover:bg-ctp-surface0"
                }
            )),
        ], [
            span([], [text(page.title())]),
            span([class("text-xs")], [text(&count.to_string())]),
        ])
    }

    fn view_signed_out(&self) -> Node<Msg> {
        div([class("text-center py-12")], [
            h2([class("text-xl font-semibold text-ctp-text mb-2")], [text("Sign in to see your tasks")]),
            p([class("text-ctp-subtext0")], [text("Your tasks load as soon as a session is available.")]),
        ])
    }

    fn view_tasks(&self) -> Node<Msg> {
        let tasks = self.state.view(self.current_page.filter());
        div([], [
            div([class("flex items-center justify-between mb-6")], [
                h2([class("text-2xl font-bold text-ctp-text")], [text(self.current_page.title())]),
                button([
                    on_click(|_| Msg::OpenCreate),
                    class("bg-ctp-blue hover:bg-ctp-sapphire text-ctp-base font-medium px-6 py-2 rounded-md transition-colors duration-200"),
                ], [text("+ Add New Task")]),
            ]),
            if self.state.is_loading() {
                div([class("text-center py-10 text-ctp-subtext0 italic")], [text("Loading...")])
            } else if tasks.is_empty() {
                div([class("text-center py-12 text-ctp-subtext0")], [text("No tasks available")])
            } else {
                div(
                    [class("grid grid-cols-1 md:grid-cols-2 xl:grid-cols-3 gap-4")],
                    tasks.iter().map(|task| self.view_task(task)).collect::<Vec<_>>(),
                )
            },
        ])
    }

    fn view_task(&self, task: &Task) -> Node<Msg> {
        let is_pending = self.state.is_pending(task.id);
        let task_id = task.id;
        let next_completed = !task.is_completed;

        div(
            [
                key(task.id.to_string()),
                class(&format!(
                    "flex flex-col gap-3 border rounded-xl p-5 bg-ctp-surface1 shadow-sm transition-all duration-300 {}",
                    if task.is_completed {
                        "border-ctp-green bg-ctp-green/10"
                    } else {
                        "border-ctp-surface2 hover:border-ctp-blue"
                    }
                )),
            ],
            [
                div([class("flex items-start justify-between gap-2")], [
                    h3([class(&format!(
                        "text-lg font-semibold break-words {}",
                        if task.is_completed { "line-through text-ctp-overlay1" } else { "text-ctp-text" }
                    ))], [text(&task.title)]),
                    if task.is_important {
                        span([class("px-2 py-1 rounded-full text-xs font-medium bg-ctp-peach/20 text-ctp-peach")], [text("Important")])
                    } else {
                        span([], [])
                    },
                ]),
                p([class("text-sm leading-relaxed break-words text-ctp-subtext1 flex-1")], [text(&task.description)]),
                p([class("text-sm text-ctp-subtext0")], [text(&format_due_date(task.date))]),
                div([class("flex items-center gap-2")], [
                    button([
                        on_click(move |_| Msg::ToggleCompletion(task_id, next_completed)),
                        class(&format!(
                            "px-3 py-1 rounded-full text-xs font-medium transition-colors duration-200 {}",
                            if task.is_completed {
                                "bg-ctp-green/20 text-ctp-green hover:bg-ctp-green/30"
                            } else {
                                "bg-ctp-red/20 text-ctp-red hover:bg-ctp-red/30"
                            }
                        )),
                        r#type("button"),
                        disabled(is_pending),
                    ], [text(if task.is_completed { "Completed" } else { "Incomplete" })]),
                    button([
                        on_click(move |_| Msg::StartEdit(task_id)),
                        class("ml-auto inline-flex items-center justify-center w-8 h-8 rounded-lg bg-ctp-blue/20 text-ctp-blue hover:bg-ctp-blue/30 transition-colors duration-200"),
                        r#type("button"),
                        disabled(is_pending),
                    ], [text("✏️")]),
                    button([
                        on_click(move |_| Msg::Remove(task_id)),
                        class("inline-flex items-center justify-center w-8 h-8 rounded-lg bg-ctp-red/20 text-ctp-red hover:bg-ctp-red/30 transition-colors duration-200"),
                        r#type("button"),
                        disabled(is_pending),
                    ], [text(if is_pending { "⏳" } else { "🗑️" })]),
                ]),
            ],
        )
    }

    fn view_modal(&self) -> Node<Msg> {
        let Some(modal) = self.modal else {
            return span([], []);
        };
        let (heading, submit_label, submit) = match modal {
            Modal::Create => ("Create a Task", "Create Task", Msg::SubmitCreate),
            Modal::Edit(_) => ("Edit Task", "Save Changes", Msg::SubmitEdit),
        };

        div([class("fixed inset-0 z-40 flex items-center justify-center bg-ctp-crust/70")], [
            div([class("w-full max-w-lg bg-ctp-surface0 rounded-lg shadow-lg p-6 border border-ctp-surface1 space-y-4")], [
                h2([class("text-xl font-semibold text-ctp-text pb-2 border-b border-ctp-surface2")], [text(heading)]),
                label([class("block text-sm font-medium text-ctp-subtext0")], [text("Title")]),
                input([
                    r#type("text"),
                    placeholder("e.g. Watch a video from Fireship"),
                    value(&self.draft.title),
                    on_input(|event| Msg::SetDraftTitle(event.value())),
                    class("w-full px-3 py-2 bg-ctp-surface1 border border-ctp-surface2 rounded-md text-ctp-text placeholder-ctp-subtext0 focus:outline-none focus:ring-2 focus:ring-ctp-blue"),
                ], []),
                label([class("block text-sm font-medium text-ctp-subtext0")], [text("Description")]),
                textarea([
                    placeholder("e.g. Watch a video about Next.js Auth"),
                    value(&self.draft.description),
                    on_input(|event| Msg::SetDraftDescription(event.value())),
                    class("w-full px-3 py-2 bg-ctp-surface1 border border-ctp-surface2 rounded-md text-ctp-text placeholder-ctp-subtext0 focus:outline-none focus:ring-2 focus:ring-ctp-blue h-24 resize-y"),
                ], []),
                label([class("block text-sm font-medium text-ctp-subtext0")], [text("Date")]),
                input([
                    r#type("date"),
                    value(&self.draft.date),
                    on_input(|event| Msg::SetDraftDate(event.value())),
                    class("w-full px-3 py-2 bg-ctp-surface1 border border-ctp-surface2 rounded-md text-ctp-text focus:outline-none focus:ring-2 focus:ring-ctp-blue"),
                ], []),
                div([class("flex gap-2")], [
                    if modal == Modal::Create {
                        self.flag_button("Completed", self.draft.completed, Msg::ToggleDraftCompleted)
                    } else {
                        span([], [])
                    },
                    self.flag_button("Important", self.draft.important, Msg::ToggleDraftImportant),
                ]),
                div([class("flex justify-end gap-2 pt-2")], [
                    button([
                        on_click(|_| Msg::CloseModal),
                        class("bg-ctp-overlay0 hover:bg-ctp-overlay1 text-ctp-text font-medium px-4 py-2 rounded-md transition-colors duration-200"),
                        r#type("button"),
                    ], [text("Cancel")]),
                    button([
                        on_click(move |_| submit.clone()),
                        class("bg-ctp-green hover:bg-ctp-teal text-ctp-base font-medium px-4 py-2 rounded-md transition-colors duration-200"),
                        r#type("button"),
                    ], [text(submit_label)]),
                ]),
            ]),
        ])
    }

    fn flag_button(&self, label_text: &str, on: bool, msg: Msg) -> Node<Msg> {
        button([
            on_click(move |_| msg.clone()),
            class(&format!(
                "px-3 py-1 rounded-full text-sm font-medium transition-colors duration-200 {}",
                if on {
                    "bg-ctp-blue text-ctp-base"
                } else {
                    "bg-ctp-surface1 text-ctp-subtext0 hover:bg-ctp-surface2"
                }
            )),
            r#type("button"),
        ], [text(&format!("{} {}", if on { "☑" } else { "☐" }, label_text))])
    }

    fn view_notices(&self) -> Node<Msg> {
        div(
            [class("fixed bottom-6 right-6 z-50 flex flex-col gap-2 w-80")],
            self.state
                .notices()
                .map(|notice| {
                    let notice_id = notice.id;
                    div([
                        key(notice.id.to_string()),
                        on_click(move |_| Msg::DismissNotice(notice_id)),
                        class(&format!(
                            "cursor-pointer rounded-lg px-4 py-3 text-sm font-medium shadow-lg border {}",
                            match notice.kind {
                                NoticeKind::Success => "bg-ctp-green/20 text-ctp-green border-ctp-green",
                                NoticeKind::Error => "bg-ctp-red/20 text-ctp-red border-ctp-red",
                            }
                        )),
                    ], [text(&notice.message)])
                })
                .collect::<Vec<_>>(),
        )
    }
}
