use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::info;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;

use crate::cli::Config;
use crate::errors::AppError;
use crate::import_list::{ImportList, ImportRow, RowState};
use crate::pipeline::ImportSession;
use crate::pipeline::executor::UiExecutor;
use crate::ui::{FOOTER_HEIGHT, HEADER_HEIGHT, RowModel, ViewModel, truncate_left};

const MAX_TASKS_PER_TICK: usize = 512;
const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const POLL_INTERVAL_WHILE_LOADING: Duration = Duration::from_millis(24);
const POLL_INTERVAL_IDLE: Duration = Duration::from_millis(80);
const FILE_COLUMN_WIDTH: usize = 48;

/// What the user chose before leaving the app.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    Quit,
    Import(PathBuf),
}

pub struct App {
    config: Config,
    list: ImportList,
    executor: UiExecutor,
    session: Option<ImportSession>,
    selected_index: usize,
    table_scroll_offset: usize,
    message: Option<String>,
    dump: Option<String>,
    help_modal_open: bool,
    spinner_tick: usize,
    last_frame_area: Rect,
    outcome: Option<Outcome>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let list = ImportList::with_dropped_profiles(&config.dropped_profiles);

        Self {
            config,
            list,
            executor: UiExecutor::new(),
            session: None,
            selected_index: 0,
            table_scroll_offset: 0,
            message: None,
            dump: None,
            help_modal_open: false,
            spinner_tick: 0,
            last_frame_area: Rect::default(),
            outcome: None,
        }
    }

    pub fn run(&mut self) -> Result<Outcome, AppError> {
        self.start_import()?;

        enable_raw_mode().map_err(|error| AppError::Terminal(error.to_string()))?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)
            .map_err(|error| AppError::Terminal(error.to_string()))?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal =
            Terminal::new(backend).map_err(|error| AppError::Terminal(error.to_string()))?;

        let run_result = self.event_loop(&mut terminal);

        let _ = disable_raw_mode();
        let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();

        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }

        run_result?;
        Ok(self.outcome.clone().unwrap_or(Outcome::Quit))
    }

    fn start_import(&mut self) -> Result<(), AppError> {
        let poster = self.executor.poster();
        poster.on_scan_finished(|list| {
            info!("profile lists read, {} rows", list.len());
        });
        self.session = Some(ImportSession::start(self.config.layout.clone(), poster)?);
        Ok(())
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), AppError> {
        while self.outcome.is_none() {
            self.executor.drain(&mut self.list, MAX_TASKS_PER_TICK);
            self.ensure_selection_in_bounds();
            self.spinner_tick = self.spinner_tick.wrapping_add(1);
            let size = terminal
                .size()
                .map_err(|error| AppError::Terminal(error.to_string()))?;
            self.last_frame_area = Rect::new(0, 0, size.width, size.height);

            let model = self.build_view_model();
            terminal
                .draw(|frame| crate::ui::render(frame, &model))
                .map_err(|error| AppError::Terminal(error.to_string()))?;

            let poll_interval = if self.list.is_settled() {
                POLL_INTERVAL_IDLE
            } else {
                POLL_INTERVAL_WHILE_LOADING
            };

            if event::poll(poll_interval).map_err(|error| AppError::Terminal(error.to_string()))?
                && let Event::Key(key) =
                    event::read().map_err(|error| AppError::Terminal(error.to_string()))?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key);
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.help_modal_open {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::F(1) | KeyCode::Char('q')
            ) {
                self.help_modal_open = false;
            }
            return;
        }

        if self.dump.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
                self.dump = None;
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.outcome = Some(Outcome::Quit),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Enter => self.advance(),
            KeyCode::Char('d') => self.open_dump(),
            KeyCode::Char('?') | KeyCode::F(1) => self.help_modal_open = true,
            KeyCode::Esc => self.message = None,
            _ => {}
        }
    }

    fn advance(&mut self) {
        match self.list.profile_path(self.selected_index) {
            Some(path) => self.outcome = Some(Outcome::Import(path.to_path_buf())),
            None => self.message = Some("No profile file known for this row".to_string()),
        }
    }

    fn open_dump(&mut self) {
        let Some(path) = self.list.profile_path(self.selected_index) else {
            self.message = Some("No profile file to dump".to_string());
            return;
        };
        self.dump = Some(dump_profile(path));
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.list.len();
        if len == 0 {
            self.selected_index = 0;
            self.table_scroll_offset = 0;
            return;
        }

        let current = self.selected_index as isize;
        let max = (len - 1) as isize;
        let next = (current + delta).clamp(0, max);
        self.selected_index = next as usize;
        self.sync_table_scroll(len);
    }

    fn ensure_selection_in_bounds(&mut self) {
        let len = self.list.len();
        if len == 0 {
            self.selected_index = 0;
            self.table_scroll_offset = 0;
        } else {
            self.selected_index = self.selected_index.min(len - 1);
            self.sync_table_scroll(len);
        }
    }

    fn table_visible_rows(&self) -> usize {
        self.last_frame_area
            .height
            .saturating_sub(HEADER_HEIGHT + FOOTER_HEIGHT + 3) as usize
    }

    fn sync_table_scroll(&mut self, len: usize) {
        self.table_scroll_offset = compute_scroll_offset(
            self.table_scroll_offset,
            self.selected_index,
            len,
            self.table_visible_rows(),
        );
    }

    fn spinner(&self) -> char {
        SPINNER_FRAMES[self.spinner_tick % SPINNER_FRAMES.len()]
    }

    fn build_view_model(&self) -> ViewModel {
        let rows: Vec<RowModel> = self.list.rows().iter().map(row_model).collect();

        ViewModel {
            steam_root: self.config.layout.steam_root.to_string_lossy().into_owned(),
            scan_status: scan_status(&self.list),
            rows,
            selected_index: self.selected_index,
            table_scroll_offset: self.table_scroll_offset,
            warning_line: self.list.warnings().last().cloned(),
            message_line: self.message.clone(),
            loading_hint: self
                .list
                .loading()
                .then(|| format!("{} reading profile lists...", self.spinner())),
            live_loading_line: (!self.list.is_settled()).then(|| {
                format!(
                    "{} loading; rows update as names are resolved",
                    self.spinner()
                )
            }),
            next_enabled: self.list.can_advance(self.selected_index),
            dump: self.dump.clone(),
            help_modal_open: self.help_modal_open,
        }
    }
}

fn row_model(row: &ImportRow) -> RowModel {
    RowModel {
        owner: row.owner_label().to_string(),
        item: row.item_label().to_string(),
        file: row
            .profile_path
            .as_ref()
            .map(|path| truncate_left(&path.to_string_lossy(), FILE_COLUMN_WIDTH))
            .unwrap_or_default(),
        is_loading: row.state() != RowState::Complete,
        actionable: row.is_actionable(),
    }
}

fn scan_status(list: &ImportList) -> String {
    match list.scan_summary() {
        None => format!("scanning (rows: {})", list.len()),
        Some(summary) if !summary.root_found => "Steam apps directory not found".to_string(),
        Some(_) if !list.is_settled() => format!(
            "resolving names ({} of {} pending)",
            list.unresolved_rows(),
            list.len()
        ),
        Some(_) => format!(
            "complete (profiles: {}, warnings: {})",
            list.len(),
            list.warnings().len()
        ),
    }
}

/// File name and raw contents, or the read error in place of the contents.
pub fn dump_profile(path: &std::path::Path) -> String {
    let contents = std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|error| format!("(failed to read: {error})"));
    format!(
        "Profile filename: {}\n\nProfile dump:\n{contents}",
        path.display()
    )
}

fn compute_scroll_offset(
    current_offset: usize,
    selected_index: usize,
    len: usize,
    visible_rows: usize,
) -> usize {
    if len == 0 {
        return 0;
    }

    if visible_rows == 0 {
        return selected_index.min(len - 1);
    }

    let max_offset = len.saturating_sub(visible_rows);
    let mut offset = current_offset.min(max_offset);

    if selected_index < offset {
        offset = selected_index;
    } else if selected_index >= offset.saturating_add(visible_rows) {
        offset = selected_index
            .saturating_add(1)
            .saturating_sub(visible_rows);
    }

    offset.min(max_offset)
}
