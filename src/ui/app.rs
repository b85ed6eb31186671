use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use anyhow::Result;
use chrono::Local;
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
    Wrap,
};
use ratatui::Frame;
use tracing::{error, info};

use crate::cellar::{Cellar, CellarEvent, PairingSuggestion};
use crate::models::{Record, RecordId};
use crate::storage::Backend;

use super::forms::{ConfirmRecordDelete, RecordField, RecordForm};
use super::helpers::{centered_rect, format_amount, surface_error, truncate};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Header height: border plus one line of cellar facts.
const HEADER_HEIGHT: u16 = 3;
/// Height of the statistics / pairing strip under the table.
const SUMMARY_HEIGHT: u16 = 8;
/// Widest the image column gets before paths are shortened.
const IMAGE_COLUMN_WIDTH: usize = 22;

/// Fine-grained interaction modes. Everything except `Normal` draws a modal on
/// top of the inventory table.
enum Mode {
    Normal,
    Adding(RecordForm),
    Editing { id: RecordId, form: RecordForm },
    ConfirmDelete(ConfirmRecordDelete),
    Details(RecordId),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state for the terminal UI.
///
/// The app never persists directly after a mutation. Instead it subscribes to
/// the cellar, queues the events it receives, and flushes them once the key
/// press has been handled: one status update and one save per batch.
pub struct App {
    cellar: Cellar,
    backend: Box<dyn Backend>,
    selected: usize,
    mode: Mode,
    status: Option<StatusMessage>,
    pending: Rc<RefCell<Vec<CellarEvent>>>,
}

impl App {
    pub fn new(mut cellar: Cellar, backend: Box<dyn Backend>) -> Self {
        let pending: Rc<RefCell<Vec<CellarEvent>>> = Rc::default();
        let queue = Rc::clone(&pending);
        cellar.subscribe(Box::new(move |event: &CellarEvent| {
            queue.borrow_mut().push(event.clone());
        }));

        let status = Some(StatusMessage {
            text: format!(
                "Loaded {} record(s) from {}.",
                cellar.len(),
                backend.describe()
            ),
            kind: StatusKind::Info,
        });

        Self {
            cellar,
            backend,
            selected: 0,
            mode: Mode::Normal,
            status,
            pending,
        }
    }

    pub fn cellar(&self) -> &Cellar {
        &self.cellar
    }

    /// Dispatch one key press. Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Adding(form) => self.handle_add(code, form)?,
            Mode::Editing { id, form } => self.handle_edit(code, id, form)?,
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::Details(id) => self.handle_details(code, id)?,
        };

        self.flush_events();
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                *exit = true;
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-5),
            KeyCode::PageDown => self.move_selection(5),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.cellar.len().saturating_sub(1),
            KeyCode::Enter => {
                if let Some(record) = self.current_record() {
                    return Ok(Mode::Details(record.id()));
                }
                self.set_status("No record selected.", StatusKind::Error);
            }
            KeyCode::Char('+') | KeyCode::Char('a') | KeyCode::Char('A') => {
                if self.cellar.is_full() {
                    self.set_status(
                        format!("Cellar is full ({} records).", self.cellar.capacity()),
                        StatusKind::Error,
                    );
                } else {
                    self.clear_status();
                    return Ok(Mode::Adding(RecordForm::default()));
                }
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(record) = self.current_record() {
                    let editing = Mode::Editing {
                        id: record.id(),
                        form: RecordForm::from_record(record),
                    };
                    self.clear_status();
                    return Ok(editing);
                }
                self.set_status("No record selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') | KeyCode::Char('d') | KeyCode::Char('D') => {
                if let Some(record) = self.current_record().cloned() {
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(ConfirmRecordDelete { record }));
                }
                self.set_status("No record selected to remove.", StatusKind::Error);
            }
            KeyCode::Char('o') | KeyCode::Char('O') => {
                if let Some(id) = self.current_record().map(Record::id) {
                    self.open_image(id);
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_add(&mut self, code: KeyCode, mut form: RecordForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Add cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_record(&form) {
                Ok(()) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::Adding(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_edit(&mut self, code: KeyCode, id: RecordId, mut form: RecordForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_record(id, &form) {
                Ok(()) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::Editing { id, form })
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_confirm_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmRecordDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.cellar.remove(confirm.record.id()) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(err.to_string(), StatusKind::Error);
                        Ok(Mode::Normal)
                    }
                }
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_details(&mut self, code: KeyCode, id: RecordId) -> Result<Mode> {
        match code {
            KeyCode::Char('o') | KeyCode::Char('O') => {
                self.open_image(id);
                Ok(Mode::Details(id))
            }
            KeyCode::Char('e') | KeyCode::Char('E') => match self.cellar.get(id) {
                Some(record) => Ok(Mode::Editing {
                    id,
                    form: RecordForm::from_record(record),
                }),
                None => Ok(Mode::Normal),
            },
            _ => Ok(Mode::Normal),
        }
    }

    fn save_new_record(&mut self, form: &RecordForm) -> Result<()> {
        let draft = form.parse_inputs()?;
        let today = Local::now().date_naive();
        self.cellar.add(draft.into_record(today))?;
        Ok(())
    }

    fn save_existing_record(&mut self, id: RecordId, form: &RecordForm) -> Result<()> {
        let draft = form.parse_inputs()?;
        self.cellar.update(id, |record| draft.apply_to(record))?;
        Ok(())
    }

    fn open_image(&mut self, id: RecordId) {
        let Some(path) = self.cellar.get(id).map(Record::image_path) else {
            return;
        };
        if !path.exists() {
            self.set_status(
                format!("Image not found: {}", path.display()),
                StatusKind::Error,
            );
        } else if let Err(err) = open_path(&path) {
            self.set_status(format!("Failed to open image: {err}"), StatusKind::Error);
        } else {
            self.set_status(format!("Opened {}.", path.display()), StatusKind::Info);
        }
    }

    /// Drain queued cellar events: move the selection, describe the change in
    /// the footer, then persist the whole cellar once.
    fn flush_events(&mut self) {
        let events: Vec<CellarEvent> = self.pending.borrow_mut().drain(..).collect();
        if events.is_empty() {
            return;
        }

        for event in &events {
            let message = match event {
                CellarEvent::Added(record) => {
                    self.focus(record.id());
                    format!("Added {}.", record.denomination)
                }
                CellarEvent::Updated { before, after } => {
                    self.focus(after.id());
                    if before.denomination == after.denomination {
                        format!("Updated {}.", after.denomination)
                    } else {
                        format!("Renamed {} to {}.", before.denomination, after.denomination)
                    }
                }
                CellarEvent::Removed(record) => format!("Removed {}.", record.denomination),
            };
            self.set_status(message, StatusKind::Info);
        }
        self.clamp_selection();

        match self.backend.save_all(self.cellar.records()) {
            Ok(()) => info!(events = events.len(), "cellar persisted"),
            Err(err) => {
                error!(error = %err, "failed to persist cellar");
                self.set_status(
                    format!("Changes not saved: {}", surface_error(&err)),
                    StatusKind::Error,
                );
            }
        }
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(3),
                Constraint::Length(SUMMARY_HEIGHT),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_header(frame, chunks[0]);
        self.draw_table(frame, chunks[1]);
        self.draw_summary(frame, chunks[2]);
        self.draw_footer(frame, chunks[3]);

        match &self.mode {
            Mode::Adding(form) => self.draw_record_form(frame, area, "Add Wine", form),
            Mode::Editing { form, .. } => self.draw_record_form(frame, area, "Edit Wine", form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Details(id) => {
                if let Some(record) = self.cellar.get(*id) {
                    self.draw_details(frame, area, record);
                }
            }
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                " Wine Cellar ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ));
        let facts = format!(
            "{}/{} records   {:.1} °C   {:.0}% humidity   {}",
            self.cellar.len(),
            self.cellar.capacity(),
            self.cellar.temperature(),
            self.cellar.humidity(),
            self.backend.describe(),
        );
        let paragraph = Paragraph::new(facts)
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
    }

    fn draw_table(&self, frame: &mut Frame, area: Rect) {
        let header = Row::new([
            "Image",
            "Denomination",
            "Description",
            "Qty",
            "Price",
            "Year",
            "Added",
        ])
        .style(Style::default().add_modifier(Modifier::BOLD));

        let rows = self.cellar.records().iter().map(|record| {
            let image = record.image_path().display().to_string();
            Row::new([
                Cell::from(truncate(&image, IMAGE_COLUMN_WIDTH)),
                Cell::from(record.denomination.clone()),
                Cell::from(record.description.clone()),
                Cell::from(record.quantity.to_string()),
                Cell::from(format_amount(record.price)),
                Cell::from(record.production_year.to_string()),
                Cell::from(record.date_added.format("%d/%m/%Y").to_string()),
            ])
        });

        let widths = [
            Constraint::Length(IMAGE_COLUMN_WIDTH as u16),
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Length(5),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(10),
        ];

        let title = if self.cellar.is_empty() {
            "Inventory (empty, press + to add)"
        } else {
            "Inventory"
        };

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title))
            .row_highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let selected = (!self.cellar.is_empty()).then_some(self.selected);
        let mut state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_summary(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(area);

        let label_style = Style::default().add_modifier(Modifier::BOLD);
        let stats = vec![
            Line::from(vec![
                Span::styled("Total value: ", label_style),
                Span::raw(format_amount(self.cellar.total_value())),
            ]),
            Line::from(vec![
                Span::styled("Average price: ", label_style),
                Span::raw(format_amount(self.cellar.average_price())),
            ]),
            Line::from(vec![
                Span::styled("Bottles: ", label_style),
                Span::raw(
                    self.cellar
                        .records()
                        .iter()
                        .map(|record| u64::from(record.quantity))
                        .sum::<u64>()
                        .to_string(),
                ),
            ]),
        ];
        let stats = Paragraph::new(stats)
            .block(Block::default().borders(Borders::ALL).title("Statistics"))
            .wrap(Wrap { trim: true });
        frame.render_widget(stats, columns[0]);

        let suggestions = self.cellar.pairing_suggestions();
        let items: Vec<ListItem> = if suggestions.is_empty() {
            vec![ListItem::new(Span::styled(
                "No red or white wines yet.",
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            suggestions
                .iter()
                .map(|suggestion| ListItem::new(suggestion.to_string()))
                .collect()
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Pairing suggestions"),
            )
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        let mut state = ListState::default().with_selected(self.pairing_focus(&suggestions));
        frame.render_stateful_widget(list, columns[1], &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&'static str, &'static str)] = match &self.mode {
            Mode::Adding(_) | Mode::Editing { .. } => &[
                ("[Tab/↑↓]", " Field   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::ConfirmDelete(_) => &[("[Y]", " Delete   "), ("[N/Esc]", " Keep")],
            Mode::Details(_) => &[
                ("[O]", " Open image   "),
                ("[E]", " Edit   "),
                ("[any key]", " Close"),
            ],
            Mode::Normal => &[
                ("[↑↓]", " Navigate   "),
                ("[Enter]", " Details   "),
                ("[+]", " Add   "),
                ("[E]", " Edit   "),
                ("[-]", " Delete   "),
                ("[O]", " Image   "),
                ("[Q]", " Quit"),
            ],
        };

        let spans: Vec<Span<'static>> = keys
            .iter()
            .flat_map(|(key, label)| [Span::styled(*key, key_style), Span::raw(*label)])
            .collect();
        Line::from(spans)
    }

    fn draw_record_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &RecordForm) {
        let popup_area = centered_rect(70, 80, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = RecordField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        // No wrapping: each field must stay on its own row for the cursor math.
        let paragraph = Paragraph::new(lines);
        frame.render_widget(paragraph, inner);

        let row = RecordField::ALL
            .iter()
            .position(|field| *field == form.active)
            .unwrap_or(0) as u16;
        let cursor_x = inner
            .x
            .saturating_add(form.cursor_offset() as u16)
            .min(inner.right().saturating_sub(1));
        frame.set_cursor_position((cursor_x, inner.y + row));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmRecordDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Removal")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let record = &confirm.record;
        let lines = vec![
            Line::from(format!(
                "Remove {} ({} × {})?",
                record.denomination,
                record.quantity,
                format_amount(record.price)
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_details(&self, frame: &mut Frame, area: Rect, record: &Record) {
        let popup_area = centered_rect(60, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("{} details", record.type_name()))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = record.detail_lines().into_iter().map(Line::from).collect();
        lines.push(Line::from(format!(
            "Image: {}",
            record.image_path().display()
        )));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    /// Index of the suggestion that belongs to the selected table row.
    fn pairing_focus(&self, suggestions: &[PairingSuggestion]) -> Option<usize> {
        let id = self.current_record()?.id();
        suggestions
            .iter()
            .position(|suggestion| suggestion.record == id)
    }

    fn current_record(&self) -> Option<&Record> {
        self.cellar.records().get(self.selected)
    }

    fn focus(&mut self, id: RecordId) {
        if let Some(index) = self.cellar.records().iter().position(|r| r.id() == id) {
            self.selected = index;
        }
    }

    fn move_selection(&mut self, offset: isize) {
        let len = self.cellar.len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let target = self.selected as isize + offset;
        self.selected = target.clamp(0, len as isize - 1) as usize;
    }

    fn clamp_selection(&mut self) {
        let len = self.cellar.len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}
