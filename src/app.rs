//! Main application state and input-driven mutations.

use std::time::{Duration, Instant};

use crate::canvas::CanvasState;
use crate::controller::{ConfirmGate, PersistenceController};
use crate::file_io;
use crate::remote::PaintingId;
use crate::shapes::{place_drop, DropPayload, ShapeType};

/// Color palette offered in the sidebar.
pub const COLORS: [&str; 3] = ["#ff6b6b", "#4ecdc4", "#45b7d1"];

/// Logical canvas dimensions, in canvas units.
pub const CANVAS_WIDTH: f64 = 800.0;
pub const CANVAS_HEIGHT: f64 = 600.0;

/// Two clicks on the same shape within this window count as a double-click.
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);

/// Which login field has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

/// Application mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Login {
        username: String,
        password: String,
        field: LoginField,
        error: Option<String>,
    },
    Normal,
    NameInput {
        text: String,
    },
    ImportPath {
        path: String,
    },
    ExportPath {
        path: String,
    },
    ConfirmDelete {
        painting_id: PaintingId,
    },
}

impl Mode {
    pub fn login() -> Self {
        Mode::Login {
            username: String::new(),
            password: String::new(),
            field: LoginField::Username,
            error: None,
        }
    }
}

/// Gate pre-answered by the confirm-delete popup.
struct PopupAnswer(bool);

impl ConfirmGate for PopupAnswer {
    fn confirm(&mut self, _prompt: &str) -> bool {
        self.0
    }
}

/// Main application state
pub struct App {
    pub canvas: CanvasState,
    pub controller: PersistenceController,
    pub mode: Mode,
    pub selected_color: usize,
    pub selected_shape: ShapeType,
    pub sidebar_selected: usize,
    pub running: bool,
    pub status_message: Option<String>,
    /// Last click, for double-click removal detection.
    last_click: Option<(Instant, f64, f64)>,
}

impl App {
    pub fn new(controller: PersistenceController) -> Self {
        Self {
            canvas: CanvasState::new(),
            controller,
            mode: Mode::login(),
            selected_color: 0,
            selected_shape: ShapeType::Square,
            sidebar_selected: 0,
            running: true,
            status_message: None,
            last_click: None,
        }
    }

    pub fn selected_color(&self) -> &'static str {
        COLORS[self.selected_color]
    }

    /// Set a status message to display
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Handle a click on the canvas, in canvas units. A double-click on an
    /// existing shape removes it; a click on empty canvas places the
    /// selected shape centered on the pointer.
    ///
    /// Only clicks that land on an existing shape arm the double-click
    /// timer; a placement must not count as the first click of a removal.
    pub fn click_canvas(&mut self, px: f64, py: f64) {
        let now = Instant::now();
        let is_double = self
            .last_click
            .is_some_and(|(t, lx, ly)| {
                now.duration_since(t) <= DOUBLE_CLICK_WINDOW
                    && (lx - px).abs() < 5.0
                    && (ly - py).abs() < 5.0
            });

        if let Some(shape) = self.canvas.shape_at(px, py) {
            if is_double {
                let id = shape.id.clone();
                self.canvas.remove_shape(&id);
                self.set_status("Shape removed");
                self.last_click = None;
            } else {
                self.last_click = Some((now, px, py));
            }
            return;
        }
        self.last_click = None;

        // The palette hands over the same payload a drag source would.
        let payload = DropPayload {
            shape_type: self.selected_shape.name().to_ascii_lowercase(),
            color: self.selected_color().to_string(),
        };
        if let Some(shape) = place_drop(&payload, px, py, CANVAS_WIDTH, CANVAS_HEIGHT) {
            self.canvas.add_shape(shape);
        }
    }

    pub fn cycle_shape(&mut self) {
        self.selected_shape = self.selected_shape.next();
        self.set_status(format!("Shape: {}", self.selected_shape.name()));
    }

    pub fn cycle_color(&mut self) {
        self.selected_color = (self.selected_color + 1) % COLORS.len();
        self.set_status(format!("Color: {}", self.selected_color()));
    }

    /// Submit the login form.
    pub fn submit_login(&mut self) {
        if let Mode::Login {
            username, password, ..
        } = &self.mode
        {
            let (username, password) = (username.clone(), password.clone());
            match self.controller.login(&username, &password) {
                Ok(()) => self.set_status("Logging in..."),
                Err(e) => self.login_error(e.to_string()),
            }
        }
    }

    /// Record a login failure on the form.
    pub fn login_error(&mut self, message: String) {
        if let Mode::Login { error, password, .. } = &mut self.mode {
            *error = Some(message);
            password.clear();
        }
    }

    pub fn save(&mut self) {
        if self.canvas.is_empty() {
            self.set_status("Nothing to save");
            return;
        }
        match self.controller.save(&self.canvas) {
            Ok(()) => self.set_status("Saving..."),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn new_painting(&mut self) {
        self.controller.new_painting(&mut self.canvas);
        self.set_status("New painting");
    }

    pub fn logout(&mut self) {
        self.controller.logout(&mut self.canvas);
        self.sidebar_selected = 0;
        self.mode = Mode::login();
    }

    /// Load the painting selected in the sidebar.
    pub fn load_selected(&mut self) {
        let Some(summary) = self
            .controller
            .saved_paintings()
            .get(self.sidebar_selected)
        else {
            return;
        };
        let id = summary.id;
        match self.controller.load(id) {
            Ok(()) => self.set_status("Loading..."),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Open the confirm-delete popup for the sidebar selection.
    pub fn request_delete_selected(&mut self) {
        if let Some(summary) = self
            .controller
            .saved_paintings()
            .get(self.sidebar_selected)
        {
            self.mode = Mode::ConfirmDelete {
                painting_id: summary.id,
            };
        }
    }

    /// Resolve the confirm-delete popup.
    pub fn answer_delete(&mut self, confirmed: bool) {
        if let Mode::ConfirmDelete { painting_id } = self.mode {
            let mut gate = PopupAnswer(confirmed);
            match self.controller.delete(painting_id, &mut gate) {
                Ok(()) if confirmed => self.set_status("Deleting..."),
                Ok(()) => {}
                Err(e) => self.set_status(e.to_string()),
            }
        }
        self.mode = Mode::Normal;
    }

    pub fn sidebar_up(&mut self) {
        self.sidebar_selected = self.sidebar_selected.saturating_sub(1);
    }

    pub fn sidebar_down(&mut self) {
        let max = self.controller.saved_paintings().len().saturating_sub(1);
        self.sidebar_selected = (self.sidebar_selected + 1).min(max);
    }

    /// Start renaming the painting.
    pub fn start_rename(&mut self) {
        self.mode = Mode::NameInput {
            text: self.canvas.name.clone(),
        };
    }

    pub fn commit_rename(&mut self) {
        if let Mode::NameInput { text } = &self.mode {
            if !text.trim().is_empty() {
                self.canvas.name = text.trim().to_string();
            }
        }
        self.mode = Mode::Normal;
    }

    /// Start the export prompt with a filename derived from the name.
    pub fn start_export(&mut self) {
        self.mode = Mode::ExportPath {
            path: file_io::suggested_filename(&self.canvas.name),
        };
    }

    pub fn commit_export(&mut self) {
        if let Mode::ExportPath { path } = &self.mode {
            let path = std::path::PathBuf::from(path.clone());
            let result = file_io::export_painting(&self.canvas.name, self.canvas.shapes())
                .and_then(|text| file_io::save_file(&path, &text));
            match result {
                Ok(()) => self.set_status(format!("Exported to {}", path.display())),
                Err(e) => self.set_status(format!("Export error: {e}")),
            }
        }
        self.mode = Mode::Normal;
    }

    pub fn start_import(&mut self) {
        self.mode = Mode::ImportPath {
            path: String::new(),
        };
    }

    pub fn commit_import(&mut self) {
        if let Mode::ImportPath { path } = &self.mode {
            let path = std::path::PathBuf::from(path.clone());
            match file_io::load_file(&path) {
                Ok(text) => {
                    match self.controller.import_document(&mut self.canvas, &text) {
                        Ok(()) => self.set_status(format!("Imported \"{}\"", self.canvas.name)),
                        Err(e) => self.set_status(e.to_string()),
                    }
                }
                Err(e) => self.set_status(format!("Import error: {e}")),
            }
        }
        self.mode = Mode::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::channel();
        let mut app = App::new(PersistenceController::new(tx));
        app.mode = Mode::Normal;
        app
    }

    #[test]
    fn click_places_selected_shape_clamped() {
        let mut app = app();
        app.click_canvas(795.0, 5.0);
        let shape = &app.canvas.shapes()[0];
        assert_eq!(shape.shape_type, ShapeType::Square);
        assert_eq!(shape.x, 750.0);
        assert_eq!(shape.y, 0.0);
    }

    #[test]
    fn double_click_removes_the_shape_under_the_pointer() {
        let mut app = app();
        app.click_canvas(400.0, 300.0);
        assert_eq!(app.canvas.len(), 1);

        // Two rapid clicks on the placed shape.
        app.click_canvas(400.0, 300.0);
        app.click_canvas(400.0, 300.0);
        assert!(app.canvas.is_empty());
    }

    #[test]
    fn single_click_on_a_shape_does_not_stack_another() {
        let mut app = app();
        app.click_canvas(400.0, 300.0);
        app.click_canvas(400.0, 300.0);
        assert_eq!(app.canvas.len(), 1);
    }

    #[test]
    fn placing_click_does_not_arm_removal() {
        let mut app = app();
        app.click_canvas(400.0, 300.0);
        // An immediate follow-up click on the fresh shape is the first
        // click of a removal, not the second.
        app.click_canvas(400.0, 300.0);
        assert_eq!(app.canvas.len(), 1);

        // The next rapid click completes the double-click.
        app.click_canvas(400.0, 300.0);
        assert!(app.canvas.is_empty());
    }

    #[test]
    fn rename_trims_and_keeps_nonempty() {
        let mut app = app();
        app.mode = Mode::NameInput {
            text: "  Dawn  ".to_string(),
        };
        app.commit_rename();
        assert_eq!(app.canvas.name, "Dawn");

        app.mode = Mode::NameInput {
            text: "   ".to_string(),
        };
        app.commit_rename();
        assert_eq!(app.canvas.name, "Dawn");
    }
}
