//! Persistence controller - maps local canvas edits to remote create/
//! update/list/delete calls and reconciles the results.
//!
//! The controller owns the session (current user, active painting id) and
//! the saved-paintings cache. Local state is only mutated after a
//! successful response is observed; failures surface as status messages.
//!
//! Overlapping save/load/delete calls are serialized by a single-flight
//! guard, and every remote response is checked against the session epoch
//! before it is applied so a call that outlives a logout is discarded.

use std::sync::mpsc as std_mpsc;

use tracing::{debug, info};

use crate::canvas::CanvasState;
use crate::error::EaselError;
use crate::file_io;
use crate::remote::{
    PaintingId, PaintingPayload, PaintingSummary, RemoteCommand, RemoteEvent, User,
};

/// Gate called before destructive operations. The UI answers it with a
/// yes/no dialog; tests answer it directly.
pub trait ConfirmGate {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Current-user identity and active-painting identity.
///
/// The active painting id is the backend identifier the working copy was
/// loaded from or last saved as; its absence means the working copy is
/// unsaved.
#[derive(Debug)]
pub struct Session {
    current_user: Option<User>,
    active_painting_id: Option<PaintingId>,
    epoch: u64,
}

impl Session {
    fn new() -> Self {
        Self {
            current_user: None,
            active_painting_id: None,
            epoch: 0,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn active_painting_id(&self) -> Option<PaintingId> {
        self.active_painting_id
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Remote operation currently outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOp {
    Login,
    Save,
    Load,
    Delete,
}

/// State machine over {Unsaved, Saved}, keyed by the active painting id.
pub struct PersistenceController {
    session: Session,
    saved: Vec<PaintingSummary>,
    in_flight: Option<PendingOp>,
    command_tx: std_mpsc::Sender<RemoteCommand>,
}

impl PersistenceController {
    pub fn new(command_tx: std_mpsc::Sender<RemoteCommand>) -> Self {
        Self {
            session: Session::new(),
            saved: Vec::new(),
            in_flight: None,
            command_tx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Cached summaries of the user's saved paintings.
    pub fn saved_paintings(&self) -> &[PaintingSummary] {
        &self.saved
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn send(&mut self, cmd: RemoteCommand) -> Result<(), EaselError> {
        self.command_tx.send(cmd).map_err(|_| {
            self.in_flight = None;
            EaselError::Connection("sync worker is gone".to_string())
        })
    }

    fn begin_op(&mut self, op: PendingOp) -> Result<(), EaselError> {
        if self.in_flight.is_some() {
            return Err(EaselError::Busy);
        }
        self.in_flight = Some(op);
        Ok(())
    }

    fn require_user(&self) -> Result<u64, EaselError> {
        self.session
            .current_user
            .as_ref()
            .map(|u| u.id)
            .ok_or_else(|| EaselError::Auth("not logged in".to_string()))
    }

    /// Issue a login call.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), EaselError> {
        self.begin_op(PendingOp::Login)?;
        self.send(RemoteCommand::Login {
            epoch: self.session.epoch,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Tear down the session unconditionally: shapes, name, active id and
    /// the saved-paintings cache are all cleared. No confirmation, no
    /// persistence side effect.
    pub fn logout(&mut self, canvas: &mut CanvasState) {
        info!("logging out, discarding working copy");
        self.session.current_user = None;
        self.session.active_painting_id = None;
        self.session.epoch += 1;
        self.saved.clear();
        self.in_flight = None;
        canvas.clear();
    }

    /// Save the working copy. No-op when the canvas is empty. Issues a
    /// create when the working copy is unsaved, an update otherwise.
    pub fn save(&mut self, canvas: &CanvasState) -> Result<(), EaselError> {
        let user_id = self.require_user()?;
        if canvas.is_empty() {
            return Ok(());
        }
        self.begin_op(PendingOp::Save)?;

        let payload = PaintingPayload {
            name: canvas.name.clone(),
            shapes: canvas.shapes().to_vec(),
        };
        let cmd = match self.session.active_painting_id {
            Some(painting_id) => RemoteCommand::UpdatePainting {
                epoch: self.session.epoch,
                user_id,
                painting_id,
                payload,
            },
            None => RemoteCommand::CreatePainting {
                epoch: self.session.epoch,
                user_id,
                payload,
            },
        };
        self.send(cmd)
    }

    /// Fetch a saved painting into the working copy.
    pub fn load(&mut self, painting_id: PaintingId) -> Result<(), EaselError> {
        let user_id = self.require_user()?;
        self.begin_op(PendingOp::Load)?;
        self.send(RemoteCommand::FetchPainting {
            epoch: self.session.epoch,
            user_id,
            painting_id,
        })
    }

    /// Delete a saved painting, behind the confirmation gate. Declining
    /// the gate is not an error; nothing is issued.
    pub fn delete(
        &mut self,
        painting_id: PaintingId,
        gate: &mut dyn ConfirmGate,
    ) -> Result<(), EaselError> {
        let user_id = self.require_user()?;
        if !gate.confirm("Are you sure you want to delete this painting?") {
            return Ok(());
        }
        self.begin_op(PendingOp::Delete)?;
        self.send(RemoteCommand::DeletePainting {
            epoch: self.session.epoch,
            user_id,
            painting_id,
        })
    }

    /// Refresh the saved-paintings cache. Read-only, so not single-flighted.
    pub fn list_saved(&mut self) -> Result<(), EaselError> {
        let user_id = self.require_user()?;
        self.send(RemoteCommand::ListPaintings {
            epoch: self.session.epoch,
            user_id,
        })
    }

    /// Reset the working copy to a fresh unsaved painting. The previously
    /// saved version, if any, stays on the backend.
    pub fn new_painting(&mut self, canvas: &mut CanvasState) {
        canvas.clear();
        self.session.active_painting_id = None;
    }

    /// Import a portable document into the working copy. An imported
    /// painting is always unsaved, even if it was exported from a saved
    /// one, so the original cannot be silently overwritten.
    pub fn import_document(
        &mut self,
        canvas: &mut CanvasState,
        text: &str,
    ) -> Result<(), EaselError> {
        let doc = file_io::import_painting(text)?;
        canvas.reset(doc.name, doc.shapes);
        self.session.active_painting_id = None;
        Ok(())
    }

    /// Apply a worker event to the session and canvas. Returns a status
    /// message for the user, if any. Events issued under an older epoch
    /// are discarded whole.
    pub fn apply_event(
        &mut self,
        canvas: &mut CanvasState,
        event: RemoteEvent,
    ) -> Option<String> {
        if event.epoch() != self.session.epoch {
            debug!(?event, "discarding stale remote event");
            return None;
        }

        match event {
            RemoteEvent::LoggedIn { user, .. } => {
                self.in_flight = None;
                let username = user.username.clone();
                self.session.current_user = Some(user);
                self.session.active_painting_id = None;
                if let Err(e) = self.list_saved() {
                    return Some(e.to_string());
                }
                Some(format!("Welcome, {username}!"))
            }
            RemoteEvent::LoginFailed { error, .. } => {
                self.in_flight = None;
                Some(error.to_string())
            }
            RemoteEvent::Paintings { paintings, .. } => {
                self.saved = paintings;
                None
            }
            RemoteEvent::Saved { id, message, .. } => {
                self.in_flight = None;
                // First successful save assigns the backend id; from then
                // on saves are updates against it.
                if self.session.active_painting_id.is_none() {
                    self.session.active_painting_id = Some(id);
                }
                if let Err(e) = self.list_saved() {
                    return Some(e.to_string());
                }
                Some(message)
            }
            RemoteEvent::Loaded { painting, .. } => {
                self.in_flight = None;
                let name = painting.name.clone();
                canvas.reset(painting.name, painting.shapes);
                self.session.active_painting_id = Some(painting.id);
                Some(format!("Loaded \"{name}\""))
            }
            RemoteEvent::Deleted { id, .. } => {
                self.in_flight = None;
                // Deleting the painting being edited orphans the working
                // copy: reset to the blank default.
                if self.session.active_painting_id == Some(id) {
                    canvas.clear();
                    self.session.active_painting_id = None;
                }
                if let Err(e) = self.list_saved() {
                    return Some(e.to_string());
                }
                Some("Painting deleted successfully".to_string())
            }
            RemoteEvent::Failed { error, .. } => {
                self.in_flight = None;
                Some(error.to_string())
            }
            RemoteEvent::ListFailed { error, .. } => {
                // The guard belongs to whatever save/load/delete may still
                // be outstanding; a failed list refresh does not touch it.
                Some(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DEFAULT_NAME;
    use crate::shapes::{place, ShapeType};

    struct Always(bool);

    impl ConfirmGate for Always {
        fn confirm(&mut self, _prompt: &str) -> bool {
            self.0
        }
    }

    fn controller() -> (PersistenceController, std_mpsc::Receiver<RemoteCommand>) {
        let (tx, rx) = std_mpsc::channel();
        (PersistenceController::new(tx), rx)
    }

    fn logged_in() -> (
        PersistenceController,
        std_mpsc::Receiver<RemoteCommand>,
        CanvasState,
    ) {
        let (mut ctl, rx) = controller();
        let mut canvas = CanvasState::new();
        ctl.login("user1", "password1").unwrap();
        rx.recv().unwrap(); // the login command itself
        ctl.apply_event(
            &mut canvas,
            RemoteEvent::LoggedIn {
                epoch: 0,
                user: User {
                    id: 1,
                    username: "user1".to_string(),
                },
            },
        );
        rx.recv().unwrap(); // list refresh triggered by login
        (ctl, rx, canvas)
    }

    fn one_shape(canvas: &mut CanvasState) {
        canvas.add_shape(place(ShapeType::Square, "#ff6b6b", 100.0, 100.0, 800.0, 600.0));
    }

    #[test]
    fn save_with_empty_canvas_is_a_noop() {
        let (mut ctl, rx, canvas) = logged_in();
        ctl.save(&canvas).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(!ctl.is_busy());
    }

    #[test]
    fn first_save_creates_then_subsequent_save_updates() {
        let (mut ctl, rx, mut canvas) = logged_in();
        one_shape(&mut canvas);

        ctl.save(&canvas).unwrap();
        assert!(matches!(
            rx.recv().unwrap(),
            RemoteCommand::CreatePainting { user_id: 1, .. }
        ));

        let msg = ctl.apply_event(
            &mut canvas,
            RemoteEvent::Saved {
                epoch: 0,
                id: 42,
                message: "Painting saved successfully".to_string(),
            },
        );
        assert_eq!(msg.as_deref(), Some("Painting saved successfully"));
        assert_eq!(ctl.session().active_painting_id(), Some(42));
        rx.recv().unwrap(); // list refresh after save

        ctl.save(&canvas).unwrap();
        assert!(matches!(
            rx.recv().unwrap(),
            RemoteCommand::UpdatePainting {
                painting_id: 42,
                ..
            }
        ));
    }

    #[test]
    fn overlapping_saves_hit_the_single_flight_guard() {
        let (mut ctl, _rx, mut canvas) = logged_in();
        one_shape(&mut canvas);

        ctl.save(&canvas).unwrap();
        assert!(matches!(ctl.save(&canvas), Err(EaselError::Busy)));
    }

    #[test]
    fn list_failure_does_not_release_the_single_flight_guard() {
        let (mut ctl, rx, mut canvas) = logged_in();
        one_shape(&mut canvas);
        ctl.save(&canvas).unwrap();
        rx.recv().unwrap();

        // A list refresh fails while the save is still outstanding.
        let msg = ctl.apply_event(
            &mut canvas,
            RemoteEvent::ListFailed {
                epoch: 0,
                error: EaselError::Connection("boom".to_string()),
            },
        );
        assert!(msg.unwrap().contains("boom"));
        assert!(ctl.is_busy());
        assert!(matches!(
            ctl.delete(99, &mut Always(true)),
            Err(EaselError::Busy)
        ));
    }

    #[test]
    fn failed_save_leaves_local_state_untouched() {
        let (mut ctl, _rx, mut canvas) = logged_in();
        one_shape(&mut canvas);
        ctl.save(&canvas).unwrap();

        let msg = ctl.apply_event(
            &mut canvas,
            RemoteEvent::Failed {
                epoch: 0,
                error: EaselError::Connection("boom".to_string()),
            },
        );
        assert!(msg.unwrap().contains("boom"));
        assert_eq!(ctl.session().active_painting_id(), None);
        assert_eq!(canvas.len(), 1);
        assert!(!ctl.is_busy());
    }

    #[test]
    fn load_resets_canvas_and_sets_active_id() {
        let (mut ctl, rx, mut canvas) = logged_in();
        ctl.load(7).unwrap();
        assert!(matches!(
            rx.recv().unwrap(),
            RemoteCommand::FetchPainting { painting_id: 7, .. }
        ));

        ctl.apply_event(
            &mut canvas,
            RemoteEvent::Loaded {
                epoch: 0,
                painting: crate::remote::PaintingDetail {
                    id: 7,
                    name: "Sunset".to_string(),
                    shapes: vec![place(ShapeType::Circle, "#4ecdc4", 50.0, 50.0, 800.0, 600.0)],
                },
            },
        );
        assert_eq!(canvas.name, "Sunset");
        assert_eq!(canvas.len(), 1);
        assert_eq!(ctl.session().active_painting_id(), Some(7));
    }

    #[test]
    fn deleting_the_active_painting_resets_the_working_copy() {
        let (mut ctl, rx, mut canvas) = logged_in();
        one_shape(&mut canvas);
        ctl.save(&canvas).unwrap();
        rx.recv().unwrap();
        ctl.apply_event(
            &mut canvas,
            RemoteEvent::Saved {
                epoch: 0,
                id: 7,
                message: "ok".to_string(),
            },
        );
        rx.recv().unwrap();

        ctl.delete(7, &mut Always(true)).unwrap();
        rx.recv().unwrap();
        ctl.apply_event(&mut canvas, RemoteEvent::Deleted { epoch: 0, id: 7 });

        assert_eq!(canvas.name, DEFAULT_NAME);
        assert!(canvas.is_empty());
        assert_eq!(ctl.session().active_painting_id(), None);
    }

    #[test]
    fn deleting_another_painting_keeps_the_working_copy() {
        let (mut ctl, rx, mut canvas) = logged_in();
        one_shape(&mut canvas);

        ctl.delete(99, &mut Always(true)).unwrap();
        rx.recv().unwrap();
        ctl.apply_event(&mut canvas, RemoteEvent::Deleted { epoch: 0, id: 99 });

        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn declined_confirmation_issues_nothing() {
        let (mut ctl, rx, _canvas) = logged_in();
        ctl.delete(7, &mut Always(false)).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(!ctl.is_busy());
    }

    #[test]
    fn logout_tears_down_everything() {
        let (mut ctl, _rx, mut canvas) = logged_in();
        for _ in 0..3 {
            one_shape(&mut canvas);
        }
        ctl.apply_event(
            &mut canvas,
            RemoteEvent::Paintings {
                epoch: 0,
                paintings: vec![PaintingSummary {
                    id: 1,
                    name: "a".to_string(),
                    updated_at: None,
                }],
            },
        );

        ctl.logout(&mut canvas);

        assert!(!ctl.session().is_logged_in());
        assert_eq!(ctl.session().active_painting_id(), None);
        assert!(canvas.is_empty());
        assert_eq!(canvas.name, DEFAULT_NAME);
        assert!(ctl.saved_paintings().is_empty());
    }

    #[test]
    fn stale_response_after_logout_is_discarded() {
        let (mut ctl, _rx, mut canvas) = logged_in();
        one_shape(&mut canvas);
        ctl.save(&canvas).unwrap();
        ctl.logout(&mut canvas);

        // The in-flight save from epoch 0 completes after the logout.
        let msg = ctl.apply_event(
            &mut canvas,
            RemoteEvent::Saved {
                epoch: 0,
                id: 42,
                message: "too late".to_string(),
            },
        );
        assert!(msg.is_none());
        assert_eq!(ctl.session().active_painting_id(), None);
        assert!(canvas.is_empty());
    }

    #[test]
    fn import_clears_the_active_painting_id() {
        let (mut ctl, rx, mut canvas) = logged_in();
        one_shape(&mut canvas);
        ctl.save(&canvas).unwrap();
        rx.recv().unwrap();
        ctl.apply_event(
            &mut canvas,
            RemoteEvent::Saved {
                epoch: 0,
                id: 5,
                message: "ok".to_string(),
            },
        );

        let text = crate::file_io::export_painting(&canvas.name, canvas.shapes()).unwrap();
        ctl.import_document(&mut canvas, &text).unwrap();

        assert_eq!(ctl.session().active_painting_id(), None);
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn failed_import_leaves_canvas_untouched() {
        let (mut ctl, _rx, mut canvas) = logged_in();
        one_shape(&mut canvas);
        let before = canvas.shapes().to_vec();

        let err = ctl.import_document(&mut canvas, r#"{"foo": 1}"#).unwrap_err();
        assert!(matches!(err, EaselError::Validation(_)));
        assert_eq!(canvas.shapes(), before.as_slice());
    }

    #[test]
    fn operations_require_a_session() {
        let (mut ctl, _rx) = controller();
        let mut canvas = CanvasState::new();
        one_shape(&mut canvas);
        assert!(matches!(ctl.save(&canvas), Err(EaselError::Auth(_))));
        assert!(matches!(ctl.load(1), Err(EaselError::Auth(_))));
        assert!(matches!(
            ctl.delete(1, &mut Always(true)),
            Err(EaselError::Auth(_))
        ));
    }
}
