use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{DeviceError, SessionError};
use crate::handlers::WasteClassifier;
use crate::models::{CaptureState, ClassificationOutcome, FrameBuffer};

/// Per-browser state: capture status, the current frame and the last result.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub capture: CaptureState,
    pub current_frame: Option<FrameBuffer>,
    pub last_outcome: Option<ClassificationOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            capture: CaptureState::Live,
            current_frame: None,
            last_outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn view(&self) -> SessionView {
        let dimensions = self.current_frame.as_ref().map(FrameBuffer::dimensions);
        SessionView {
            id: self.id.clone(),
            capture: self.capture,
            has_frame: self.current_frame.is_some(),
            frame_width: dimensions.map(|(w, _)| w),
            frame_height: dimensions.map(|(_, h)| h),
            last_outcome: self.last_outcome.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// What the UI gets to see of a session. The frame itself stays server-side.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub capture: CaptureState,
    pub has_frame: bool,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub last_outcome: Option<ClassificationOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Interaction handlers. Each takes the session by value and hands it back.

/// Replaces the current frame.
pub fn record_frame(mut session: Session, frame: FrameBuffer) -> (Session, Result<(), DeviceError>) {
    if session.capture == CaptureState::Stopped {
        return (session, Err(DeviceError::CaptureStopped));
    }

    let (width, height) = frame.dimensions();
    log::debug!("🖼️ Session {} frame updated ({}x{})", session.id, width, height);
    session.current_frame = Some(frame);
    session.touch();
    (session, Ok(()))
}

/// Classifies `frame` if given, otherwise the session's current frame.
pub async fn classify(
    classifier: &WasteClassifier,
    mut session: Session,
    frame: Option<FrameBuffer>,
) -> (Session, Result<ClassificationOutcome, DeviceError>) {
    if session.capture == CaptureState::Stopped {
        return (session, Err(DeviceError::CaptureStopped));
    }

    if let Some(frame) = frame {
        session.current_frame = Some(frame);
    }

    let outcome = match session.current_frame.as_ref() {
        Some(frame) => classifier.classify(&frame.image).await,
        None => return (session, Err(DeviceError::NoFrame)),
    };

    session.last_outcome = Some(outcome.clone());
    session.touch();
    (session, Ok(outcome))
}

/// Stops capture and releases the frame. The last result stays visible.
pub fn stop(mut session: Session) -> Session {
    if session.capture == CaptureState::Live {
        log::info!("🛑 Webcam feed stopped for session {}", session.id);
    }
    session.capture = CaptureState::Stopped;
    session.current_frame = None;
    session.touch();
    session
}

enum Slot {
    Idle(Session),
    Busy,
}

/// In-memory sessions. A session is checked out for the duration of one
/// interaction, so a second request against it is rejected instead of racing.
pub struct SessionStore {
    slots: Mutex<HashMap<String, Slot>>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self) -> SessionView {
        let session = Session::new();
        let view = session.view();
        let mut slots = self.slots();

        if slots.len() >= self.max_sessions {
            let oldest = slots
                .iter()
                .filter_map(|(id, slot)| match slot {
                    Slot::Idle(s) => Some((id.clone(), s.updated_at)),
                    Slot::Busy => None,
                })
                .min_by_key(|(_, updated_at)| *updated_at)
                .map(|(id, _)| id);

            match oldest {
                Some(id) => {
                    log::info!("🧹 Session limit {} reached, evicting {}", self.max_sessions, id);
                    slots.remove(&id);
                }
                None => log::warn!("⚠️ Session limit {} reached but every session is busy", self.max_sessions),
            }
        }

        slots.insert(session.id.clone(), Slot::Idle(session));
        log::info!("👤 New session created: {}", view.id);
        view
    }

    pub fn view(&self, id: &str) -> Result<SessionView, SessionError> {
        match self.slots().get(id) {
            Some(Slot::Idle(session)) => Ok(session.view()),
            Some(Slot::Busy) => Err(SessionError::Busy(id.to_string())),
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    pub fn remove(&self, id: &str) -> Result<(), SessionError> {
        let mut slots = self.slots();
        match slots.get(id) {
            Some(Slot::Idle(_)) => {
                slots.remove(id);
                log::info!("🗑️ Session removed: {}", id);
                Ok(())
            }
            Some(Slot::Busy) => Err(SessionError::Busy(id.to_string())),
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes exclusive ownership of a session until the lease is dropped.
    pub fn checkout(self: &Arc<Self>, id: &str) -> Result<SessionLease, SessionError> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        match std::mem::replace(slot, Slot::Busy) {
            Slot::Idle(session) => Ok(SessionLease {
                store: Arc::clone(self),
                id: id.to_string(),
                session: Some(session),
            }),
            Slot::Busy => {
                log::warn!("⚠️ Session {} already has a request in flight", id);
                Err(SessionError::Busy(id.to_string()))
            }
        }
    }

    fn checkin(&self, session: Session) {
        self.slots().insert(session.id.clone(), Slot::Idle(session));
    }

    fn abandon(&self, id: &str) {
        log::warn!("⚠️ Session {} was dropped mid-request, discarding it", id);
        self.slots().remove(id);
    }
}

/// Exclusive checkout of one session. Returning it happens on drop; if the
/// session was lost mid-interaction (cancelled request) the slot is removed.
pub struct SessionLease {
    store: Arc<SessionStore>,
    id: String,
    session: Option<Session>,
}

impl SessionLease {
    /// Runs one interaction handler over the session and puts the result back.
    pub async fn run<F, Fut, T>(mut self, f: F) -> T
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = (Session, T)>,
    {
        let session = match self.session.take() {
            Some(session) => session,
            None => unreachable!("a lease holds its session until consumed"),
        };
        let (session, out) = f(session).await;
        self.session = Some(session);
        out
    }

    /// Synchronous variant of [`SessionLease::run`].
    pub fn apply<F, T>(mut self, f: F) -> T
    where
        F: FnOnce(Session) -> (Session, T),
    {
        let session = match self.session.take() {
            Some(session) => session,
            None => unreachable!("a lease holds its session until consumed"),
        };
        let (session, out) = f(session);
        self.session = Some(session);
        out
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        match self.session.take() {
            Some(session) => self.store.checkin(session),
            None => self.store.abandon(&self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryPolicy;
    use crate::services::mock::MockVisionService;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::time::Duration;

    fn frame() -> FrameBuffer {
        FrameBuffer::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([200, 200, 200]))))
    }

    fn classifier(reply: &str) -> WasteClassifier {
        WasteClassifier::with_options(
            Arc::new(MockVisionService::replying(reply)),
            CategoryPolicy::Passthrough,
            85,
        )
    }

    #[test]
    fn test_new_session_is_live_and_empty() {
        let view = Session::new().view();
        assert_eq!(view.capture, CaptureState::Live);
        assert!(!view.has_frame);
        assert!(view.last_outcome.is_none());
    }

    #[test]
    fn test_record_frame() {
        let (session, result) = record_frame(Session::new(), frame());
        assert!(result.is_ok());

        let view = session.view();
        assert!(view.has_frame);
        assert_eq!(view.frame_width, Some(20));
        assert_eq!(view.frame_height, Some(10));
    }

    #[test]
    fn test_stop_releases_frame_and_blocks_capture() {
        let (session, _) = record_frame(Session::new(), frame());
        let session = stop(session);
        assert_eq!(session.capture, CaptureState::Stopped);
        assert!(session.current_frame.is_none());

        let (_, result) = record_frame(session, frame());
        assert!(matches!(result, Err(DeviceError::CaptureStopped)));
    }

    #[tokio::test]
    async fn test_classify_stores_outcome() {
        let classifier = classifier("Metal\nTake to scrap metal recycling.");
        let (session, result) = classify(&classifier, Session::new(), Some(frame())).await;

        let outcome = result.unwrap();
        assert_eq!(outcome.classification().category, "Metal");
        assert_eq!(session.last_outcome, Some(outcome));
        assert!(session.current_frame.is_some());
    }

    #[tokio::test]
    async fn test_classify_without_frame() {
        let classifier = classifier("Metal\nScrap.");
        let (session, result) = classify(&classifier, Session::new(), None).await;

        assert!(matches!(result, Err(DeviceError::NoFrame)));
        assert!(session.last_outcome.is_none());
    }

    #[tokio::test]
    async fn test_classify_after_stop() {
        let classifier = classifier("Metal\nScrap.");
        let (_, result) = classify(&classifier, stop(Session::new()), Some(frame())).await;

        assert!(matches!(result, Err(DeviceError::CaptureStopped)));
    }

    #[test]
    fn test_checkout_is_exclusive() {
        let store = Arc::new(SessionStore::new(4));
        let id = store.create().id;

        let lease = store.checkout(&id).unwrap();
        assert!(matches!(store.checkout(&id), Err(SessionError::Busy(_))));
        assert!(matches!(store.view(&id), Err(SessionError::Busy(_))));
        assert!(matches!(store.remove(&id), Err(SessionError::Busy(_))));

        drop(lease);
        assert!(store.view(&id).is_ok());
        assert!(store.checkout(&id).is_ok());
    }

    #[test]
    fn test_unknown_session() {
        let store = Arc::new(SessionStore::new(4));
        assert!(matches!(store.checkout("nope"), Err(SessionError::NotFound(_))));
        assert!(matches!(store.view("nope"), Err(SessionError::NotFound(_))));
        assert!(matches!(store.remove("nope"), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_apply_returns_session_to_store() {
        let store = Arc::new(SessionStore::new(4));
        let id = store.create().id;

        store.checkout(&id).unwrap().apply(|s| (stop(s), ()));

        assert_eq!(store.view(&id).unwrap().capture, CaptureState::Stopped);
    }

    #[tokio::test]
    async fn test_cancelled_interaction_discards_session() {
        let store = Arc::new(SessionStore::new(4));
        let id = store.create().id;

        let lease = store.checkout(&id).unwrap();
        let interaction = lease.run(|session| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            (session, ())
        });
        assert!(tokio::time::timeout(Duration::from_millis(10), interaction).await.is_err());

        assert!(matches!(store.view(&id), Err(SessionError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_evicts_oldest_idle_session() {
        let store = Arc::new(SessionStore::new(2));
        let first = store.create().id;
        std::thread::sleep(Duration::from_millis(5));
        let second = store.create().id;
        std::thread::sleep(Duration::from_millis(5));
        let third = store.create().id;

        assert_eq!(store.len(), 2);
        assert!(store.view(&first).is_err());
        assert!(store.view(&second).is_ok());
        assert!(store.view(&third).is_ok());
    }

    #[test]
    fn test_busy_sessions_are_not_evicted() {
        let store = Arc::new(SessionStore::new(1));
        let first = store.create().id;
        let _lease = store.checkout(&first).unwrap();

        let second = store.create().id;
        assert_eq!(store.len(), 2);
        assert!(store.view(&second).is_ok());
    }
}
