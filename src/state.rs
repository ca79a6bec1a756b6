use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::{Config, EditPolicy},
    designer::{edit_design, generate_designs},
    error::AppError,
    fengshui::analyze_feng_shui,
    gemini::{ImageGenerator, TextGenerator},
    models::{DesignRequest, DesignSession, DesignSuggestion, EditOutcome},
};

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub images: Arc<dyn ImageGenerator>,
    pub text: Arc<dyn TextGenerator>,
    pub store: Arc<RwLock<HashMap<Uuid, DesignSession>>>,
    edits_in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

/// Holds a suggestion's edit slot until dropped.
struct EditSlot {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    suggestion_id: Uuid,
}

impl Drop for EditSlot {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.suggestion_id);
    }
}

impl AppState {
    pub fn new(config: Arc<Config>, images: Arc<dyn ImageGenerator>, text: Arc<dyn TextGenerator>) -> Self {
        Self {
            config,
            images,
            text,
            store: Arc::default(),
            edits_in_flight: Arc::default(),
        }
    }

    /// Runs design generation and the feng shui reading side by side and
    /// stores the outcome as a new session.
    pub async fn submit(&self, request: DesignRequest) -> Result<DesignSession, AppError> {
        let designs = {
            let images = Arc::clone(&self.images);
            let settings = self.config.design.clone();
            let request = request.clone();
            tokio::spawn(async move {
                generate_designs(images.as_ref(), &request, settings.variation_count, &settings).await
            })
        };

        let advice = request.birth_date.clone().map(|birth_date| {
            let text = Arc::clone(&self.text);
            let settings = self.config.feng_shui.clone();
            tokio::spawn(async move { analyze_feng_shui(text.as_ref(), &birth_date, &settings).await })
        });
        let advice = async move {
            match advice {
                Some(handle) => handle.await.map(Some),
                None => Ok(None),
            }
        };

        let (results, feng_shui) = match tokio::join!(designs, advice) {
            (Ok(results), Ok(feng_shui)) => (results, feng_shui),
            (Err(e), _) | (_, Err(e)) => {
                error!("❌ Design submission failed: {}", e);
                return Err(AppError::Busy);
            }
        };

        let suggestions: Vec<DesignSuggestion> = results
            .into_iter()
            .map(|result| DesignSuggestion::from_result(result, &request))
            .collect();

        let session = DesignSession {
            id: Uuid::new_v4(),
            request,
            suggestions,
            feng_shui,
            created_at: Utc::now(),
        };
        info!("✅ Session {} created with {} suggestions", session.id, session.suggestions.len());

        self.store.write().insert(session.id, session.clone());
        Ok(session)
    }

    pub fn session(&self, id: Uuid) -> Result<DesignSession, AppError> {
        self.store
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("design session {id}")))
    }

    /// Applies an edit instruction to one suggestion's rendering.
    ///
    /// The store lock is not held while the provider works. If the session is
    /// reset in the meantime the new image is dropped.
    pub async fn edit(
        &self,
        session_id: Uuid,
        suggestion_id: Uuid,
        instruction: &str,
    ) -> Result<EditOutcome, AppError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(AppError::Validation("edit instruction must not be empty".into()));
        }

        let current = {
            let store = self.store.read();
            let session = store
                .get(&session_id)
                .ok_or_else(|| AppError::NotFound(format!("design session {session_id}")))?;
            session
                .suggestions
                .iter()
                .find(|s| s.id == suggestion_id)
                .ok_or_else(|| AppError::NotFound(format!("suggestion {suggestion_id}")))?
                .image
                .clone()
        };

        let _slot = match self.config.edit_policy {
            EditPolicy::Single => Some(self.claim_edit_slot(suggestion_id)?),
            EditPolicy::Concurrent => None,
        };

        info!("✏️ Editing suggestion {}: {}", suggestion_id, instruction);
        let edited = edit_design(self.images.as_ref(), &current, instruction, &self.config.design.aspect_ratio)
            .await
            .map_err(|e| {
                error!("❌ Edit of suggestion {} failed: {}", suggestion_id, e);
                AppError::EditFailed
            })?;

        let mut store = self.store.write();
        let Some(suggestion) = store
            .get_mut(&session_id)
            .and_then(|session| session.suggestions.iter_mut().find(|s| s.id == suggestion_id))
        else {
            info!("Session {} was reset while an edit was pending, discarding result", session_id);
            return Err(AppError::NotFound(format!("design session {session_id}")));
        };

        match edited {
            Some(image) => {
                info!("✅ Suggestion {} updated: {}", suggestion_id, image.preview());
                suggestion.image = image;
                suggestion.updated_at = Utc::now();
                Ok(EditOutcome { changed: true, suggestion: suggestion.clone() })
            }
            None => {
                warn!("⚠️ Edit of suggestion {} returned no image, keeping the current one", suggestion_id);
                Ok(EditOutcome { changed: false, suggestion: suggestion.clone() })
            }
        }
    }

    pub fn reset(&self, id: Uuid) -> Result<(), AppError> {
        self.store
            .write()
            .remove(&id)
            .map(|_| info!("🧹 Session {} reset", id))
            .ok_or_else(|| AppError::NotFound(format!("design session {id}")))
    }

    fn claim_edit_slot(&self, suggestion_id: Uuid) -> Result<EditSlot, AppError> {
        if !self.edits_in_flight.lock().insert(suggestion_id) {
            return Err(AppError::EditInProgress);
        }
        Ok(EditSlot { in_flight: Arc::clone(&self.edits_in_flight), suggestion_id })
    }
}
