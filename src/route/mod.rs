//! Client-side routes.
//!
//! The dashboard location embeds the subject id so it can be bookmarked and
//! reopened after a restart.

/// A page the client can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Setup,
    Dashboard { subject_id: String },
    NotFound,
}

impl Route {
    pub fn dashboard(subject_id: impl Into<String>) -> Self {
        Route::Dashboard {
            subject_id: subject_id.into(),
        }
    }

    /// Resolve a location path. Query strings and fragments are ignored.
    pub fn parse(location: &str) -> Self {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Setup,
            ["dashboard", subject_id] => Route::dashboard(*subject_id),
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Setup => "/".to_string(),
            Route::Dashboard { subject_id } => format!("/dashboard/{}", subject_id),
            Route::NotFound => "/404".to_string(),
        }
    }
}
