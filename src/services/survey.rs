//! Post-event surveys

use tracing::info;
use crate::database::DatabaseService;
use crate::models::{RegistrationStatus, SurveyResponse, SurveySummary, User};
use crate::utils::errors::{EventDeskError, Result};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;
const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Clone)]
pub struct SurveyService {
    db: DatabaseService,
}

impl SurveyService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Store the attendee's rating; a second answer replaces the first
    pub async fn record_rating(&self, user: &User, event_id: i64, rating: i16) -> Result<SurveyResponse> {
        validate_rating(rating)?;
        self.ensure_attendee(user, event_id).await?;

        let response = self.db.surveys.upsert_rating(event_id, user.id, rating).await?;
        info!(event_id = event_id, user_id = user.id, rating = rating, "Survey rating recorded");
        Ok(response)
    }

    /// Attach a comment to an existing rating
    pub async fn add_comment(&self, user: &User, event_id: i64, comment: &str) -> Result<SurveyResponse> {
        let comment = validate_comment(comment)?;

        self.db
            .surveys
            .set_comment(event_id, user.id, &comment)
            .await?
            .ok_or_else(|| EventDeskError::InvalidInput("Rate the event before leaving a comment".to_string()))
    }

    pub async fn summary(&self, event_id: i64) -> Result<SurveySummary> {
        self.db.surveys.summary(event_id).await
    }

    async fn ensure_attendee(&self, user: &User, event_id: i64) -> Result<()> {
        let registration = self.db.registrations.find_for_user(event_id, user.id).await?;
        match registration {
            Some(registration) if registration.status == RegistrationStatus::Attended => Ok(()),
            _ => Err(EventDeskError::PermissionDenied(format!(
                "User {} did not attend event {}",
                user.id, event_id
            ))),
        }
    }
}

pub fn validate_rating(rating: i16) -> Result<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(EventDeskError::InvalidInput(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

pub fn validate_comment(comment: &str) -> Result<String> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(EventDeskError::InvalidInput("Comment is empty".to_string()));
    }
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(EventDeskError::InvalidInput(format!(
            "Comment is longer than {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(comment.to_string())
}
