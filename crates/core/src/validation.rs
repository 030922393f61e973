//! Input validation for poll operations.

use ballotbox_common::{AppError, AppResult};
use ballotbox_db::PollRecord;
use serde::Deserialize;
use validator::Validate;

/// Minimum number of options on a poll.
pub const MIN_OPTIONS: usize = 2;
/// Maximum number of options on a poll.
pub const MAX_OPTIONS: usize = 10;
/// Maximum option length, in characters, after trimming.
pub const MAX_OPTION_LENGTH: usize = 100;

/// Full poll document submitted on create.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    /// Must equal the poll key the request is addressed to.
    #[validate(length(min = 1))]
    pub id: String,
    /// Question text, at most 500 characters.
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Advisory time-to-live in seconds.
    #[validate(range(min = 1))]
    pub ttl: u64,
    /// Creation time in milliseconds since the Unix epoch.
    #[validate(range(min = 0))]
    pub created_at: i64,
    /// Must equal the caller's subject.
    #[validate(length(min = 1))]
    pub owner_id: String,
    /// Client-supplied counters are accepted but never trusted.
    #[serde(default)]
    pub votes: Option<Vec<u64>>,
}

impl CreatePollInput {
    /// Validate field limits and the option list.
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        validate_question(&self.question)?;
        validate_options(&self.options)
    }

    /// Build the record to persist, with every counter at zero.
    #[must_use]
    pub fn into_record(self) -> PollRecord {
        let votes = vec![0; self.options.len()];
        PollRecord {
            id: self.id,
            question: self.question.trim().to_string(),
            options: self.options.iter().map(|o| o.trim().to_string()).collect(),
            ttl: self.ttl,
            created_at: self.created_at,
            owner_id: self.owner_id,
            votes,
        }
    }
}

/// Partial update of a poll. Other keys in the body are ignored.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollInput {
    /// New question text.
    #[validate(length(min = 1, max = 500))]
    pub question: Option<String>,
    /// New option list; counters are resized to match.
    pub options: Option<Vec<String>>,
    /// New time-to-live.
    #[validate(range(min = 1))]
    pub ttl: Option<u64>,
}

impl UpdatePollInput {
    /// Validate whichever fields are present.
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        if let Some(question) = &self.question {
            validate_question(question)?;
        }
        if let Some(options) = &self.options {
            validate_options(options)?;
        }
        Ok(())
    }

    /// Merge the patch over `poll`, keeping `votes` aligned with `options`.
    pub fn apply_to(self, poll: &mut PollRecord) {
        if let Some(question) = self.question {
            poll.question = question.trim().to_string();
        }
        if let Some(options) = self.options {
            poll.options = options.iter().map(|o| o.trim().to_string()).collect();
        }
        if let Some(ttl) = self.ttl {
            poll.ttl = ttl;
        }
        poll.align_votes();
    }
}

fn validate_question(question: &str) -> AppResult<()> {
    if question.trim().is_empty() {
        return Err(AppError::Validation(
            "Poll question cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_options(options: &[String]) -> AppResult<()> {
    if options.len() < MIN_OPTIONS {
        return Err(AppError::Validation(format!(
            "Poll must have at least {MIN_OPTIONS} options"
        )));
    }
    if options.len() > MAX_OPTIONS {
        return Err(AppError::Validation(format!(
            "Poll cannot have more than {MAX_OPTIONS} options"
        )));
    }
    for option in options {
        let option = option.trim();
        if option.is_empty() {
            return Err(AppError::Validation(
                "Poll options cannot be empty".to_string(),
            ));
        }
        if option.chars().count() > MAX_OPTION_LENGTH {
            return Err(AppError::Validation(format!(
                "Poll options must be at most {MAX_OPTION_LENGTH} characters"
            )));
        }
    }
    Ok(())
}

/// Reject option indexes that can never be valid, before any state is read.
pub fn parse_option_index(raw: i64) -> AppResult<u32> {
    u32::try_from(raw).map_err(|_| AppError::Validation(format!("Invalid option index {raw}")))
}

/// Check an option index against the number of options on a poll.
pub fn validate_option_index(raw: i64, option_count: usize) -> AppResult<u32> {
    let index = parse_option_index(raw)?;
    if (index as usize) < option_count {
        Ok(index)
    } else {
        Err(AppError::Validation(format!(
            "Option index {index} is out of range for {option_count} options"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(options: &[&str]) -> CreatePollInput {
        CreatePollInput {
            id: "p1".to_string(),
            question: "Tabs or spaces?".to_string(),
            options: options.iter().map(ToString::to_string).collect(),
            ttl: 86_400,
            created_at: 1_700_000_000_000,
            owner_id: "u1".to_string(),
            votes: None,
        }
    }

    #[test]
    fn test_create_input_limits() {
        assert!(input(&["A", "B"]).check().is_ok());
        assert!(input(&["A"]).check().is_err());
        assert!(input(&["A", " "]).check().is_err());
        assert!(input(&["A"; 11]).check().is_err());

        let long = "x".repeat(101);
        assert!(input(&["A", &long]).check().is_err());

        let mut blank = input(&["A", "B"]);
        blank.question = "   ".to_string();
        assert!(blank.check().is_err());

        let mut no_ttl = input(&["A", "B"]);
        no_ttl.ttl = 0;
        assert!(matches!(no_ttl.check(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_into_record_zeroes_votes() {
        let mut create = input(&[" A ", "B"]);
        create.votes = Some(vec![10, 20]);

        let record = create.into_record();
        assert_eq!(record.votes, vec![0, 0]);
        assert_eq!(record.options, vec!["A", "B"]);
    }

    #[test]
    fn test_patch_ignores_identity_fields() {
        let patch: UpdatePollInput = serde_json::from_str(
            r#"{"question":"New?","ownerId":"u9","id":"other","votes":[9,9]}"#,
        )
        .unwrap();
        let mut poll = input(&["A", "B"]).into_record();

        patch.check().unwrap();
        patch.apply_to(&mut poll);

        assert_eq!(poll.question, "New?");
        assert_eq!(poll.owner_id, "u1");
        assert_eq!(poll.id, "p1");
        assert_eq!(poll.votes, vec![0, 0]);
    }

    #[test]
    fn test_patch_resizes_votes() {
        let mut poll = input(&["A", "B", "C"]).into_record();
        poll.votes = vec![3, 2, 1];

        let shrink = UpdatePollInput {
            options: Some(vec!["A".to_string(), "B".to_string()]),
            ..Default::default()
        };
        shrink.apply_to(&mut poll);
        assert_eq!(poll.votes, vec![3, 2]);

        let grow = UpdatePollInput {
            options: Some(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
            ..Default::default()
        };
        grow.apply_to(&mut poll);
        assert_eq!(poll.votes, vec![3, 2, 0, 0]);
    }

    #[test]
    fn test_option_index() {
        assert!(parse_option_index(-1).is_err());
        assert!(parse_option_index(i64::MAX).is_err());
        assert_eq!(validate_option_index(1, 2).unwrap(), 1);
        assert!(validate_option_index(2, 2).is_err());
    }
}
