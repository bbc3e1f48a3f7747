use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cycle::CycleId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuggestionId(pub String);

impl SuggestionId {
    pub fn generate() -> Self {
        Self(format!("sugg-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub cycle_id: CycleId,
    pub user_id: String,
    pub book_name: String,
    pub author: String,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub vote_points: u32,
    /// Submission order assigned by the store on insert; zero until stored.
    pub sequence: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuggestionInput {
    pub book_name: String,
    pub author: String,
    pub link: Option<String>,
    pub notes: Option<String>,
}

impl Suggestion {
    pub fn new(
        cycle_id: CycleId,
        user_id: impl Into<String>,
        input: SuggestionInput,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let book_name = input.book_name.trim().to_owned();
        if book_name.is_empty() {
            return Err(DomainError::Validation("book name is required".to_owned()));
        }
        let author = input.author.trim().to_owned();
        if author.is_empty() {
            return Err(DomainError::Validation("author is required".to_owned()));
        }

        let link = non_empty(input.link);
        if let Some(link) = &link {
            if !link.starts_with("http://") && !link.starts_with("https://") {
                return Err(DomainError::Validation(format!(
                    "link `{link}` must start with http:// or https://"
                )));
            }
        }

        Ok(Self {
            id: SuggestionId::generate(),
            cycle_id,
            user_id: user_id.into(),
            book_name,
            author,
            link,
            notes: non_empty(input.notes),
            created_at: now,
            vote_points: 0,
            sequence: 0,
        })
    }

    /// Display line that never includes the proposing user.
    pub fn title_line(&self) -> String {
        format!("{} by {}", self.book_name, self.author)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Suggestion, SuggestionInput};
    use crate::domain::cycle::CycleId;
    use crate::errors::DomainError;

    fn input(book: &str, author: &str) -> SuggestionInput {
        SuggestionInput { book_name: book.to_owned(), author: author.to_owned(), ..Default::default() }
    }

    #[test]
    fn new_suggestion_trims_fields_and_starts_at_zero_points() {
        let suggestion = Suggestion::new(
            CycleId("cycle-1".to_owned()),
            "U1",
            SuggestionInput {
                book_name: "  Dune ".to_owned(),
                author: "Frank Herbert".to_owned(),
                link: Some("  ".to_owned()),
                notes: Some(" classic ".to_owned()),
            },
            Utc::now(),
        )
        .expect("valid suggestion");

        assert_eq!(suggestion.book_name, "Dune");
        assert_eq!(suggestion.link, None);
        assert_eq!(suggestion.notes.as_deref(), Some("classic"));
        assert_eq!(suggestion.vote_points, 0);
        assert_eq!(suggestion.title_line(), "Dune by Frank Herbert");
        assert!(!suggestion.title_line().contains("U1"));
    }

    #[test]
    fn missing_book_or_author_is_rejected() {
        let cycle = CycleId("cycle-1".to_owned());
        let missing_book = Suggestion::new(cycle.clone(), "U1", input(" ", "Someone"), Utc::now());
        let missing_author = Suggestion::new(cycle, "U1", input("Dune", ""), Utc::now());

        assert!(matches!(missing_book, Err(DomainError::Validation(_))));
        assert!(matches!(missing_author, Err(DomainError::Validation(_))));
    }

    #[test]
    fn non_http_link_is_rejected() {
        let result = Suggestion::new(
            CycleId("cycle-1".to_owned()),
            "U1",
            SuggestionInput { link: Some("ftp://books".to_owned()), ..input("Dune", "Herbert") },
            Utc::now(),
        );

        assert!(matches!(result, Err(DomainError::Validation(message)) if message.contains("ftp://")));
    }
}
