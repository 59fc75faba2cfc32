use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::domain::{Record, RequestContext};
use crate::error::PortalError;

pub const TITLE: &str = "title";
pub const SUMMARY: &str = "summary";
pub const AUTHOR: &str = "author";
pub const ROLE: &str = "role";
pub const FILE_NAME: &str = "file_name";
pub const FILE_DATA: &str = "file_data";
pub const CREATED_AT: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchDraft {
    pub title: String,
    pub summary: String,
    pub attachment: Option<Attachment>,
}

impl ResearchDraft {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.attachment = Some(Attachment {
            file_name: file_name.into(),
            bytes,
        });
        self
    }

    pub fn to_record(&self, ctx: &RequestContext, created_at: &str) -> Result<Record, PortalError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(PortalError::Validation("A title is required.".to_string()));
        }
        let mut record = Record::new();
        record.insert(TITLE, title);
        record.insert(SUMMARY, self.summary.trim());
        record.insert(AUTHOR, ctx.name.as_str());
        record.insert(ROLE, ctx.role.to_string());
        record.insert(CREATED_AT, created_at);
        record.insert(
            FILE_NAME,
            self.attachment.as_ref().map(|file| file.file_name.clone()),
        );
        record.insert(
            FILE_DATA,
            self.attachment.as_ref().map(|file| STANDARD.encode(&file.bytes)),
        );
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchItem {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub author: String,
    pub official: bool,
    pub created_at: String,
    pub file_name: Option<String>,
    pub file_data: Option<String>,
}

impl ResearchItem {
    pub fn from_record(record: &Record) -> Result<Self, PortalError> {
        let id = record
            .id()
            .ok_or_else(|| PortalError::Storage("research row without id".to_string()))?;
        let text = |key: &str| record.text(key).unwrap_or_default().to_string();
        Ok(Self {
            id,
            title: text(TITLE),
            summary: text(SUMMARY),
            author: text(AUTHOR),
            official: record.text(ROLE) == Some("Admin"),
            created_at: text(CREATED_AT),
            file_name: record.text(FILE_NAME).map(str::to_string),
            file_data: record.text(FILE_DATA).map(str::to_string),
        })
    }

    pub fn attachment_bytes(&self) -> Result<Option<Vec<u8>>, PortalError> {
        self.file_data
            .as_deref()
            .map(|data| {
                STANDARD
                    .decode(data)
                    .map_err(|err| PortalError::Storage(format!("attachment {}: {err}", self.id)))
            })
            .transpose()
    }
}

pub fn newest_first(mut items: Vec<ResearchItem>) -> Vec<ResearchItem> {
    items.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    items
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::Role;

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new("Meera", "meera@x.org".parse().unwrap(), role)
    }

    #[test]
    fn attachment_is_base64_encoded() {
        let draft = ResearchDraft::new("Tide notes", "summary").with_attachment("notes.txt", b"hello".to_vec());
        let mut record = draft.to_record(&ctx(Role::User), "2024-03-09 10:00:00").unwrap();
        assert_eq!(record.text(FILE_DATA), Some("aGVsbG8="));
        record.insert("id", 1);
        let item = ResearchItem::from_record(&record).unwrap();
        assert_eq!(item.attachment_bytes().unwrap(), Some(b"hello".to_vec()));
        assert!(!item.official);
    }

    #[test]
    fn admin_posts_are_official() {
        let mut record = ResearchDraft::new("Advisory", "")
            .to_record(&ctx(Role::Admin), "2024-03-09 10:00:00")
            .unwrap();
        record.insert("id", 2);
        let item = ResearchItem::from_record(&record).unwrap();
        assert!(item.official);
        assert_eq!(item.file_name, None);
    }

    #[test]
    fn blank_title_is_rejected() {
        let result = ResearchDraft::new("  ", "x").to_record(&ctx(Role::User), "now");
        assert_matches!(result, Err(PortalError::Validation(_)));
    }

    #[test]
    fn ordering_is_newest_first() {
        let item = |id, created_at: &str| ResearchItem {
            id,
            title: String::new(),
            summary: String::new(),
            author: String::new(),
            official: false,
            created_at: created_at.to_string(),
            file_name: None,
            file_data: None,
        };
        let sorted = newest_first(vec![
            item(1, "2024-01-01"),
            item(2, "2024-02-01"),
            item(3, "2024-02-01"),
        ]);
        let ids = sorted.iter().map(|item| item.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
