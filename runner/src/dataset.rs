//! In-memory representation of a generated dataset: illness cases owning tagged documents.

use chrono::{DateTime, SecondsFormat, Utc};
use std::{borrow::Cow, sync::Arc};

/// Number of distinct attribute keys a document can carry
pub const ATTRIBUTE_COUNT: usize = 20;

/// Every attribute key, core attributes first, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    FirstName,
    LastName,
    IllnessCaseId,
    TenantId,
    PublishedAt,
    Email,
    PhoneNumber,
    Address,
    City,
    Country,
    ZipCode,
    Diagnosis,
    Severity,
    Status,
    AssignedTo,
    Department,
    Priority,
    Category,
    Subcategory,
    Notes,
}

impl Tag {
    pub const CORE: [Tag; 5] = [
        Tag::FirstName,
        Tag::LastName,
        Tag::IllnessCaseId,
        Tag::TenantId,
        Tag::PublishedAt,
    ];

    pub const OPTIONAL: [Tag; 15] = [
        Tag::Email,
        Tag::PhoneNumber,
        Tag::Address,
        Tag::City,
        Tag::Country,
        Tag::ZipCode,
        Tag::Diagnosis,
        Tag::Severity,
        Tag::Status,
        Tag::AssignedTo,
        Tag::Department,
        Tag::Priority,
        Tag::Category,
        Tag::Subcategory,
        Tag::Notes,
    ];

    /// key as stored in tag rows, tag lists and column names
    pub fn key(self) -> &'static str {
        match self {
            Self::FirstName => "firstname",
            Self::LastName => "lastname",
            Self::IllnessCaseId => "illness_case_id",
            Self::TenantId => "tenant_id",
            Self::PublishedAt => "published_at",
            Self::Email => "email",
            Self::PhoneNumber => "phone_number",
            Self::Address => "address",
            Self::City => "city",
            Self::Country => "country",
            Self::ZipCode => "zip_code",
            Self::Diagnosis => "diagnosis",
            Self::Severity => "severity",
            Self::Status => "status",
            Self::AssignedTo => "assigned_to",
            Self::Department => "department",
            Self::Priority => "priority",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Notes => "notes",
        }
    }

    pub fn is_core(self) -> bool {
        Self::CORE.contains(&self)
    }
}

#[derive(Debug, Clone)]
pub struct IllnessCase {
    pub illness_case_id: Arc<str>,
    pub first_name: Arc<str>,
    pub last_name: Arc<str>,
    pub tenant_id: Arc<str>,
    pub documents: Vec<Document>,
}

/// A document always carries the core attributes inherited from its case, optional
/// attributes are kept sorted in `Tag::OPTIONAL` order
#[derive(Debug, Clone)]
pub struct Document {
    pub document_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub first_name: Arc<str>,
    pub last_name: Arc<str>,
    pub illness_case_id: Arc<str>,
    pub tenant_id: Arc<str>,
    pub published_at: DateTime<Utc>,
    pub optional: Vec<(Tag, String)>,
}

impl Document {
    pub fn tag(&self, tag: Tag) -> Option<Cow<'_, str>> {
        match tag {
            Tag::FirstName => Some(Cow::Borrowed(&*self.first_name)),
            Tag::LastName => Some(Cow::Borrowed(&*self.last_name)),
            Tag::IllnessCaseId => Some(Cow::Borrowed(&*self.illness_case_id)),
            Tag::TenantId => Some(Cow::Borrowed(&*self.tenant_id)),
            Tag::PublishedAt => Some(Cow::Owned(format_timestamp(&self.published_at))),
            optional => self
                .optional
                .iter()
                .find(|(key, _)| *key == optional)
                .map(|(_, value)| Cow::Borrowed(value.as_str())),
        }
    }

    /// all present attributes, core first
    pub fn tags(&self) -> impl Iterator<Item = (Tag, Cow<'_, str>)> + '_ {
        Tag::CORE
            .into_iter()
            .filter_map(|tag| self.tag(tag).map(|value| (tag, value)))
            .chain(
                self.optional
                    .iter()
                    .map(|(tag, value)| (*tag, Cow::Borrowed(value.as_str()))),
            )
    }
}

/// RFC 3339 text with millisecond precision, the form tag variants store and sort
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn documents(cases: &[IllnessCase]) -> impl Iterator<Item = &Document> {
    cases.iter().flat_map(|case| case.documents.iter())
}

pub fn total_documents(cases: &[IllnessCase]) -> usize {
    cases.iter().map(|case| case.documents.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document(optional: Vec<(Tag, String)>) -> Document {
        let name: Arc<str> = Arc::from("Ada");

        Document {
            document_id: "d-1".to_owned(),
            created_by: "ada@example.org".to_owned(),
            created_at: Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap(),
            first_name: name.clone(),
            last_name: Arc::from("Lovelace"),
            illness_case_id: Arc::from("c-1"),
            tenant_id: Arc::from("t-1"),
            published_at: Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
            optional,
        }
    }

    #[test]
    fn keys_are_unique_and_complete() {
        let mut keys = Tag::CORE
            .iter()
            .chain(Tag::OPTIONAL.iter())
            .map(|tag| tag.key())
            .collect::<Vec<_>>();
        keys.sort_unstable();
        keys.dedup();

        assert_eq!(keys.len(), ATTRIBUTE_COUNT);
        assert!(Tag::CORE.iter().all(|tag| tag.is_core()));
        assert!(!Tag::OPTIONAL.iter().any(|tag| tag.is_core()));
    }

    #[test]
    fn tags_list_core_before_optional() {
        let doc = document(vec![(Tag::City, "Leipzig".to_owned())]);
        let tags = doc.tags().collect::<Vec<_>>();

        assert_eq!(tags.len(), 6);
        assert_eq!(tags[0], (Tag::FirstName, Cow::Borrowed("Ada")));
        assert_eq!(tags[4].1, "2024-02-03T04:05:06.000Z");
        assert_eq!(tags[5], (Tag::City, Cow::Borrowed("Leipzig")));
        assert_eq!(doc.tag(Tag::Notes), None);
    }
}
