//! Row-per-tag layout: a `documents` table plus one `document_tags` row per attribute.

use super::{batched::Statement, util, ConnectionError};
use crate::dataset::{Document, ATTRIBUTE_COUNT};
use rusqlite::{params, types::Value, Connection};

const DOCUMENT_COLUMNS: [&str; 3] = ["document_id", "created_by", "created_at"];
const TAG_COLUMNS: [&str; 3] = ["document_id", "key", "value"];

/// a document expands into at most one tag row per attribute
pub const COLUMNS_PER_ROW: usize = TAG_COLUMNS.len() * ATTRIBUTE_COUNT;

const SCHEMA: [&str; 2] = [
    "create table documents (
    document_id text primary key,
    created_by text not null,
    created_at integer not null
)",
    "create table document_tags (
    id integer primary key,
    document_id text not null references documents (document_id) on delete cascade,
    key text not null,
    value text not null
)",
];

const INDEXES: [&str; 4] = [
    "create index idx_document_tags_document_id on document_tags (document_id)",
    "create index idx_document_tags_key on document_tags (key)",
    "create index idx_document_tags_value on document_tags (value)",
    "create index idx_document_tags_key_value on document_tags (key, value)",
];

pub const CLEANUP: [&str; 2] = [
    "drop table if exists document_tags",
    "drop table if exists documents",
];

pub fn setup(connection: &Connection, indexed: bool) -> Result<(), ConnectionError> {
    util::apply_schema(connection, &SCHEMA)?;

    if indexed {
        util::apply_schema(connection, &INDEXES)?;
    }

    Ok(())
}

/// documents first, then their tags, so the foreign key holds inside the batch
pub fn encode(batch: &[&Document]) -> Result<Vec<Statement>, ConnectionError> {
    let mut documents = Vec::with_capacity(batch.len() * DOCUMENT_COLUMNS.len());
    let mut tags = Vec::with_capacity(batch.len() * TAG_COLUMNS.len() * 8);

    for doc in batch {
        documents.push(Value::Text(doc.document_id.clone()));
        documents.push(Value::Text(doc.created_by.clone()));
        documents.push(Value::Integer(util::epoch_millis(&doc.created_at)));

        for (tag, value) in doc.tags() {
            tags.push(Value::Text(doc.document_id.clone()));
            tags.push(Value::Text(tag.key().to_owned()));
            tags.push(Value::Text(value.into_owned()));
        }
    }

    Ok(vec![
        Statement::insert("documents", &DOCUMENT_COLUMNS, documents),
        Statement::insert("document_tags", &TAG_COLUMNS, tags),
    ])
}

pub fn query1(connection: &Connection, first_name: &str) -> Result<Vec<String>, ConnectionError> {
    util::document_ids(
        connection,
        "select d.document_id, d.created_by, d.created_at, tag.value as firstname
         from documents d
         join document_tags tag on d.document_id = tag.document_id and tag.key = 'firstname'
         where tag.value = ?",
        params![first_name],
    )
}

pub fn query2(connection: &Connection, illness_case_id: &str) -> Result<Vec<String>, ConnectionError> {
    util::document_ids(
        connection,
        "select d.document_id, d.created_by, d.created_at, tag.value as illness_case_id
         from documents d
         join document_tags tag on d.document_id = tag.document_id and tag.key = 'illness_case_id'
         where tag.value = ?",
        params![illness_case_id],
    )
}

/// orders by the stored text, i.e., lexicographically
pub fn query3(connection: &Connection) -> Result<Vec<String>, ConnectionError> {
    util::document_ids(
        connection,
        "select d.document_id, d.created_by, d.created_at, tag.value as published_at
         from documents d
         join document_tags tag on d.document_id = tag.document_id and tag.key = 'published_at'
         order by tag.value asc
         limit 100",
        [],
    )
}
