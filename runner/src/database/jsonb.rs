//! Tag-bag layout: every attribute of a document in one JSON list of `{key, value}` pairs.
//!
//! SQLite has no generalized inverted index, the indexed form maintains one itself: an
//! insert trigger expands each tag list into `documents_tags_gin`, inside the same
//! transaction as the document.

use super::{batched::Statement, util, ConnectionError};
use crate::dataset::Document;
use rusqlite::{params, types::Value, Connection};
use serde::Serialize;

const DOCUMENT_COLUMNS: [&str; 4] = ["document_id", "created_by", "created_at", "tags"];

/// the whole tag list travels as one parameter
pub const COLUMNS_PER_ROW: usize = DOCUMENT_COLUMNS.len();

const SCHEMA: [&str; 1] = ["create table documents (
    document_id text primary key,
    created_by text not null,
    created_at integer not null,
    tags text not null
)"];

const INDEXES: [&str; 4] = [
    "create table documents_tags_gin (
    key text not null,
    value text not null,
    document_id text not null references documents (document_id) on delete cascade
)",
    "create index idx_documents_tags_gin on documents_tags_gin (key, value)",
    "create trigger documents_tags_gin_insert after insert on documents
begin
    insert into documents_tags_gin (key, value, document_id)
    select json_extract(tag.value, '$.key'), json_extract(tag.value, '$.value'), new.document_id
    from json_each(new.tags) as tag;
end",
    "create index idx_documents_created_at on documents (created_at)",
];

pub const CLEANUP: [&str; 2] = [
    "drop table if exists documents_tags_gin",
    "drop table if exists documents",
];

#[derive(Serialize)]
struct TagEntry<'a> {
    key: &'a str,
    value: &'a str,
}

pub fn setup(connection: &Connection, indexed: bool) -> Result<(), ConnectionError> {
    util::apply_schema(connection, &SCHEMA)?;

    if indexed {
        util::apply_schema(connection, &INDEXES)?;
    }

    Ok(())
}

pub fn encode(batch: &[&Document]) -> Result<Vec<Statement>, ConnectionError> {
    let mut documents = Vec::with_capacity(batch.len() * DOCUMENT_COLUMNS.len());

    for doc in batch {
        let tags = doc.tags().collect::<Vec<_>>();
        let entries = tags
            .iter()
            .map(|(tag, value)| TagEntry {
                key: tag.key(),
                value,
            })
            .collect::<Vec<_>>();

        documents.push(Value::Text(doc.document_id.clone()));
        documents.push(Value::Text(doc.created_by.clone()));
        documents.push(Value::Integer(util::epoch_millis(&doc.created_at)));
        documents.push(Value::Text(serde_json::to_string(&entries)?));
    }

    Ok(vec![Statement::insert("documents", &DOCUMENT_COLUMNS, documents)])
}

fn containment(connection: &Connection, indexed: bool, key: &str, value: &str) -> Result<Vec<String>, ConnectionError> {
    if indexed {
        util::document_ids(
            connection,
            "select d.document_id, d.created_by, d.created_at
             from documents d
             where d.document_id in (
                select gin.document_id from documents_tags_gin gin
                where gin.key = ?1 and gin.value = ?2
             )",
            params![key, value],
        )
    } else {
        util::document_ids(
            connection,
            "select d.document_id, d.created_by, d.created_at
             from documents d
             where exists (
                select 1 from json_each(d.tags) as tag
                where json_extract(tag.value, '$.key') = ?1
                  and json_extract(tag.value, '$.value') = ?2
             )",
            params![key, value],
        )
    }
}

pub fn query1(connection: &Connection, indexed: bool, first_name: &str) -> Result<Vec<String>, ConnectionError> {
    containment(connection, indexed, "firstname", first_name)
}

pub fn query2(
    connection: &Connection,
    indexed: bool,
    illness_case_id: &str,
) -> Result<Vec<String>, ConnectionError> {
    containment(connection, indexed, "illness_case_id", illness_case_id)
}

/// extracts the publication time text from every tag list and sorts lexicographically
pub fn query3(connection: &Connection) -> Result<Vec<String>, ConnectionError> {
    util::document_ids(
        connection,
        "select d.document_id, d.created_by, d.created_at,
                (select json_extract(tag.value, '$.value') from json_each(d.tags) as tag
                 where json_extract(tag.value, '$.key') = 'published_at' limit 1) as published_at
         from documents d
         order by published_at asc
         limit 100",
        [],
    )
}
