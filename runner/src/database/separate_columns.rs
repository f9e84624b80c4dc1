//! Wide layout: one nullable column per optional attribute, publication time stored as a
//! native integer so query3 orders temporally.

use super::{batched::Statement, util, ConnectionError};
use crate::dataset::{Document, Tag, ATTRIBUTE_COUNT};
use rusqlite::{params, types::Value, Connection};

const COLUMNS: [&str; 3 + ATTRIBUTE_COUNT] = [
    "document_id",
    "created_by",
    "created_at",
    "firstname",
    "lastname",
    "illness_case_id",
    "tenant_id",
    "published_at",
    "email",
    "phone_number",
    "address",
    "city",
    "country",
    "zip_code",
    "diagnosis",
    "severity",
    "status",
    "assigned_to",
    "department",
    "priority",
    "category",
    "subcategory",
    "notes",
];

pub const COLUMNS_PER_ROW: usize = COLUMNS.len();

const SCHEMA: [&str; 1] = ["create table documents (
    document_id text primary key,
    created_by text not null,
    created_at integer not null,
    firstname text not null,
    lastname text not null,
    illness_case_id text not null,
    tenant_id text not null,
    published_at integer not null,
    email text,
    phone_number text,
    address text,
    city text,
    country text,
    zip_code text,
    diagnosis text,
    severity text,
    status text,
    assigned_to text,
    department text,
    priority text,
    category text,
    subcategory text,
    notes text
)"];

const INDEXES: [&str; 3] = [
    "create index idx_documents_firstname on documents (firstname)",
    "create index idx_documents_illness_case_id on documents (illness_case_id)",
    "create index idx_documents_published_at on documents (published_at)",
];

pub const CLEANUP: [&str; 1] = ["drop table if exists documents"];

pub fn setup(connection: &Connection, indexed: bool) -> Result<(), ConnectionError> {
    util::apply_schema(connection, &SCHEMA)?;

    if indexed {
        util::apply_schema(connection, &INDEXES)?;
    }

    Ok(())
}

pub fn encode(batch: &[&Document]) -> Result<Vec<Statement>, ConnectionError> {
    let mut documents = Vec::with_capacity(batch.len() * COLUMNS.len());

    for doc in batch {
        documents.push(Value::Text(doc.document_id.clone()));
        documents.push(Value::Text(doc.created_by.clone()));
        documents.push(Value::Integer(util::epoch_millis(&doc.created_at)));
        documents.push(Value::Text(doc.first_name.to_string()));
        documents.push(Value::Text(doc.last_name.to_string()));
        documents.push(Value::Text(doc.illness_case_id.to_string()));
        documents.push(Value::Text(doc.tenant_id.to_string()));
        documents.push(Value::Integer(util::epoch_millis(&doc.published_at)));

        for tag in Tag::OPTIONAL {
            documents.push(
                doc.tag(tag)
                    .map_or(Value::Null, |value| Value::Text(value.into_owned())),
            );
        }
    }

    Ok(vec![Statement::insert("documents", &COLUMNS, documents)])
}

pub fn query1(connection: &Connection, first_name: &str) -> Result<Vec<String>, ConnectionError> {
    util::document_ids(
        connection,
        "select document_id from documents where firstname = ?",
        params![first_name],
    )
}

pub fn query2(connection: &Connection, illness_case_id: &str) -> Result<Vec<String>, ConnectionError> {
    util::document_ids(
        connection,
        "select document_id from documents where illness_case_id = ?",
        params![illness_case_id],
    )
}

pub fn query3(connection: &Connection) -> Result<Vec<String>, ConnectionError> {
    util::document_ids(
        connection,
        "select document_id from documents order by published_at asc limit 100",
        [],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_attribute_keys() {
        let keys = Tag::CORE
            .iter()
            .chain(Tag::OPTIONAL.iter())
            .map(|tag| tag.key())
            .collect::<Vec<_>>();

        assert_eq!(&COLUMNS[3..], keys.as_slice());
    }
}
