//! Write directives submitted in bulk to a document store

use std::fmt;

use serde::Serialize;

use super::entry::Document;

/// Kind of a write directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteModelKind {
    Insert,
    Replace,
    Delete,
}

impl fmt::Display for WriteModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteModelKind::Insert => write!(f, "insertOne"),
            WriteModelKind::Replace => write!(f, "replaceOne"),
            WriteModelKind::Delete => write!(f, "deleteOne"),
        }
    }
}

/// One insert, replace or delete of a single document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum WriteModel {
    InsertOne { document: Document },
    ReplaceOne { filter: Document, replacement: Document },
    DeleteOne { filter: Document },
}

impl WriteModel {
    pub fn kind(&self) -> WriteModelKind {
        match self {
            WriteModel::InsertOne { .. } => WriteModelKind::Insert,
            WriteModel::ReplaceOne { .. } => WriteModelKind::Replace,
            WriteModel::DeleteOne { .. } => WriteModelKind::Delete,
        }
    }

    /// Match condition of replaces and deletes
    pub fn filter(&self) -> Option<&Document> {
        match self {
            WriteModel::InsertOne { .. } => None,
            WriteModel::ReplaceOne { filter, .. } | WriteModel::DeleteOne { filter } => {
                Some(filter)
            }
        }
    }
}
