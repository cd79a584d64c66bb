//! Field getters for GitHub REST payloads
//!
//! Each getter reads one value out of a raw payload; absent values become `null`.

use crate::schema::FieldSpec;
use serde_json::Value;

fn pick(raw: &Value, pointer: &str) -> Value {
    raw.pointer(pointer).cloned().unwrap_or(Value::Null)
}

/// Collects `key` from every object in the array at `pointer`
fn pluck(raw: &Value, pointer: &str, key: &str) -> Value {
    let values = raw
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .map(|e| e.get(key).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .unwrap_or_default();
    Value::Array(values)
}

fn count(raw: &Value, pointer: &str) -> Value {
    let n = raw
        .pointer(pointer)
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    Value::from(n)
}

pub(crate) fn issue_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("body", |raw| pick(raw, "/body")),
        FieldSpec::new("closed_at", |raw| pick(raw, "/closed_at")),
        FieldSpec::new("created_at", |raw| pick(raw, "/created_at")),
        FieldSpec::new("labels", |raw| pluck(raw, "/labels", "name")),
        FieldSpec::new("locked", |raw| pick(raw, "/locked")),
        FieldSpec::new("num_comments", |raw| pick(raw, "/comments")),
        FieldSpec::new("state", |raw| pick(raw, "/state")),
        FieldSpec::new("title", |raw| pick(raw, "/title")),
        FieldSpec::new("updated_at", |raw| pick(raw, "/updated_at")),
        FieldSpec::new("userid", |raw| pick(raw, "/user/id")),
        FieldSpec::new("userlogin", |raw| pick(raw, "/user/login")),
    ]
}

pub(crate) fn pr_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("additions", |raw| pick(raw, "/additions")),
        FieldSpec::new("body", |raw| pick(raw, "/body")),
        FieldSpec::new("changed_files", |raw| pick(raw, "/changed_files")),
        FieldSpec::new("closed_at", |raw| pick(raw, "/closed_at")),
        FieldSpec::new("created_at", |raw| pick(raw, "/created_at")),
        FieldSpec::new("deletions", |raw| pick(raw, "/deletions")),
        FieldSpec::new("merged", |raw| pick(raw, "/merged")),
        FieldSpec::new("merged_at", |raw| pick(raw, "/merged_at")),
        FieldSpec::new("num_commits", |raw| pick(raw, "/commits")),
        FieldSpec::new("num_review_comments", |raw| pick(raw, "/review_comments")),
        FieldSpec::new("title", |raw| pick(raw, "/title")),
        FieldSpec::new("userid", |raw| pick(raw, "/user/id")),
        FieldSpec::new("userlogin", |raw| pick(raw, "/user/login")),
    ]
}

pub(crate) fn commit_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("additions", |raw| pick(raw, "/stats/additions")),
        FieldSpec::new("author_email", |raw| pick(raw, "/commit/author/email")),
        FieldSpec::new("author_name", |raw| pick(raw, "/commit/author/name")),
        FieldSpec::new("committer", |raw| pick(raw, "/commit/committer/name")),
        FieldSpec::new("date", |raw| pick(raw, "/commit/author/date")),
        FieldSpec::new("deletions", |raw| pick(raw, "/stats/deletions")),
        FieldSpec::new("file_count", |raw| count(raw, "/files")),
        FieldSpec::new("files", |raw| pluck(raw, "/files", "filename")),
        FieldSpec::new("message", |raw| pick(raw, "/commit/message")),
        FieldSpec::new("patches", |raw| pluck(raw, "/files", "patch")),
        FieldSpec::new("sha", |raw| pick(raw, "/sha")),
    ]
}

pub(crate) fn comment_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("body", |raw| pick(raw, "/body")),
        FieldSpec::new("created_at", |raw| pick(raw, "/created_at")),
        FieldSpec::new("id", |raw| pick(raw, "/id")),
        FieldSpec::new("updated_at", |raw| pick(raw, "/updated_at")),
        FieldSpec::new("userid", |raw| pick(raw, "/user/id")),
        FieldSpec::new("userlogin", |raw| pick(raw, "/user/login")),
    ]
}
