//! Filter query translation.
//!
//! Conferences live in the `data` JSONB column, so every predicate becomes an
//! expression over `data->>'<property>'`. Text comparisons use the `"C"`
//! collation to match the byte-wise ordering of the in-process evaluator.

use conference_core::filter::{ConferenceField, ConferenceQuery, FilterValue, Predicate};
use conference_core::store::SessionQuery;
use sqlx::{Postgres, QueryBuilder};

fn scalar(field: ConferenceField) -> String {
    if field.is_numeric() {
        format!("(data->>'{}')::bigint", field.property())
    } else {
        format!("(data->>'{}') COLLATE \"C\"", field.property())
    }
}

fn sort_expression(field: ConferenceField) -> String {
    if field.is_repeated() {
        format!(
            "(SELECT min(t.v COLLATE \"C\") FROM jsonb_array_elements_text(data->'{}') AS t(v))",
            field.property()
        )
    } else {
        scalar(field)
    }
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    let op = predicate.op.symbol();
    match (&predicate.value, predicate.field.is_numeric()) {
        (FilterValue::Int(value), true) => {
            builder.push(format!("{} {op} ", scalar(predicate.field)));
            builder.push_bind(*value);
        }
        (FilterValue::Text(value), false) if predicate.field.is_repeated() => {
            builder.push(format!(
                "EXISTS (SELECT 1 FROM jsonb_array_elements_text(data->'{}') AS t(v) \
                 WHERE t.v COLLATE \"C\" {op} ",
                predicate.field.property()
            ));
            builder.push_bind(value.clone());
            builder.push(")");
        }
        (FilterValue::Text(value), false) => {
            builder.push(format!("{} {op} ", scalar(predicate.field)));
            builder.push_bind(value.clone());
        }
        // An operand of the wrong type never matches.
        _ => {
            builder.push("FALSE");
        }
    }
}

/// `SELECT data FROM entities` restricted to conferences matching `query`, in
/// its sort order with the key as the final tie-breaker.
pub(crate) fn conference_query(query: &ConferenceQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT data FROM entities WHERE kind = 'Conference'");
    for predicate in query.predicates() {
        builder.push(" AND ");
        push_predicate(&mut builder, predicate);
    }

    let order: Vec<String> = query
        .order()
        .into_iter()
        .map(sort_expression)
        .chain(std::iter::once("key".to_string()))
        .collect();
    builder.push(" ORDER BY ");
    builder.push(order.join(", "));
    builder
}

/// `SELECT data FROM entities` restricted to sessions matching `query`,
/// ordered by name then key.
pub(crate) fn session_query(query: &SessionQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT data FROM entities WHERE kind = 'Session'");
    if let Some(conference) = &query.conference {
        builder.push(" AND parent_key = ");
        builder.push_bind(conference.to_urlsafe());
    }
    if let Some(speaker) = &query.speaker {
        builder.push(" AND data->>'speaker' = ");
        builder.push_bind(speaker.clone());
    }
    if let Some(kind) = &query.type_of_session {
        builder.push(" AND data->>'typeOfSession' = ");
        builder.push_bind(kind.clone());
    }
    if let Some(minutes) = query.duration {
        builder.push(" AND (data->>'duration')::integer = ");
        builder.push_bind(minutes);
    }
    if let Some(time) = query.start_time {
        builder.push(" AND (data->>'startTime')::time = ");
        builder.push_bind(time);
    }
    builder.push(" ORDER BY (data->>'name') COLLATE \"C\", key");
    builder
}
