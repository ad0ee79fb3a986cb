//! MERGE execution: match-or-create with ON CREATE SET / ON MATCH SET.

use super::context::QueryContext;
use super::{create_clause, match_clause, set_clause};
use crate::cypher::text::find_keyword_top_level;
use crate::eval::Bindings;
use crate::Result;

/// Execute one MERGE clause body against a single row, returning the
/// resulting rows (one per match, or one for the created pattern).
///
/// The body is `pattern [ON CREATE SET items] [ON MATCH SET items]`, in
/// either order.
pub fn execute(ctx: &mut QueryContext, row: &Bindings, body: &str) -> Result<Vec<Bindings>> {
    let (pattern_text, on_create, on_match) = split_merge_body(body);

    let matches = match_clause::solve_pattern_text(ctx, row, pattern_text)?;
    if !matches.is_empty() {
        // Apply ON MATCH SET to every matched binding
        let mut out = Vec::with_capacity(matches.len());
        for mut matched in matches {
            if let Some(assignments) = on_match {
                set_clause::apply_set(ctx, &mut matched, assignments)?;
            }
            out.push(matched);
        }
        return Ok(out);
    }

    // No match: create the pattern, then ON CREATE SET
    let mut created = row.clone();
    create_clause::execute(ctx, &mut created, pattern_text)?;
    if let Some(assignments) = on_create {
        set_clause::apply_set(ctx, &mut created, assignments)?;
    }
    Ok(vec![created])
}

/// Split a MERGE body into (pattern, ON CREATE SET items, ON MATCH SET
/// items).
fn split_merge_body(body: &str) -> (&str, Option<&str>, Option<&str>) {
    let on_create_at = find_keyword_top_level(body, "ON CREATE SET");
    let on_match_at = find_keyword_top_level(body, "ON MATCH SET");

    let pattern_end = [on_create_at, on_match_at]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(body.len());
    let pattern_text = body[..pattern_end].trim();

    let slice_after = |start: Option<usize>, keyword_len: usize| -> Option<&str> {
        let start = start?;
        let from = start + keyword_len;
        let end = [on_create_at, on_match_at]
            .into_iter()
            .flatten()
            .filter(|&other| other > start)
            .min()
            .unwrap_or(body.len());
        Some(body[from..end].trim())
    };

    (
        pattern_text,
        slice_after(on_create_at, "ON CREATE SET".len()),
        slice_after(on_match_at, "ON MATCH SET".len()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_merge_body() {
        let (pattern, on_create, on_match) = split_merge_body(
            "(n:Person {name: 'Ada'}) ON CREATE SET n.created = 1 ON MATCH SET n.seen = 2",
        );
        assert_eq!(pattern, "(n:Person {name: 'Ada'})");
        assert_eq!(on_create, Some("n.created = 1"));
        assert_eq!(on_match, Some("n.seen = 2"));
    }

    #[test]
    fn test_split_merge_body_reversed_order() {
        let (pattern, on_create, on_match) =
            split_merge_body("(n:X) ON MATCH SET n.a = 1 ON CREATE SET n.b = 2");
        assert_eq!(pattern, "(n:X)");
        assert_eq!(on_match, Some("n.a = 1"));
        assert_eq!(on_create, Some("n.b = 2"));
    }

    #[test]
    fn test_split_merge_body_plain() {
        let (pattern, on_create, on_match) = split_merge_body("(n:X {k: 1})");
        assert_eq!(pattern, "(n:X {k: 1})");
        assert_eq!(on_create, None);
        assert_eq!(on_match, None);
    }
}
