//! B-LOC / I-LOC span reconstruction

use crate::vocab::Tag;

/// Rebuild location spans from tokens and their predicted tags.
///
/// Single left-to-right pass. B-LOC closes any open span and opens a new
/// one; I-LOC extends the open span, or opens one when none is open; any
/// other tag closes the open span. Spans are joined with single spaces.
/// Iteration stops at the shorter of the two inputs.
pub fn reconstruct_spans<S: AsRef<str>>(tokens: &[S], tags: &[Tag]) -> Vec<String> {
    let mut spans = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (token, tag) in tokens.iter().zip(tags) {
        match tag {
            Tag::BeginLocation => {
                close_span(&mut current, &mut spans);
                current.push(token.as_ref());
            }
            // an I-LOC with nothing open starts a span rather than being dropped
            Tag::InsideLocation => current.push(token.as_ref()),
            Tag::Outside | Tag::Other => close_span(&mut current, &mut spans),
        }
    }
    close_span(&mut current, &mut spans);

    spans
}

fn close_span(current: &mut Vec<&str>, spans: &mut Vec<String>) {
    if !current.is_empty() {
        spans.push(current.join(" "));
        current.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::Tag::{BeginLocation as B, InsideLocation as I, Other, Outside as O};

    #[test]
    fn test_begin_inside_merge() {
        let tokens = ["flights", "to", "New", "York", "City"];
        assert_eq!(reconstruct_spans(&tokens, &[O, O, B, I, I]), vec!["New York City"]);
    }

    #[test]
    fn test_orphan_inside_starts_span() {
        let tokens = ["Lagos", "is", "big"];
        assert_eq!(reconstruct_spans(&tokens, &[I, O, O]), vec!["Lagos"]);
    }

    #[test]
    fn test_consecutive_begins_split() {
        let tokens = ["Paris", "London", "Rome"];
        assert_eq!(
            reconstruct_spans(&tokens, &[B, B, I]),
            vec!["Paris", "London Rome"]
        );
    }

    #[test]
    fn test_outside_between_locations_closes_span() {
        let tokens = ["I", "visited", "London", "and", "Paris"];
        assert_eq!(
            reconstruct_spans(&tokens, &[O, O, B, O, I]),
            vec!["London", "Paris"]
        );
    }

    #[test]
    fn test_other_label_closes_span_and_trailing_span_kept() {
        let tokens = ["Kyoto", "<pad>", "Mount", "Fuji"];
        assert_eq!(
            reconstruct_spans(&tokens, &[B, Other, B, I]),
            vec!["Kyoto", "Mount Fuji"]
        );
    }

    #[test]
    fn test_shorter_tag_list_stops_early() {
        let tokens = ["Cairo", "and", "Giza"];
        assert_eq!(reconstruct_spans(&tokens, &[B]), vec!["Cairo"]);
        assert!(reconstruct_spans::<&str>(&[], &[]).is_empty());
    }
}
