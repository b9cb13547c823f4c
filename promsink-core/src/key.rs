/// Characters that are folded into `_` after the segments are joined.
const REPLACED: [char; 4] = [' ', '.', '-', '='];

/// Flatten a hierarchical metric name into a single identifier.
///
/// Segments are joined with `_`, then every space, `.`, `-` and `=` becomes
/// `_`. The mapping is not injective: `["a.b"]` and `["a", "b"]` both flatten
/// to `a_b` and are treated as the same metric.
pub fn flatten_key(parts: &[&str]) -> String {
    parts.join("_").replace(REPLACED, "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_segments_with_underscore() {
        assert_eq!(flatten_key(&["api", "requests", "total"]), "api_requests_total");
    }

    #[test]
    fn replaces_separator_characters() {
        assert_eq!(flatten_key(&["a.b", "c d", "e-f=g"]), "a_b_c_d_e_f_g");
    }

    #[test]
    fn single_segment_is_unchanged_when_clean() {
        assert_eq!(flatten_key(&["queue_depth"]), "queue_depth");
    }

    #[test]
    fn empty_parts_flatten_to_empty_string() {
        assert_eq!(flatten_key(&[]), "");
    }

    #[test]
    fn other_punctuation_is_left_alone() {
        // Only the four documented characters are rewritten.
        assert_eq!(flatten_key(&["a/b", "c:d"]), "a/b_c:d");
    }

    #[test]
    fn distinct_names_can_collide() {
        assert_eq!(flatten_key(&["a.b"]), flatten_key(&["a", "b"]));
        assert_eq!(flatten_key(&["a-b"]), flatten_key(&["a b"]));
    }

    #[test]
    fn flattening_is_deterministic() {
        let parts = ["svc.v2", "latency ms"];
        assert_eq!(flatten_key(&parts), flatten_key(&parts));
    }
}
