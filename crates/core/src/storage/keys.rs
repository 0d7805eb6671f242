//! Object store key layout.
//!
//! Everything an extension stores lives under its own id:
//! `{extension}/files/{path}` for user files and
//! `{extension}/graphs/{graph}` for install markers.

/// Key for a user file stored by an extension.
pub fn file_key(extension: &str, path: &str) -> String {
    format!("{extension}/files/{path}")
}

/// Key for the marker recording that a graph installed an extension.
pub fn graph_key(extension: &str, graph: &str) -> String {
    format!("{extension}/graphs/{graph}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_keys_nest_under_the_extension() {
        assert_eq!(
            file_key("google-calendar", "icons/logo.svg"),
            "google-calendar/files/icons/logo.svg"
        );
    }

    #[test]
    fn graph_keys_nest_under_the_extension() {
        assert_eq!(
            graph_key("google-calendar", "my-graph"),
            "google-calendar/graphs/my-graph"
        );
    }

    #[test]
    fn empty_segments_are_preserved() {
        assert_eq!(file_key("", ""), "/files/");
    }
}
