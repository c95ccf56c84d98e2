/// Separator used when no configuration overrides it.
pub const DEFAULT_SEPARATOR: &str = "/";

/// Joins up to three category levels into a single path.
///
/// Components are trimmed and empty ones are skipped, so a missing middle
/// level never produces a doubled separator.
pub fn build_category_path(levels: [Option<&str>; 3], separator: &str) -> String {
    levels
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_empty_middle_level() {
        let path = build_category_path([Some("Bútor"), Some(""), Some("Szék")], DEFAULT_SEPARATOR);
        assert_eq!(path, "Bútor/Szék");
    }

    #[test]
    fn trims_components_and_drops_trailing_gaps() {
        let path = build_category_path(
            [Some("  Természet "), Some(" Virágok"), None],
            DEFAULT_SEPARATOR,
        );
        assert_eq!(path, "Természet/Virágok");
    }

    #[test]
    fn all_empty_yields_empty_path() {
        assert_eq!(
            build_category_path([None, Some("  "), None], DEFAULT_SEPARATOR),
            ""
        );
    }

    #[test]
    fn honours_custom_separator() {
        assert_eq!(
            build_category_path([Some("A"), Some("B"), Some("C")], " > "),
            "A > B > C"
        );
    }
}
