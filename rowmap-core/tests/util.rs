#[cfg(test)]
mod tests {
    use rowmap_core::{char_prefix, truncate_long};

    #[test]
    fn short_sql_passes_through_untouched() {
        let sql = "SELECT 1".to_string();
        assert_eq!(format!("{}", truncate_long!(sql)), "SELECT 1");
    }

    #[test]
    fn long_sql_is_truncated_with_ellipsis() {
        let sql = "x".repeat(600);
        let text = format!("{}", truncate_long!(sql));
        assert_eq!(text.len(), 500);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn truncation_backs_off_to_a_char_boundary() {
        // 496 ASCII bytes, then a two-byte char straddling the cut point.
        let mut sql = "SELECT '".to_string();
        sql.push_str(&"x".repeat(488));
        sql.push('é');
        sql.push_str("' FROM t");
        assert!(!sql.is_char_boundary(497));

        let text = format!("{}", truncate_long!(sql));
        assert!(text.ends_with("..."));
        assert!(text.starts_with("SELECT 'xxx"));
    }

    #[test]
    fn char_prefix_never_splits_a_char() {
        let text = "héllo";
        assert_eq!(char_prefix(text, 1), "h");
        assert_eq!(char_prefix(text, 2), "h");
        assert_eq!(char_prefix(text, 3), "hé");
        assert_eq!(char_prefix(text, 100), "héllo");
    }
}
