//! tests/message_resolver_tests.rs

#[cfg(test)]
mod tests {
    use crate::models::recipient_model::Recipient;
    use crate::services::message_resolver::resolve;

    #[test]
    fn test_row_message_wins_over_template() {
        let r = Recipient::test_new("905551112233", "Ana", "Hi {name}");
        assert_eq!(resolve(&r, "T {name}", Some("")), "Hi Ana");
    }

    #[test]
    fn test_template_when_row_message_empty() {
        let r = Recipient::test_new("905551112233", "Ana", "");
        assert_eq!(resolve(&r, "T {name}", Some("")), "T Ana");
        assert_eq!(resolve(&r, "T {name}", None), "T Ana");
    }

    #[test]
    fn test_override_wins_over_everything() {
        let r = Recipient::test_new("905551112233", "Ana", "X");
        assert_eq!(resolve(&r, "T {name}", Some("Override {name}")), "Override Ana");
    }

    #[test]
    fn test_blank_override_and_row_fall_back() {
        let r = Recipient::test_new("905551112233", "Ana", "   ");
        assert_eq!(resolve(&r, "T {name}", Some("  \n")), "T Ana");
    }

    #[test]
    fn test_empty_name_collapses_placeholder() {
        let r = Recipient::test_new("905554445566", "", "Custom {name} text");
        assert_eq!(resolve(&r, "Hi {name}!", None), "Custom  text");

        let r = Recipient::test_new("905554445566", "", "");
        assert_eq!(resolve(&r, "{name} hola", None), "hola");
    }

    #[test]
    fn test_is_deterministic_and_keeps_other_braces() {
        let r = Recipient::test_new("905551112233", "Ana", "");
        let a = resolve(&r, "Hola {name}, tu código es {code} {name}", None);
        let b = resolve(&r, "Hola {name}, tu código es {code} {name}", None);
        assert_eq!(a, b);
        assert_eq!(a, "Hola Ana, tu código es {code} Ana");
    }
}
