use sqlweave::semantic::refs;
use sqlweave::semantic::sanitize::{is_legal_identifier, NameSanitizer};

#[test]
fn test_relation_condition_components() {
    let components = refs::extract_components("${ref(orders).user_id} = ${ref(users).id}");
    assert_eq!(
        components,
        vec![
            ("orders".to_string(), Some("user_id".to_string())),
            ("users".to_string(), Some("id".to_string())),
        ]
    );
}

#[test]
fn test_replace_to_cte_aliases_leaves_no_tokens() {
    let sanitizer = NameSanitizer::new();
    let text = "${ref(order items).order_id}=${ref('orders').id} AND ${ ref( \"users\" ) }.active";

    let rewritten = refs::replace_refs(text, |entity, path| {
        let alias = sanitizer.cte_alias(entity);
        match path {
            Some(p) => format!("{}.{}", alias, p),
            None => alias,
        }
    });

    assert!(!refs::has_pattern(&rewritten));
    assert!(refs::extract_components(&rewritten).is_empty());
    assert!(rewritten.contains("=orders_cte.id AND users_cte.active"));

    let items_alias = rewritten.split('.').next().unwrap_or_default();
    assert!(is_legal_identifier(items_alias), "{items_alias}");
    assert!(items_alias.ends_with("_cte"));
}

#[test]
fn test_entity_counts_ignore_repeats() {
    let text = "${ref(orders).a} + ${ref(orders).b} - ${ref(users)}";
    assert_eq!(refs::count_unique_entities(text), 2);
    let names: Vec<String> = refs::extract_entity_names(text).into_iter().collect();
    assert_eq!(names, vec!["orders", "users"]);
}

#[test]
fn test_syntax_errors_name_the_fragment() {
    assert!(refs::validate_syntax("${ref(orders).id} = 1").is_ok());

    let err = refs::validate_syntax("${orders.id} = 1").unwrap_err();
    assert!(err.to_string().contains("${orders.id}"), "{err}");
}

#[test]
fn test_sanitizer_is_idempotent_across_names() {
    let sanitizer = NameSanitizer::new();
    for name in ["orders", "Order Items", "2024-sales", "ünïcode", "a.b"] {
        let once = sanitizer.sanitize(name);
        assert!(is_legal_identifier(&once), "{name} -> {once}");
        assert_eq!(sanitizer.sanitize(&once), once);
        assert_eq!(NameSanitizer::new().sanitize(name), once);
    }
}
