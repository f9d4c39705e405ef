use sqlweave::model::{Dimension, Metric, Model, Project};
use sqlweave::semantic::{DimensionResolver, EntityGraph, MetricResolver, SemanticError};

fn project() -> Project {
    Project::new("shop")
        .with_model(
            Model::new("orders", "SELECT * FROM orders_table")
                .with_implicit_dimension(Dimension::column("x", "integer"))
                .with_dimension(Dimension::new("x", "x * 100"))
                .with_dimension(Dimension::new("region", "UPPER(region)"))
                .with_metric(Metric::new("base", "SUM(amount)"))
                .with_metric(Metric::new("derived", "${ref(base)} / COUNT(DISTINCT customer_id)")),
        )
        .with_model(
            Model::new("users", "SELECT * FROM users_table")
                .with_dimension(Dimension::new("country", "LOWER(country)"))
                .with_metric(Metric::new("user_count", "COUNT(DISTINCT id)")),
        )
        .with_metric(Metric::new(
            "revenue_per_user",
            "${ref(orders).base} / ${ref(users).user_count}",
        ))
}

#[test]
fn test_dimension_precedence() {
    let project = project();
    let resolver = DimensionResolver::new(&project);
    assert_eq!(resolver.resolve_expression("x", None).unwrap(), "x * 100");

    let project = project.with_dimension(Dimension::new("x", "'project'"));
    let resolver = DimensionResolver::new(&project);
    assert_eq!(resolver.resolve_expression("x", None).unwrap(), "'project'");
    assert_eq!(resolver.resolve_expression("orders.x", None).unwrap(), "x * 100");
}

#[test]
fn test_project_dimension_spans_models() {
    let project = project().with_dimension(Dimension::new(
        "place",
        "${ref(orders).region} || '-' || ${ref(users).country}",
    ));
    let resolver = DimensionResolver::new(&project);

    let (sql, models) = resolver.resolve_reference("${ref(place)}", None);
    assert_eq!(sql, "(UPPER(region)) || '-' || (LOWER(country))");
    assert_eq!(models.into_iter().collect::<Vec<_>>(), vec!["orders", "users"]);

    let (kept, none) = resolver.resolve_reference("${ref(nowhere)} + 1", None);
    assert_eq!(kept, "${ref(nowhere)} + 1");
    assert!(none.is_empty());
}

#[test]
fn test_metric_composition() {
    let project = project();
    let graph = EntityGraph::build(&project).unwrap();
    let resolver = MetricResolver::new(&project, &graph);

    assert_eq!(
        resolver.resolve_expression("derived").unwrap(),
        "(SUM(amount)) / COUNT(DISTINCT customer_id)"
    );
    assert_eq!(
        resolver.resolve_expression("revenue_per_user").unwrap(),
        "(SUM(amount)) / (COUNT(DISTINCT id))"
    );

    let (sql, models) = resolver.resolve_for_validation("revenue_per_user").unwrap();
    assert_eq!(sql, "(SUM(amount)) / (COUNT(DISTINCT id))");
    assert_eq!(models, vec!["orders", "users"]);
}

#[test]
fn test_metric_order_and_cycles() {
    let project = project();
    let graph = EntityGraph::build(&project).unwrap();
    let resolver = MetricResolver::new(&project, &graph);
    assert_eq!(resolver.detect_circular_dependencies(), None);

    let order = resolver.topological_sort().unwrap();
    let pos = |key: &str| order.iter().position(|k| k == key).unwrap();
    assert!(pos("orders.base") < pos("orders.derived"));
    assert!(pos("users.user_count") < pos("revenue_per_user"));

    let cyclic = Project::new("p")
        .with_metric(Metric::new("a", "${ref(b)}"))
        .with_metric(Metric::new("b", "${ref(a)}"));
    let graph = EntityGraph::build(&cyclic).unwrap();
    let resolver = MetricResolver::new(&cyclic, &graph);
    assert!(resolver.detect_circular_dependencies().is_some());
    assert!(matches!(
        resolver.topological_sort(),
        Err(SemanticError::CircularDependency(_))
    ));
}

#[test]
fn test_unknown_metric_lists_available() {
    let project = project();
    let graph = EntityGraph::build(&project).unwrap();
    let resolver = MetricResolver::new(&project, &graph);

    match resolver.resolve_for_validation("nope") {
        Err(SemanticError::MetricNotFound { name, available }) => {
            assert_eq!(name, "nope");
            assert!(available.contains(&"orders.base".to_string()));
        }
        other => panic!("expected MetricNotFound, got {other:?}"),
    }
}
