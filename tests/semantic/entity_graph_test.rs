use sqlweave::model::Project;
use sqlweave::semantic::{EntityGraph, EntityKind, SemanticError};

const PROJECT_YAML: &str = r#"
name: shop
sources:
  - name: warehouse
    type: duckdb
models:
  - name: orders
    sql: SELECT * FROM orders_table
    source: ${ref(warehouse)}
    metrics:
      - name: revenue
        expression: SUM(amount)
      - name: avg_revenue
        expression: ${ref(revenue)} / COUNT(*)
  - name: users
    sql: SELECT * FROM users_table
    source: ${ref(warehouse)}
relations:
  - name: orders_users
    condition: ${ref(orders).user_id} = ${ref(users).id}
traces:
  - name: revenue_by_user
    model: ${ref(orders)}
charts:
  - name: revenue_chart
    traces:
      - ${ref(revenue_by_user)}
dashboards:
  - name: overview
    charts:
      - ${ref(revenue_chart)}
"#;

fn graph() -> EntityGraph {
    let project = Project::from_yaml_str(PROJECT_YAML).unwrap();
    EntityGraph::build(&project).unwrap()
}

fn names_of(graph: &EntityGraph, kind: EntityKind) -> Vec<String> {
    let mut names: Vec<String> = graph
        .nodes_by_types(&[kind])
        .into_iter()
        .filter_map(|idx| graph.entity(idx))
        .map(|e| e.name.clone())
        .collect();
    names.sort();
    names
}

#[test]
fn test_yaml_project_graph() {
    let graph = graph();
    assert!(graph.validate().is_ok());

    assert_eq!(names_of(&graph, EntityKind::Model), vec!["orders", "users"]);
    assert_eq!(names_of(&graph, EntityKind::Metric), vec!["avg_revenue", "revenue"]);
    assert_eq!(names_of(&graph, EntityKind::Dashboard), vec!["overview"]);

    let roots = graph.root_nodes();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].kind, EntityKind::Project);

    let revenue = graph.indices_named("revenue")[0];
    assert_eq!(graph.owning_model(revenue), Some("orders"));
}

#[test]
fn test_dashboard_upstream_reaches_model() {
    let graph = graph();
    let parts = graph.filter_dag("overview+").unwrap();
    assert_eq!(parts.len(), 1);

    let labels = parts[0].labels();
    for name in ["overview", "revenue_chart", "revenue_by_user", "orders", "warehouse"] {
        assert!(labels.iter().any(|l| l == name), "{name} missing from {labels:?}");
    }
    assert!(!labels.iter().any(|l| l == "users"));
}

#[test]
fn test_unknown_reference_names_parent() {
    let yaml = PROJECT_YAML.replace("${ref(revenue_by_user)}", "${ref(missing_trace)}");
    let project = Project::from_yaml_str(&yaml).unwrap();

    match EntityGraph::build(&project) {
        Err(SemanticError::BadReference {
            parent,
            reference,
            matches,
        }) => {
            assert_eq!(parent, "revenue_chart");
            assert!(reference.contains("missing_trace"));
            assert_eq!(matches, 0);
        }
        other => panic!("expected a bad reference, got {other:?}"),
    }
}

#[test]
fn test_metric_cycle_fails_validation() {
    let yaml = PROJECT_YAML.replace("expression: SUM(amount)", "expression: ${ref(avg_revenue)} * 2");
    let project = Project::from_yaml_str(&yaml).unwrap();
    let graph = EntityGraph::build(&project).unwrap();

    let err = graph.validate().unwrap_err();
    assert!(matches!(err, SemanticError::CyclicGraph(_)));
    let message = err.to_string();
    assert!(message.contains("revenue -> avg_revenue") || message.contains("avg_revenue -> revenue"));
}

#[test]
fn test_field_lineage_across_models() {
    let mut graph = graph();
    for field in ["orders.user_id", "users.id", "revenue_by_user.user_id"] {
        graph.add_field_node(field, None);
    }
    assert!(graph.add_field_edge("users.id", "orders.user_id"));
    assert!(graph.add_field_edge("orders.user_id", "revenue_by_user.user_id"));

    let lineage = graph.field_lineage("orders.user_id");
    assert_eq!(lineage.upstream, vec!["users.id"]);
    assert_eq!(lineage.downstream, vec!["revenue_by_user.user_id"]);

    let impact: Vec<String> = graph.field_impact_analysis("users.id", None).into_iter().collect();
    assert_eq!(impact, vec!["orders.user_id", "revenue_by_user.user_id"]);

    assert_eq!(graph.root_nodes().len(), 1);
    assert_eq!(graph.named_subgraph().fields_for_object("orders"), Vec::<String>::new());
}
