use sqlweave::model::{Project, Relation};
use sqlweave::semantic::{NameSanitizer, RelationGraph, SemanticError};
use sqlweave::sql::JoinType;

const PROJECT_YAML: &str = r#"
name: shop
models:
  - name: orders
    sql: SELECT * FROM orders_table
  - name: users
    sql: SELECT * FROM users_table
  - name: regions
    sql: SELECT * FROM regions_table
  - name: products
    sql: SELECT * FROM products_table
  - name: audit
    sql: SELECT * FROM audit_log
relations:
  - name: orders_users
    condition: ${ref(orders).user_id} = ${ref(users).id}
    join_type: left
  - name: users_regions
    condition: ${ref(users).region_id} = ${ref(regions).id}
  - name: orders_products
    condition: ${ref(orders).product_id} = ${ref(products).id}
"#;

fn project() -> Project {
    Project::from_yaml_str(PROJECT_YAML).unwrap()
}

fn graph(project: &Project) -> RelationGraph {
    RelationGraph::new(project, &NameSanitizer::new(), None)
}

fn hops(steps: &[sqlweave::semantic::JoinStep]) -> Vec<(&str, &str, JoinType)> {
    steps
        .iter()
        .map(|s| (s.from.as_str(), s.to.as_str(), s.join_type))
        .collect()
}

#[test]
fn test_chain_path_flips_reverse_joins() {
    let project = project();
    let g = graph(&project);

    let path = g.find_join_path(&["regions", "products"]).unwrap();
    assert_eq!(
        hops(&path),
        vec![
            ("regions", "users", JoinType::Inner),
            ("users", "orders", JoinType::Right),
            ("orders", "products", JoinType::Inner),
        ]
    );
    assert_eq!(path[0].condition, "users_cte.region_id = regions_cte.id");
    assert_eq!(path[1].relation, "orders_users");
}

#[test]
fn test_plan_roots_at_requested_hub() {
    let project = project();
    let g = graph(&project);

    let plan = g.get_join_plan(&["regions", "products", "orders"]).unwrap();
    assert_eq!(plan.from_model, "orders");
    assert_eq!(plan.models(), vec!["orders", "users", "products", "regions"]);
    assert_eq!(plan.joins[0].join_type, JoinType::Left);

    let plan = g.join_plan_from("regions", &["products"]).unwrap();
    assert_eq!(plan.from_model, "regions");
    assert_eq!(plan.models(), vec!["regions", "users", "orders", "products"]);
}

#[test]
fn test_isolated_model_cannot_join() {
    let project = project();
    let g = graph(&project);

    let err = g.find_join_path(&["orders", "audit"]).unwrap_err();
    assert!(err.is_join_error());
    assert!(matches!(err, SemanticError::NoJoinPath { .. }));

    assert!(g.get_connected_models("audit").is_empty());
    let connected: Vec<String> = g.get_connected_models("regions").into_iter().collect();
    assert_eq!(connected, vec!["orders", "products", "users"]);
    assert_eq!(g.validate(), vec!["Model 'audit' has no relations".to_string()]);
}

#[test]
fn test_diamond_is_ambiguous_until_defaults_pick_a_side() {
    let diamond = |stores_default: bool| {
        let via_region = Relation::new("stores_regions", "${ref(stores).region_id} = ${ref(regions).id}");
        let via_orders = Relation::new("orders_stores", "${ref(orders).store_id} = ${ref(stores).id}");
        let (via_region, via_orders) = if stores_default {
            (via_region.as_default(), via_orders.as_default())
        } else {
            (via_region, via_orders)
        };
        project()
            .with_model(sqlweave::model::Model::new("stores", "SELECT * FROM stores_table"))
            .with_relation(via_region)
            .with_relation(via_orders)
    };

    let project = diamond(false);
    match graph(&project).find_join_path(&["regions", "orders"]) {
        Err(SemanticError::AmbiguousJoin { from, to, paths }) => {
            assert_eq!((from.as_str(), to.as_str()), ("regions", "orders"));
            assert_eq!(paths.len(), 2);
            assert!(paths.iter().all(|p| p.starts_with("regions -[")));
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    let project = diamond(true);
    let path = graph(&project).find_join_path(&["regions", "orders"]).unwrap();
    let relations: Vec<&str> = path.iter().map(|s| s.relation.as_str()).collect();
    assert_eq!(relations, vec!["stores_regions", "orders_stores"]);
    assert_eq!(path[1].condition, "orders_cte.store_id = stores_cte.id");
}

#[test]
fn test_unscoped_relation_is_skipped() {
    let project = project().with_relation(Relation::new("three_way", "${ref(orders).a} = ${ref(users).b} + ${ref(regions).c}"));
    let g = graph(&project);
    assert_eq!(g.relation_count(), 3);
    assert!(g.relations_between("orders", "regions").is_empty());
}
