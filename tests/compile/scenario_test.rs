use sqlweave::compile::{compile, CompileContext, CompileOptions};
use sqlweave::config::Settings;
use sqlweave::model::{Dimension, Model, Project, Relation, TokenizedTrace};
use sqlweave::{Dialect, SemanticError};

fn shop() -> Project {
    Project::new("shop")
        .with_model(Model::new("orders", "SELECT * FROM orders_table"))
        .with_model(Model::new("users", "SELECT * FROM users_table"))
        .with_relation(Relation::new(
            "orders_users",
            "${ref(orders).user_id} = ${ref(users).id}",
        ))
}

fn order_totals() -> TokenizedTrace {
    TokenizedTrace::new("SELECT * FROM orders_table")
        .with_base_model("orders")
        .referencing("users")
        .select("order_id", "order_id")
        .select("username", "username")
        .select("total", "SUM(amount)")
}

fn line<'s>(sql: &'s str, keyword: &str) -> &'s str {
    sql.lines()
        .find(|l| l.starts_with(keyword))
        .unwrap_or_else(|| panic!("no {keyword} clause in:\n{sql}"))
}

#[test]
fn test_orders_users_scenario() {
    let output = compile(&shop(), &order_totals(), CompileOptions::default()).unwrap();
    let sql = output.sql.replace('"', "");

    assert!(sql.starts_with("WITH orders_cte AS (\n  SELECT * FROM orders_table\n)"));
    assert!(sql.contains("users_cte AS (\n  SELECT * FROM users_table\n)"));
    assert_eq!(sql.matches("JOIN").count(), 1);
    assert_eq!(
        line(&sql, "INNER JOIN"),
        "INNER JOIN users_cte ON orders_cte.user_id = users_cte.id"
    );
    assert_eq!(line(&sql, "FROM"), "FROM orders_cte");
    assert_eq!(line(&sql, "GROUP BY"), "GROUP BY order_id, username, cohort_on");
    assert_eq!(output.models, vec!["orders", "users"]);
}

#[test]
fn test_filters_routed_across_joined_models() {
    let trace = order_totals()
        .filter("amount > 100")
        .filter("SUM(amount) > 1000")
        .order("total DESC")
        .with_limit(20);
    let sql = compile(&shop(), &trace, CompileOptions::default()).unwrap().sql;

    let where_clause = line(&sql, "WHERE");
    assert!(where_clause.contains("\"amount\" > 100"));
    assert!(!where_clause.contains("SUM"));

    let having = line(&sql, "HAVING");
    assert!(having.contains("SUM(\"amount\") > 1000"));
    assert!(!having.contains("> 100 "));

    assert_eq!(line(&sql, "ORDER BY"), "ORDER BY \"total\" DESC");
    assert!(sql.ends_with("LIMIT 20"));
}

#[test]
fn test_compiles_identically_twice() {
    let project = shop();
    let trace = order_totals().filter("amount > 100").order("username");
    let context = CompileContext::new(&project, CompileOptions::default()).unwrap();

    let first = context.compile(&trace).unwrap().sql;
    let second = context.compile(&trace).unwrap().sql;
    let fresh = compile(&project, &trace, CompileOptions::default()).unwrap().sql;
    assert_eq!(first, second);
    assert_eq!(first, fresh);
}

#[test]
fn test_project_dimension_spans_joined_models() {
    let project = Project::new("shop")
        .with_model(
            Model::new("orders", "SELECT * FROM orders_table")
                .with_dimension(Dimension::column("region", "string"))
                .with_dimension(Dimension::column("amount", "decimal")),
        )
        .with_model(
            Model::new("users", "SELECT * FROM users_table")
                .with_dimension(Dimension::column("username", "string")),
        )
        .with_relation(Relation::new(
            "orders_users",
            "${ref(orders).user_id} = ${ref(users).id}",
        ))
        .with_dimension(Dimension::new(
            "place",
            "${ref(orders).region} || '-' || ${ref(users).username}",
        ));

    let trace = TokenizedTrace::new("SELECT * FROM orders_table")
        .with_base_model("orders")
        .referencing("users")
        .select("place", "${ref(place)}")
        .select("total", "SUM(amount)");
    let sql = compile(&project, &trace, CompileOptions::default()).unwrap().sql;

    let place = sql.lines().find(|l| l.contains("AS \"place\"")).unwrap();
    assert!(place.contains("\"orders_cte\".\"region\""));
    assert!(place.contains("\"users_cte\".\"username\""));
    assert!(sql.contains("SUM(\"orders_cte\".\"amount\") AS \"total\""));
    assert_eq!(line(&sql, "GROUP BY"), "GROUP BY \"place\", \"cohort_on\"");
}

#[test]
fn test_trace_without_base_model_cannot_join() {
    let trace = TokenizedTrace::new("SELECT * FROM orders_table")
        .referencing("users")
        .select("username", "username");
    assert!(matches!(
        compile(&shop(), &trace, CompileOptions::default()),
        Err(SemanticError::InvalidQuery(_))
    ));
}

const PROJECT_YAML: &str = r#"
name: shop
models:
  - name: orders
    sql: SELECT * FROM orders_table
    metrics:
      - name: revenue
        expression: SUM(amount)
  - name: users
    sql: SELECT * FROM users_table
relations:
  - name: orders_users
    condition: ${ref(orders).user_id} = ${ref(users).id}
    join_type: left
"#;

const TRACE_JSON: &str = r#"{
  "base_model": "orders",
  "referenced_models": ["users"],
  "select_items": {
    "revenue": "${ref(orders).revenue}",
    "users.username": "username"
  },
  "filter_by": {
    "vanilla": ["status = 'paid'"],
    "aggregate": ["${ref(revenue)} > 10"]
  },
  "order_by": ["revenue desc"]
}"#;

#[test]
fn test_yaml_project_and_json_trace() {
    let project = Project::from_yaml_str(PROJECT_YAML).unwrap();
    let trace: TokenizedTrace = serde_json::from_str(TRACE_JSON).unwrap();
    assert_eq!(trace.cohort_on, "'values'");

    let settings: Settings = "[compile]\ndialect = \"postgres\"".parse().unwrap();
    let options = CompileOptions::from_settings(&settings.compile).unwrap();
    let output = compile(&project, &trace, options).unwrap();
    assert_eq!(output.dialect, Dialect::Postgres);

    let sql = output.sql;
    assert!(sql.contains("SELECT * FROM orders_table"), "base SQL comes from the model:\n{sql}");
    assert_eq!(
        line(&sql, "LEFT JOIN"),
        "LEFT JOIN \"users_cte\" ON \"orders_cte\".\"user_id\" = \"users_cte\".\"id\""
    );
    assert!(sql.contains("(SUM(\"orders_cte\".\"amount\")) AS \"revenue\""));
    assert!(sql.contains("AS \"users|username\""));
    assert!(line(&sql, "WHERE").contains("\"status\" = 'paid'"));
    assert!(line(&sql, "HAVING").contains("(SUM(\"orders_cte\".\"amount\")) > 10"));
    assert_eq!(line(&sql, "GROUP BY"), "GROUP BY \"users|username\", \"cohort_on\"");
    assert_eq!(line(&sql, "ORDER BY"), "ORDER BY \"revenue\" DESC");
}

#[test]
fn test_unjoinable_trace_names_models() {
    let project = shop().with_model(Model::new("audit", "SELECT * FROM audit_log"));
    let trace = order_totals().referencing("audit");

    let err = compile(&project, &trace, CompileOptions::default()).unwrap_err();
    assert!(err.is_join_error());
    assert!(err.to_string().contains("orders"));
    assert!(err.to_string().contains("audit"));
}
