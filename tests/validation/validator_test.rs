use sqlweave::model::{Project, TokenizedTrace};
use sqlweave::validation::{self, AccessorValidator, MetricValidator, ValidationError, ValidationResult};
use sqlweave::Dialect;

#[test]
fn test_aggregate_expressions() {
    let v = MetricValidator::new(Dialect::DuckDb);

    let naked = v.validate_aggregate_expression("amount");
    assert!(!naked.is_valid);
    let message = naked.error.unwrap();
    assert!(message.contains("column") || message.contains("aggregate"), "{message}");

    assert_eq!(v.validate_aggregate_expression("SUM(amount)"), ValidationResult::ok());
    assert!(v.validate_aggregate_expression("SUM(amount) / COUNT(*)").is_valid);
    assert!(v.validate_aggregate_expression("SUM(${ref(orders).amount})").is_valid);
    assert!(!v.validate_aggregate_expression("SUM(amount) + tax").is_valid);
    assert!(!v.validate_aggregate_expression("42").is_valid);
    assert!(!v.validate_aggregate_expression("   ").is_valid);
}

#[test]
fn test_dimension_expressions() {
    let v = MetricValidator::new(Dialect::Postgres);

    let aggregated = v.validate_dimension_expression("SUM(amount)");
    assert!(!aggregated.is_valid);
    assert!(aggregated.error.unwrap().contains("aggregate"));

    assert!(v.validate_dimension_expression("DATE_TRUNC('month', created_at)").is_valid);
    assert!(v.validate_dimension_expression("${ref(orders).region} || '-' || country").is_valid);
    assert!(!v.validate_dimension_expression("CASE WHEN").is_valid);
}

#[test]
fn test_join_conditions() {
    let v = MetricValidator::default();

    assert!(v
        .validate_join_condition("${ref(orders).user_id} = ${ref(users).id}", "orders", "users")
        .is_valid);

    let one_sided = v.validate_join_condition("${ref(orders).user_id} = 5", "orders", "users");
    assert!(one_sided.error.unwrap().contains("'users'"));

    let aggregated = v.validate_join_condition(
        "SUM(${ref(orders).amount}) = ${ref(users).id}",
        "orders",
        "users",
    );
    assert!(aggregated.error.unwrap().contains("aggregate"));

    assert!(!v.validate_join_condition("", "orders", "users").is_valid);
}

const PROJECT_YAML: &str = r#"
name: shop
inputs:
  - name: region
    type: single
  - name: countries
    type: multi
models:
  - name: orders
    sql: SELECT * FROM orders_table WHERE region = ${region.value}
    dimensions:
      - name: order_month
        expression: DATE_TRUNC('month', created_at)
    metrics:
      - name: revenue
        expression: SUM(amount)
  - name: users
    sql: SELECT * FROM users_table WHERE country IN (${countries.values})
    metrics:
      - name: user_count
        expression: COUNT(DISTINCT id)
metrics:
  - name: revenue_per_user
    expression: ${ref(orders).revenue} / ${ref(users).user_count}
relations:
  - name: orders_users
    condition: ${ref(orders).user_id} = ${ref(users).id}
"#;

#[test]
fn test_valid_yaml_project() {
    let project = Project::from_yaml_str(PROJECT_YAML).unwrap();
    assert_eq!(validation::validate(&project, Dialect::DuckDb), Ok(()));
}

#[test]
fn test_project_errors_are_batched() {
    let yaml = PROJECT_YAML
        .replace("expression: COUNT(DISTINCT id)", "expression: id")
        .replace("${countries.values}", "${countries.value}");
    let project = Project::from_yaml_str(&yaml).unwrap();

    let errors = validation::validate(&project, Dialect::DuckDb).unwrap_err();
    let metric_errors: Vec<&str> = errors
        .iter()
        .filter_map(|e| match e {
            ValidationError::InvalidMetric { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert!(metric_errors.contains(&"users.user_count"));
    assert!(metric_errors.contains(&"revenue_per_user"));

    let accessor = errors
        .iter()
        .find(|e| matches!(e, ValidationError::InvalidAccessor { .. }))
        .unwrap()
        .to_string();
    assert!(accessor.starts_with("Model 'users': "));
    assert!(accessor.contains("multi-select"));
}

#[test]
fn test_trace_accessors() {
    let project = Project::from_yaml_str(PROJECT_YAML).unwrap();
    let accessors = AccessorValidator::new(&project);

    let trace = TokenizedTrace::new("SELECT 1")
        .select("region", "region")
        .filter("region = ${region.value}")
        .filter("country IN (${countries.values})");
    assert!(accessors.validate_trace(&trace).is_valid);

    let trace = trace.order("${region.values}");
    let result = accessors.validate_trace(&trace);
    assert!(!result.is_valid);
    assert!(result.error.unwrap().ends_with("did you mean .value?"));

    let unknown = accessors.validate("${nowhere.value}");
    assert_eq!(unknown.error.as_deref(), Some("unknown input 'nowhere'"));
}
