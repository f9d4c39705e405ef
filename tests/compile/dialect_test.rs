use sqlweave::compile::{compile, CompileOptions};
use sqlweave::model::{Dimension, Model, Project, Relation, TokenizedTrace};
use sqlweave::sql::test_utils::validate_sql;
use sqlweave::Dialect;

const DIALECTS: [Dialect; 9] = [
    Dialect::DuckDb,
    Dialect::Postgres,
    Dialect::Snowflake,
    Dialect::BigQuery,
    Dialect::MySql,
    Dialect::Sqlite,
    Dialect::TSql,
    Dialect::Redshift,
    Dialect::Databricks,
];

fn project() -> Project {
    Project::new("shop")
        .with_model(
            Model::new("orders", "SELECT * FROM orders_table")
                .with_dimension(Dimension::column("amount", "decimal"))
                .with_dimension(Dimension::column("status", "string")),
        )
        .with_model(
            Model::new("users", "SELECT * FROM users_table")
                .with_dimension(Dimension::column("username", "string")),
        )
        .with_relation(Relation::new(
            "orders_users",
            "${ref(orders).user_id} = ${ref(users).id}",
        ))
}

fn trace() -> TokenizedTrace {
    TokenizedTrace::new("SELECT * FROM orders_table")
        .with_base_model("orders")
        .referencing("users")
        .select("username", "username")
        .select("total", "SUM(amount)")
        .vanilla_filter("status = 'paid'")
        .aggregate_filter("SUM(amount) > 100")
        .order("total DESC")
}

fn sql_for(dialect: Dialect) -> String {
    compile(&project(), &trace(), CompileOptions::default().with_dialect(dialect))
        .unwrap_or_else(|e| panic!("{dialect:?}: {e}"))
        .sql
}

#[test]
fn test_every_dialect_parses_back() {
    for dialect in DIALECTS {
        let sql = sql_for(dialect);
        if let Err(e) = validate_sql(&sql, dialect) {
            panic!("{e}");
        }
    }
}

#[test]
fn test_compact_output_parses_back() {
    for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::TSql] {
        let options = CompileOptions::default().with_dialect(dialect).with_pretty(false);
        let sql = compile(&project(), &trace(), options).unwrap().sql;
        assert!(!sql.contains('\n'));
        validate_sql(&sql, dialect).unwrap();
    }
}

#[test]
fn test_identifier_quoting_per_dialect() {
    let cases = [
        (Dialect::Postgres, "\"orders_cte\".\"user_id\" = \"users_cte\".\"id\""),
        (Dialect::MySql, "`orders_cte`.`user_id` = `users_cte`.`id`"),
        (Dialect::BigQuery, "`orders_cte`.`user_id` = `users_cte`.`id`"),
        (Dialect::TSql, "[orders_cte].[user_id] = [users_cte].[id]"),
        (Dialect::Snowflake, "\"orders_cte\".\"USER_ID\" = \"users_cte\".\"ID\""),
    ];
    for (dialect, condition) in cases {
        let sql = sql_for(dialect);
        let join = sql.lines().find(|l| l.starts_with("INNER JOIN")).unwrap();
        assert!(join.ends_with(condition), "{dialect:?}: {join}");
    }
}

#[test]
fn test_group_by_alias_support() {
    let postgres = sql_for(Dialect::Postgres);
    assert!(postgres.contains("GROUP BY \"username\", \"cohort_on\""));

    let tsql = sql_for(Dialect::TSql);
    let group_by = tsql.lines().find(|l| l.starts_with("GROUP BY")).unwrap();
    assert_eq!(group_by, "GROUP BY [users_cte].[username]");
}

#[test]
fn test_limit_rendering() {
    let limited = trace().with_limit(5);

    let postgres = compile(&project(), &limited, CompileOptions::default().with_dialect(Dialect::Postgres))
        .unwrap()
        .sql;
    assert!(postgres.ends_with("LIMIT 5"));
    validate_sql(&postgres, Dialect::Postgres).unwrap();

    let tsql = compile(&project(), &limited, CompileOptions::default().with_dialect(Dialect::TSql))
        .unwrap()
        .sql;
    assert!(tsql.contains("FETCH NEXT 5"));
    assert!(!tsql.contains("LIMIT"));
}

#[test]
fn test_function_names_follow_dialect() {
    let trace = TokenizedTrace::new("SELECT * FROM orders_table")
        .with_base_model("orders")
        .select("status", "IFNULL(status, 'none')");

    let postgres = compile(&project(), &trace, CompileOptions::default().with_dialect(Dialect::Postgres))
        .unwrap()
        .sql;
    assert!(postgres.contains("COALESCE(\"base_model\".\"status\", 'none')"));

    let snowflake = compile(&project(), &trace, CompileOptions::default().with_dialect(Dialect::Snowflake))
        .unwrap()
        .sql;
    assert!(snowflake.contains("NVL(\"base_model\".\"STATUS\", 'none')"));
}
