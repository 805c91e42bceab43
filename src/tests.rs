//! End to end tests: relational algebra text in, SQL out.

use std::collections::{BTreeSet, HashMap, HashSet};

use proptest::prelude::*;

use crate::{
    error::Error,
    lex::{Token, TokenKind, tokenize},
    parser::parse,
    to_sql::{MssqlPrinterContext, PrinterConfig},
    translate::{
        Query,
        columns::{ColumnSet, EmptyCatalog},
        transform,
    },
    translate as translate_text, translate_with,
};

fn catalog() -> HashMap<String, ColumnSet> {
    let columns = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
    HashMap::from([
        ("sales".to_string(), columns(&["ProductID", "Quantity", "SaleDate"])),
        ("products".to_string(), columns(&["ProductID", "Name"])),
        ("customers".to_string(), columns(&["CustomerID", "Name"])),
    ])
}

fn sql(text: &str) -> String {
    translate_text(text, &catalog())
        .unwrap_or_else(|e| panic!("translating {text:?}: {e}"))
        .sql_text()
        .to_string()
}

macro_rules! assert_sql {
    ($text:expr, $expected:expr) => {
        assert_eq!(sql($text), $expected, "translating {:?}", $text);
    };
}

#[test]
fn single_tables() {
    assert_sql!("sales", "select * from sales;");
    assert_sql!("(sales)", "select * from sales;");
    assert_sql!("((sales))", "select * from sales;");

    let query = translate_text("sales", &EmptyCatalog).expect("a valid translation");
    assert!(query.is_data_query());
}

#[test]
fn set_operations() {
    assert_sql!("(sales) ∪ (sales)", "select * from sales union select * from sales;");
    assert_sql!("(sales) − (sales)", "select * from sales except select * from sales;");
    assert_sql!("(sales) - (sales)", "select * from sales except select * from sales;");
    assert_sql!(
        "σ ProductID > 2 (sales) ∩ (sales)",
        r#"select * from sales where "ProductID">2 intersect select * from sales;"#
    );
    assert_sql!(
        "A ∪ B ∪ C",
        "select * from A union select * from B union select * from C;"
    );
    assert_sql!(
        "A − (B ∪ C)",
        "select * from A except (select * from B union select * from C);"
    );
}

#[test]
fn join_conditions_in_parentheses() {
    assert_sql!(
        "A ⧑ (a=1 or b=2) (B)",
        r#"select * from A left join B on "a"=1 or "b"=2;"#
    );
    assert_sql!(
        "(sales) ⧓ (sales.ProductID=products.ProductID) (products)",
        r#"select * from sales full join products on sales."ProductID"=products."ProductID";"#
    );
}

#[test]
fn nested_projection_and_selection() {
    assert_sql!(
        "π variety (σ petal_width>0.1 (π variety,petal_width (iris))) ⋈ (iris)",
        concat!(
            r#"select * from (select distinct "variety" from (select * from "#,
            r#"(select distinct "variety","petal_width" from iris) as q0 where q0."petal_width">0.1) as q1) "#,
            r#"as q2 natural join iris;"#
        )
    );
    assert_sql!(
        "π name, age (σ age>30 (people))",
        r#"select distinct "name","age" from (select * from people where "age">30) as q0;"#
    );
}

#[test]
fn conditions() {
    assert_sql!(
        "σ Name = 'John Smith' and Quantity>2 (sales)",
        r#"select * from sales where "Name"='John Smith' and "Quantity">2;"#
    );
    assert_sql!(
        "σ not (Quantity=10) (sales)",
        r#"select * from sales where not ("Quantity"=10);"#
    );
    assert_sql!(
        "σ (Quantity=1 or Quantity=2) (sales)",
        r#"select * from sales where "Quantity"=1 or "Quantity"=2;"#
    );
}

#[test]
fn joins() {
    assert_sql!(
        "(sales) ⧑ sales.ProductID<2 or sales.ProductID>=4 (products)",
        r#"select * from sales left join products on sales."ProductID"<2 or sales."ProductID">=4;"#
    );
    assert_sql!(
        "(sales) ⧓ sales.ProductID=products.ProductID (products)",
        r#"select * from sales full join products on sales."ProductID"=products."ProductID";"#
    );
    assert_sql!(
        "(sales) ⧒ (products)",
        "select * from sales natural right join products;"
    );
    assert_sql!("sales ⨯ products", "select * from sales cross join products;");
    assert_sql!(
        "A ⋈ B ⋈ C",
        "select * from (select * from A natural join B) as q0 natural join C;"
    );
    assert_sql!(
        "σ a=1 (A ∪ B)",
        r#"select * from (select * from A union select * from B) as q0 where q0."a"=1;"#
    );
}

#[test]
fn anti_joins() {
    assert_sql!(
        "(sales) ▷ (products)",
        r#"select * from sales natural left join products as cq1 where cq1."ProductID" = null ;"#
    );
    assert_sql!(
        "π ProductID (sales) ▷ (products)",
        concat!(
            r#"select * from (select distinct "ProductID" from sales) natural left join "#,
            r#"products as cq1 where cq1."ProductID" = null ;"#
        )
    );

    assert!(matches!(
        translate_text("(sales) ▷ (customers)", &catalog()),
        Err(Error::IllFormedExpression(_))
    ));
    assert!(matches!(
        translate_text("(sales) ▷ ProductID=1 (products)", &catalog()),
        Err(Error::IllFormedExpression(_))
    ));
    assert_eq!(
        translate_text("(sales) ▷ (products)", &EmptyCatalog),
        Err(Error::UnknownTable("sales".to_string()))
    );
}

#[test]
fn nested_anti_joins_are_aliased() {
    assert_sql!(
        "σ ProductID=1 (π ProductID (sales) ▷ (products))",
        concat!(
            r#"select * from (select * from (select distinct "ProductID" from sales) as q0 "#,
            r#"natural left join products as cq1 where cq1."ProductID" = null ) as q1 "#,
            r#"where q1."ProductID"=1;"#
        )
    );
}

#[test]
fn grouped_set_operations_return_rows() {
    let query = translate_text("(A ∪ B) ∩ C", &EmptyCatalog).expect("a valid translation");
    assert_eq!(
        query.sql_text(),
        "select * from (select * from A union select * from B) as q0 intersect select * from C;"
    );
    assert!(query.is_data_query());

    let query = translate_text("(A ∩ B) ∪ (C ∪ D)", &EmptyCatalog).expect("a valid translation");
    assert_eq!(
        query.sql_text(),
        "select * from A intersect select * from B union (select * from C union select * from D);"
    );
    assert!(query.is_data_query());
}

#[test]
fn renames() {
    assert_sql!("ρ s (sales)", "select * from sales as s;");
    assert_sql!(
        "σ s.Quantity > 1 (ρ s (sales))",
        r#"select * from sales as s where s."Quantity">1;"#
    );
    assert_sql!(
        "ρ p (π ProductID (products))",
        r#"select * from (select distinct "ProductID" from products) as p;"#
    );
}

#[test]
fn errors() {
    let err = |text: &str| translate_text(text, &catalog()).expect_err(text);

    assert!(matches!(err("σ a=1"), Error::MalformedExpression { .. }));
    assert!(matches!(err("A ∪ B)"), Error::MalformedExpression { .. }));
    assert!(matches!(err("name='open"), Error::MalformedExpression { .. }));
    assert_eq!(err("(A ∪ B"), Error::UnbalancedParentheses { position: 0 });
    assert!(matches!(err(""), Error::IllFormedExpression(_)));
    assert!(matches!(err("A B"), Error::IllFormedExpression(_)));
    assert!(matches!(err("A ∪"), Error::IllFormedExpression(_)));
    assert!(matches!(err("A ∪ 2"), Error::IllFormedExpression(_)));
    assert!(matches!(err("A ÷ B"), Error::IllFormedExpression(_)));
    assert!(matches!(err("ρ a b (sales)"), Error::IllFormedExpression(_)));

    // Errors print their context
    assert_eq!(
        err("(A ∪ B").to_string(),
        "Unbalanced parentheses at token 0"
    );
}

#[test]
fn dialects() {
    let conf = PrinterConfig::new(MssqlPrinterContext);
    let query = translate_with("σ ProductID > 2 (sales) ▷ (products)", &catalog(), &conf)
        .expect("a valid translation");
    assert_eq!(
        query.sql_text(),
        "select * from (select * from sales where [ProductID]>2) natural left join products as cq1 where cq1.[ProductID] = null ;"
    );
}

#[test]
fn lexer_and_parser_agree_with_hand_built_postfix() {
    let text = "σ ProductID > 2 (sales) ∩ (sales)";
    let postfix = parse(tokenize(text).expect("a valid tokenize")).expect("a valid parse");

    let by_hand = vec![
        Token::new(TokenKind::Ident, "sales"),
        Token::with_attributes(TokenKind::Select, "σ", vec![
            Token::new(TokenKind::Ident, "ProductID"),
            Token::new(TokenKind::Ident, ">"),
            Token::new(TokenKind::Digit, "2"),
        ]),
        Token::new(TokenKind::Ident, "sales"),
        Token::new(TokenKind::Intersection, "∩"),
    ];
    assert_eq!(postfix, by_hand);
    assert_eq!(
        transform(&postfix, &EmptyCatalog),
        transform(&by_hand, &EmptyCatalog)
    );
}

#[test]
fn translation_is_idempotent() {
    let text = "π variety (σ petal_width>0.1 (π variety,petal_width (iris))) ⋈ (iris)";
    let first = translate_text(text, &EmptyCatalog);
    let second = translate_text(text, &EmptyCatalog);
    assert!(first.is_ok());
    assert_eq!(first, second);
}

#[test]
fn query_display() {
    let query: Query = translate_text("sales", &EmptyCatalog).expect("a valid translation");
    assert_eq!(query.to_string(), "select * from sales;");
}

/// Well formed expressions over tables sharing an `id` column.
fn expression() -> impl Strategy<Value = String> {
    let table = prop::sample::select(vec!["A", "B", "sales"]).prop_map(String::from);
    table.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop::sample::select(vec!["∪", "∩", "−", "⨯", "⋈", "⧑", "⧒", "⧓"]),
                inner.clone()
            )
                .prop_map(|(left, op, right)| format!("({left}) {op} ({right})")),
            inner.clone().prop_map(|r| format!("σ id=1 ({r})")),
            inner.clone().prop_map(|r| format!("π id ({r})")),
            inner.prop_map(|r| format!("ρ t ({r})")),
        ]
    })
}

proptest! {
    #[test]
    fn never_panics(text in "\\PC{0,64}") {
        let _ = translate_text(&text, &catalog());
    }

    #[test]
    fn never_panics_on_operator_soup(
        parts in prop::collection::vec(
            prop::sample::select(vec!["σ", "π", "ρ", "∪", "▷", "⧑", "÷", "(", ")", " ", "a", "=", "1", "and", "'x'"]),
            0..24,
        )
    ) {
        let _ = translate_text(&parts.concat(), &catalog());
    }

    #[test]
    fn well_formed_expressions_translate(text in expression()) {
        let first = translate_text(&text, &EmptyCatalog);
        prop_assert!(first.is_ok(), "{text}: {first:?}");
        prop_assert_eq!(&first, &translate_text(&text, &EmptyCatalog));

        let query = first.expect("checked above");
        let sql = query.sql_text();
        prop_assert!(sql.ends_with(';'));
        prop_assert_eq!(sql.matches(';').count(), 1);
        prop_assert!(query.is_data_query(), "{sql}");

        // Every generated alias is declared once
        let mut seen = HashSet::new();
        for declared in sql.split(" as ").skip(1) {
            let alias: String = declared.chars().take_while(|c| c.is_alphanumeric()).collect();
            if alias.starts_with('q') {
                prop_assert!(seen.insert(alias.clone()), "{alias} declared twice in {sql}");
            }
        }
    }
}
