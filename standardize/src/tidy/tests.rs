use googletest::prelude::*;

use super::*;
use crate::table::Table;

fn report() -> Report {
    let mut report = Report::for_test("acme", "2020");
    report.unit_multiplier = 1000;
    report.parent_entity_name = Some(" ACME SA ".to_string());
    report.columns_to_flip = vec!["tax_paid".to_string()];
    report
}

fn rates() -> ExchangeRates {
    let mut rates = ExchangeRates::default();
    rates.insert("EUR", "2020.12.31", 1.0);
    rates.insert("USD", "2020.12.31", 0.875);
    rates
}

fn table() -> LabelledTable {
    LabelledTable {
        labels: [
            "jurisdiction",
            "total_revenues",
            "unrelated_revenues",
            "related_revenues",
            "tax_paid",
            "employees",
            "effective_tax_rate",
            "commentary",
        ]
        .map(String::from)
        .to_vec(),
        rows: Table::from([
            vec!["FRA", "1,000", "40%", "600", "(50)", "12", "25%", "holding"],
            vec!["DEU", "2.000", "1500", "500", "-", "7", "n/a", ""],
        ]),
    }
}

#[gtest]
fn tidies_report_table() -> anyhow::Result<()> {
    let tidied = tidy(&table(), &report(), &rates())?;

    expect_that!(
        tidied.labels,
        elements_are![
            eq("group_name"),
            eq("parent_entity"),
            eq("end_of_year"),
            eq("currency"),
            eq("multiplier_to_euro"),
            eq("jurisdiction"),
            eq("total_revenues"),
            eq("unrelated_revenues"),
            eq("related_revenues"),
            eq("tax_paid"),
            eq("employees"),
        ]
    );
    expect_that!(
        tidied.rows[0],
        elements_are![
            eq(&Value::Text("acme".to_string())),
            eq(&Value::Text("ACME SA".to_string())),
            eq(&Value::Text("2020.12.31".to_string())),
            eq(&Value::Text("EUR".to_string())),
            eq(&Value::Number(1.0)),
            eq(&Value::Text("FRA".to_string())),
            eq(&Value::Number(1_000_000.0)),
            eq(&Value::Number(400_000.0)),
            eq(&Value::Number(600_000.0)),
            eq(&Value::Number(50_000.0)),
            eq(&Value::Number(12.0)),
        ]
    );
    expect_that!(
        tidied.rows[1][6..].to_vec(),
        elements_are![
            eq(&Value::Number(2_000_000.0)),
            eq(&Value::Number(1_500_000.0)),
            eq(&Value::Number(500_000.0)),
            eq(&Value::Missing),
            eq(&Value::Number(7.0)),
        ]
    );
    Ok(())
}

#[gtest]
fn optional_metadata_columns_follow_end_of_year() -> anyhow::Result<()> {
    let mut report = report();
    report.currency = "USD".to_string();
    report.nace2_core_code = Some("6420".to_string());
    report.parent_jurisdiction = Some("FRA".to_string());

    let tidied = tidy(&table(), &report, &rates())?;

    expect_that!(
        tidied.labels[..6].to_vec(),
        elements_are![
            eq("group_name"),
            eq("parent_entity"),
            eq("end_of_year"),
            eq("parent_entity_nace2_core_code"),
            eq("parent_entity_jurisdiction"),
            eq("currency"),
        ]
    );
    expect_that!(
        tidied.column("multiplier_to_euro").cloned().collect::<Vec<_>>(),
        each(eq(&Value::Number(0.875)))
    );
    Ok(())
}

#[gtest]
fn percentages_without_total_are_missing() -> anyhow::Result<()> {
    let mut table = table();
    table.labels[1] = "stated_capital".to_string();

    let tidied = tidy(&table, &report(), &rates())?;

    expect_that!(
        tidied.column("unrelated_revenues").cloned().collect::<Vec<_>>(),
        elements_are![eq(&Value::Missing), eq(&Value::Number(1_500_000.0))]
    );
    Ok(())
}

#[gtest]
fn flipping_an_absent_column_fails() {
    let mut report = report();
    report.columns_to_flip.push("tax_accrued".to_string());

    expect_that!(
        tidy(&table(), &report, &rates()),
        err(eq(&StandardizationError::MissingFlipColumn {
            column: "tax_accrued".to_string()
        }))
    );
}

#[gtest]
fn unknown_exchange_rate_fails() {
    let mut report = report();
    report.currency = "CHF".to_string();

    expect_that!(
        tidy(&table(), &report, &rates()),
        err(eq(&StandardizationError::MissingExchangeRate {
            currency: "CHF".to_string(),
            end_of_year: "2020.12.31".to_string(),
        }))
    );
}

#[gtest]
fn writes_non_numeric_fields_quoted() -> anyhow::Result<()> {
    let tidied = tidy(&table(), &report(), &rates())?;
    let mut out = Vec::new();

    tidied.write_csv(&mut out)?;

    let text = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();
    expect_that!(
        lines[0],
        eq(
            r#""group_name","parent_entity","end_of_year","currency","multiplier_to_euro","jurisdiction","total_revenues","unrelated_revenues","related_revenues","tax_paid","employees""#
        )
    );
    expect_that!(
        lines[1],
        eq(r#""acme","ACME SA","2020.12.31","EUR",1,"FRA",1000000,400000,600000,50000,12"#)
    );
    Ok(())
}

#[gtest]
fn numbers_print_without_trailing_zeros() {
    expect_that!(Value::Number(1234.0).to_string(), eq("1234"));
    expect_that!(Value::Number(-0.0).to_string(), eq("0"));
    expect_that!(Value::Number(0.25).to_string(), eq("0.25"));
    expect_that!(Value::Missing.to_string(), eq(""));
}

#[gtest]
fn digit_only_text_stays_quoted() -> anyhow::Result<()> {
    let table = TidyTable {
        labels: vec!["parent_entity_nace2_core_code".to_string(), "tax_paid".to_string()],
        rows: vec![
            vec![Value::Text("1920".to_string()), Value::Number(5.0)],
            vec![Value::Text("say \"hi\"".to_string()), Value::Missing],
        ],
    };
    let mut out = Vec::new();

    table.write_csv(&mut out)?;

    expect_eq!(
        String::from_utf8(out)?,
        "\"parent_entity_nace2_core_code\",\"tax_paid\"\n\"1920\",5\n\"say \"\"hi\"\"\",\n"
    );
    Ok(())
}
