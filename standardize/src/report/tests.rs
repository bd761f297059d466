use googletest::prelude::*;

use super::*;

const ACME: &str = r#"{
    "acme": {
        "2020.12.31": {
            "unit": "1000000",
            "currency": "EUR",
            "pages": [1],
            "filename": "x.pdf",
            "to_extract": "yes"
        },
        "default": {"parent_entity_name": "ACME"}
    }
}"#;

#[gtest]
fn loads_acme_descriptor() -> anyhow::Result<()> {
    let set = load_reports(ACME)?;

    expect_that!(set.rejected, is_empty());
    assert_that!(set.reports.len(), eq(1));
    let report = &set.reports[0];
    expect_eq!(report.group_name, "acme");
    expect_eq!(report.end_of_year, "2020.12.31");
    expect_eq!(report.id(), "acme_2020.12.31");
    expect_that!(report.to_extract, eq(true));
    expect_eq!(report.unit_multiplier, 1_000_000);
    expect_eq!(report.currency, "EUR");
    expect_that!(report.pages, elements_are![eq(&1)]);
    expect_that!(report.filename_of_source, some(eq("x.pdf")));
    expect_that!(report.parent_entity_name, some(eq("ACME")));
    expect_eq!(report.thresholds, Thresholds::default());
    Ok(())
}

#[gtest]
fn period_fields_override_entity_default() -> anyhow::Result<()> {
    let set = load_reports(
        r#"{"acme": {
            "default": {"currency": "USD", "unit": 1, "to_extract": "no", "min_nb_cols": 3},
            "2019": {},
            "2020": {"currency": "EUR", "to_extract": "Yes", "min_nb_cols": "1"}
        }}"#,
    )?;

    assert_that!(set.reports.len(), eq(2));
    let (r2019, r2020) = (&set.reports[0], &set.reports[1]);
    expect_eq!(r2019.currency, "USD");
    expect_that!(r2019.to_extract, eq(false));
    expect_eq!(r2019.thresholds.min_nb_cols, 3);
    expect_eq!(r2020.currency, "EUR");
    expect_that!(r2020.to_extract, eq(true));
    expect_eq!(r2020.thresholds.min_nb_cols, 1);
    expect_eq!(r2020.thresholds.min_nb_terms, 2);
    Ok(())
}

#[gtest]
fn rejects_extractable_report_without_currency() -> anyhow::Result<()> {
    let set = load_reports(
        r#"{"acme": {"2020": {"unit": 1000, "to_extract": "yes"}},
            "beta": {"2020": {"unit": 1, "currency": "EUR", "to_extract": "yes"}}}"#,
    )?;

    expect_that!(
        set.rejected,
        elements_are![eq(&MetadataError::MissingField {
            report: "acme_2020".to_string(),
            field: "currency",
        })]
    );
    assert_that!(set.reports.len(), eq(1));
    expect_eq!(set.reports[0].group_name, "beta");
    Ok(())
}

#[gtest]
fn report_not_to_extract_needs_no_unit() -> anyhow::Result<()> {
    let set = load_reports(r#"{"acme": {"2020": {"to_extract": "no"}}}"#)?;

    assert_that!(set.reports.len(), eq(1));
    expect_eq!(set.reports[0].unit_multiplier, 1);
    expect_eq!(set.reports[0].currency, "");
    Ok(())
}

#[gtest]
fn report_not_to_extract_ignores_malformed_unit() -> anyhow::Result<()> {
    let set = load_reports(r#"{"acme": {"2020": {"to_extract": "no", "unit": "n/a"}}}"#)?;

    expect_that!(set.rejected, is_empty());
    assert_that!(set.reports.len(), eq(1));
    expect_eq!(set.reports[0].unit_multiplier, 1);
    Ok(())
}

#[gtest]
fn rejects_non_numeric_unit() -> anyhow::Result<()> {
    let set = load_reports(
        r#"{"acme": {"2020": {"unit": "millions", "currency": "EUR", "to_extract": "yes"}}}"#,
    )?;

    expect_that!(set.reports, is_empty());
    expect_that!(
        set.rejected,
        elements_are![matches_pattern!(MetadataError::InvalidField {
            field: eq(&"unit"),
            ..
        })]
    );
    Ok(())
}

#[gtest]
fn deduplicates_columns_to_flip() -> anyhow::Result<()> {
    let set = load_reports(
        r#"{"acme": {"2020": {"columns_to_flip": ["tax_paid", "tax_accrued", "tax_paid"]}}}"#,
    )?;

    expect_that!(
        set.reports[0].columns_to_flip,
        elements_are![eq("tax_paid"), eq("tax_accrued")]
    );
    Ok(())
}

#[gtest]
fn bare_year_period_ends_in_december() -> anyhow::Result<()> {
    let set = load_reports(r#"{"acme": {"2020": {}, "2021.06.30": {}}}"#)?;

    expect_eq!(set.reports[0].end_of_period_date(), "2020.12.31");
    expect_eq!(set.reports[1].end_of_period_date(), "2021.06.30");
    Ok(())
}

#[gtest]
fn malformed_document_is_a_config_error() {
    expect_true!(matches!(
        load_reports(r#"{"acme": ["2020"]}"#),
        Err(ConfigError::Json(_))
    ));
}
