use crate::Ranking;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use rust_decimal::Decimal;

/// Renders a ranking, with its index and momentum inputs, as a terminal table.
///
/// Currencies that could not be scored follow in a second table.
pub fn format_ranking(ranking: &Ranking) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "#",
            "Currency",
            "Report Date",
            "Net Position",
            "Index",
            "Momentum",
            "Score",
            "Signal",
        ]);

    for (i, analysis) in ranking.ranked.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(analysis.currency()),
            Cell::new(analysis.index.report_date),
            Cell::new(format_contracts(analysis.index.current_net_position))
                .set_alignment(CellAlignment::Right),
            Cell::new(analysis.index.index_value.round_dp(1)).set_alignment(CellAlignment::Right),
            Cell::new(format_signed(analysis.momentum.momentum_value.round_dp(0)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format_signed(analysis.score.score.round_dp(2)))
                .set_alignment(CellAlignment::Right),
            Cell::new(analysis.signal),
        ]);
    }

    let mut output = table.to_string();

    if !ranking.incomplete.is_empty() {
        let mut incomplete = Table::new();
        incomplete
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Currency", "Missing Because", "Detail"]);
        for entry in &ranking.incomplete {
            incomplete.add_row(vec![
                Cell::new(&entry.currency),
                Cell::new(entry.kind),
                Cell::new(&entry.message),
            ]);
        }
        output.push_str("\n\nIncomplete:\n");
        output.push_str(&incomplete.to_string());
    }

    output
}

fn format_signed(value: Decimal) -> String {
    if value.is_sign_positive() && !value.is_zero() {
        format!("+{}", value)
    } else {
        value.to_string()
    }
}

/// `-12345` becomes `-12,345`.
fn format_contracts(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IncompleteEntry;
    use core_types::FailureKind;

    #[test]
    fn contracts_are_grouped_by_thousands() {
        assert_eq!(format_contracts(0), "0");
        assert_eq!(format_contracts(999), "999");
        assert_eq!(format_contracts(1_000), "1,000");
        assert_eq!(format_contracts(-1_234_567), "-1,234,567");
    }

    #[test]
    fn signed_values_show_their_sign() {
        assert_eq!(format_signed(Decimal::new(125, 1)), "+12.5");
        assert_eq!(format_signed(Decimal::new(-3, 0)), "-3");
        assert_eq!(format_signed(Decimal::ZERO), "0");
    }

    #[test]
    fn incomplete_currencies_get_their_own_table() {
        let ranking = Ranking {
            ranked: Vec::new(),
            incomplete: vec![IncompleteEntry {
                currency: "NZD".parse().unwrap(),
                kind: FailureKind::DataNotFound,
                message: "no reports stored".to_string(),
            }],
        };
        let rendered = format_ranking(&ranking);
        assert!(rendered.contains("Incomplete:"));
        assert!(rendered.contains("NZD"));
        assert!(rendered.contains("data not found"));
    }
}
