//! Flat-file export of violations

use crate::types::Violation;

const HEADER: &str = "id,match_id,catalog_product_id,competitor_product_id,competitor_id,\
reference_price,observed_price,price_delta,violation_percent,severity,resolved,resolved_by,\
resolved_at,detected_at";

/// Render violations as CSV, newest first ordering preserved from the input.
pub fn to_csv(violations: &[Violation]) -> String {
    let mut out = String::with_capacity(violations.len() * 160 + HEADER.len() + 1);
    out.push_str(HEADER);
    out.push('\n');

    for v in violations {
        let fields = [
            v.id.to_string(),
            v.match_id.to_string(),
            v.catalog_product_id.clone(),
            v.competitor_product_id.clone(),
            v.competitor_id.to_string(),
            v.reference_price.to_string(),
            v.observed_price.to_string(),
            v.price_delta.to_string(),
            format!("{:.4}", v.violation_percent),
            v.severity.to_string(),
            v.resolved.to_string(),
            v.resolved_by.clone().unwrap_or_default(),
            v.resolved_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            v.detected_at.to_rfc3339(),
        ];
        let row: Vec<String> = fields.iter().map(|f| escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a comma, quote, or newline.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use chrono::Utc;
    use uuid::Uuid;

    fn violation() -> Violation {
        let now = Utc::now();
        Violation {
            id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            catalog_product_id: "cp-1".to_string(),
            competitor_product_id: "https://rival.example/products/widget".to_string(),
            competitor_id: Uuid::new_v4(),
            reference_price: "100.00".parse().unwrap(),
            observed_price: "75.00".parse().unwrap(),
            price_delta: "25.00".parse().unwrap(),
            violation_percent: 0.25,
            severity: Severity::Severe,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            detected_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_violation() {
        let csv = to_csv(&[violation(), violation()]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,match_id,"));
        assert!(lines[1].contains("severe"));
        assert!(lines[1].contains("0.2500"));
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let mut v = violation();
        v.catalog_product_id = "widget, large".to_string();
        let csv = to_csv(&[v]);
        assert!(csv.contains("\"widget, large\""));
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(escape(r#"18" lever"#), r#""18"" lever""#);
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn empty_input_is_header_only() {
        let csv = to_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }
}
