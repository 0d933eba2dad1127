//! Violation trend aggregation
//!
//! Buckets violations by day, ISO week, or month for the statistics
//! endpoint, with optional date-range, brand, and competitor filters.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{CompetitorId, Severity, Violation};

/// Bucketing granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Day,
    Week,
    Month,
}

/// Filters for a statistics query
#[derive(Debug, Clone, Default)]
pub struct StatisticsQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub group_by: GroupBy,
    /// Catalog vendor filter, case-insensitive
    pub brand: Option<String>,
    pub competitor_id: Option<CompetitorId>,
}

/// One aggregation bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodStats {
    /// Bucket key: "2026-08-08", "2026-W32", or "2026-08"
    pub period: String,
    pub total: usize,
    pub minor: usize,
    pub moderate: usize,
    pub severe: usize,
    pub avg_percent: f64,
    pub max_percent: f64,
}

/// Aggregate violations into period buckets, sorted ascending by period.
///
/// `vendor_of` resolves a catalog product id to its vendor for the brand
/// filter; unknown products simply never match a brand filter.
pub fn aggregate(
    violations: &[Violation],
    vendor_of: &dyn Fn(&str) -> Option<String>,
    query: &StatisticsQuery,
) -> Vec<PeriodStats> {
    let brand = query.brand.as_ref().map(|b| b.to_lowercase());

    let mut buckets: std::collections::BTreeMap<String, Vec<&Violation>> =
        std::collections::BTreeMap::new();

    for violation in violations {
        let date = violation.detected_at.date_naive();
        if let Some(start) = query.start_date {
            if date < start {
                continue;
            }
        }
        if let Some(end) = query.end_date {
            if date > end {
                continue;
            }
        }
        if let Some(competitor_id) = query.competitor_id {
            if violation.competitor_id != competitor_id {
                continue;
            }
        }
        if let Some(brand) = &brand {
            match vendor_of(&violation.catalog_product_id) {
                Some(vendor) if vendor.to_lowercase() == *brand => {}
                _ => continue,
            }
        }

        buckets
            .entry(period_key(date, query.group_by))
            .or_default()
            .push(violation);
    }

    buckets
        .into_iter()
        .map(|(period, group)| {
            let mut stats = PeriodStats {
                period,
                total: group.len(),
                minor: 0,
                moderate: 0,
                severe: 0,
                avg_percent: 0.0,
                max_percent: 0.0,
            };
            let mut percent_sum = 0.0;
            for violation in &group {
                match violation.severity {
                    Severity::Minor => stats.minor += 1,
                    Severity::Moderate => stats.moderate += 1,
                    Severity::Severe => stats.severe += 1,
                }
                percent_sum += violation.violation_percent;
                stats.max_percent = stats.max_percent.max(violation.violation_percent);
            }
            stats.avg_percent = percent_sum / group.len() as f64;
            stats
        })
        .collect()
}

fn period_key(date: NaiveDate, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Day => date.format("%Y-%m-%d").to_string(),
        GroupBy::Week => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        GroupBy::Month => date.format("%Y-%m").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn violation(
        day: &str,
        severity: Severity,
        percent: f64,
        catalog_id: &str,
        competitor_id: CompetitorId,
    ) -> Violation {
        let date = day.parse::<NaiveDate>().unwrap();
        let detected_at = Utc
            .from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap());
        Violation {
            id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            catalog_product_id: catalog_id.to_string(),
            competitor_product_id: "url-1".to_string(),
            competitor_id,
            reference_price: dec("100.00"),
            observed_price: dec("80.00"),
            price_delta: dec("20.00"),
            violation_percent: percent,
            severity,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            detected_at,
            updated_at: detected_at,
        }
    }

    fn no_vendor(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn groups_by_day_with_severity_counts() {
        let competitor = Uuid::new_v4();
        let violations = vec![
            violation("2026-08-01", Severity::Severe, 0.25, "cp-1", competitor),
            violation("2026-08-01", Severity::Minor, 0.06, "cp-2", competitor),
            violation("2026-08-02", Severity::Moderate, 0.12, "cp-1", competitor),
        ];
        let stats = aggregate(&violations, &no_vendor, &StatisticsQuery::default());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].period, "2026-08-01");
        assert_eq!(stats[0].total, 2);
        assert_eq!(stats[0].severe, 1);
        assert_eq!(stats[0].minor, 1);
        assert!((stats[0].avg_percent - 0.155).abs() < 1e-9);
        assert!((stats[0].max_percent - 0.25).abs() < 1e-9);
        assert_eq!(stats[1].period, "2026-08-02");
        assert_eq!(stats[1].moderate, 1);
    }

    #[test]
    fn groups_by_week_and_month() {
        let competitor = Uuid::new_v4();
        let violations = vec![
            violation("2026-08-03", Severity::Minor, 0.06, "cp-1", competitor),
            violation("2026-08-09", Severity::Minor, 0.06, "cp-1", competitor),
        ];
        let weekly = aggregate(
            &violations,
            &no_vendor,
            &StatisticsQuery {
                group_by: GroupBy::Week,
                ..StatisticsQuery::default()
            },
        );
        // 2026-08-03 is a Monday; 2026-08-09 the following Sunday: same ISO week
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].total, 2);
        assert!(weekly[0].period.contains("-W"));

        let monthly = aggregate(
            &violations,
            &no_vendor,
            &StatisticsQuery {
                group_by: GroupBy::Month,
                ..StatisticsQuery::default()
            },
        );
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].period, "2026-08");
    }

    #[test]
    fn date_range_filters_apply() {
        let competitor = Uuid::new_v4();
        let violations = vec![
            violation("2026-07-31", Severity::Minor, 0.06, "cp-1", competitor),
            violation("2026-08-01", Severity::Minor, 0.06, "cp-1", competitor),
            violation("2026-08-05", Severity::Minor, 0.06, "cp-1", competitor),
        ];
        let stats = aggregate(
            &violations,
            &no_vendor,
            &StatisticsQuery {
                start_date: Some("2026-08-01".parse().unwrap()),
                end_date: Some("2026-08-04".parse().unwrap()),
                ..StatisticsQuery::default()
            },
        );
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].period, "2026-08-01");
    }

    #[test]
    fn brand_filter_uses_vendor_lookup() {
        let competitor = Uuid::new_v4();
        let violations = vec![
            violation("2026-08-01", Severity::Minor, 0.06, "cp-ecm", competitor),
            violation("2026-08-01", Severity::Minor, 0.06, "cp-rocket", competitor),
        ];
        let vendor_of = |id: &str| -> Option<String> {
            match id {
                "cp-ecm" => Some("ECM".to_string()),
                "cp-rocket" => Some("Rocket".to_string()),
                _ => None,
            }
        };
        let stats = aggregate(
            &violations,
            &vendor_of,
            &StatisticsQuery {
                brand: Some("ecm".to_string()),
                ..StatisticsQuery::default()
            },
        );
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total, 1);
    }

    #[test]
    fn competitor_filter_applies() {
        let us = Uuid::new_v4();
        let them = Uuid::new_v4();
        let violations = vec![
            violation("2026-08-01", Severity::Minor, 0.06, "cp-1", us),
            violation("2026-08-01", Severity::Minor, 0.06, "cp-1", them),
        ];
        let stats = aggregate(
            &violations,
            &no_vendor,
            &StatisticsQuery {
                competitor_id: Some(us),
                ..StatisticsQuery::default()
            },
        );
        assert_eq!(stats[0].total, 1);
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        let stats = aggregate(&[], &no_vendor, &StatisticsQuery::default());
        assert!(stats.is_empty());
    }
}
