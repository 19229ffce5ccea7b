use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::models::Amount;
use crate::repository::delivery_repo::{self, BacklogRow};
use crate::repository::order_repo::{self, DailySalesRow, SaleRow, SpenderRow};

pub const SALES_DAYS: i64 = 30;
pub const TOP_CUSTOMERS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesDay {
    #[serde(rename = "created_at__date")]
    pub date: NaiveDate,
    pub total: f64,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerBacklog {
    pub name: String,
    pub delivered: i64,
    pub returned: i64,
    pub outstanding: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCustomer {
    #[serde(rename = "customer__user__username")]
    pub username: Option<String>,
    #[serde(rename = "customer__first_name")]
    pub first_name: Option<String>,
    #[serde(rename = "customer__last_name")]
    pub last_name: Option<String>,
    pub spend: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub today: f64,
    pub week: f64,
    pub month: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub sales: Vec<SalesDay>,
    pub to_be_returned: Vec<ContainerBacklog>,
    pub top_customers: Vec<TopCustomer>,
    pub revenue_summary: RevenueSummary,
}

pub fn daily_sales(rows: Vec<DailySalesRow>) -> Vec<SalesDay> {
    rows.into_iter()
        .map(|row| SalesDay {
            date: row.day,
            total: row.total,
            orders: row.orders,
        })
        .collect()
}

pub fn containers_to_return(rows: Vec<BacklogRow>) -> Vec<ContainerBacklog> {
    rows.into_iter()
        .map(|row| ContainerBacklog {
            outstanding: row.delivered - row.returned,
            name: row.name,
            delivered: row.delivered,
            returned: row.returned,
        })
        .collect()
}

pub fn top_customers(rows: Vec<SpenderRow>) -> Vec<TopCustomer> {
    rows.into_iter()
        .map(|row| TopCustomer {
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            spend: row.spend,
        })
        .collect()
}

/// Earliest day any revenue window reaches back to.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    week_start(today).min(month_start(today))
}

fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

fn month_start(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

/// Revenue for today, since Monday and since the first of the month.
pub fn revenue_summary(rows: &[SaleRow], today: NaiveDate) -> RevenueSummary {
    let sum_since = |start: NaiveDate| -> f64 {
        rows.iter()
            .filter(|r| {
                let day = r.created_at.date_naive();
                day >= start && day <= today
            })
            .map(|r| r.total_amount)
            .sum::<Amount>()
            .to_f64()
    };

    RevenueSummary {
        today: sum_since(today),
        week: sum_since(week_start(today)),
        month: sum_since(month_start(today)),
    }
}

/// Gathers every report section in one read.
pub async fn build(conn: &mut SqliteConnection, today: NaiveDate) -> sqlx::Result<Report> {
    let sales = order_repo::daily_sales(conn, SALES_DAYS).await?;
    let backlog = delivery_repo::container_backlog(conn).await?;
    let spenders = order_repo::top_spenders(conn, TOP_CUSTOMERS).await?;
    let recent = order_repo::sales_since(conn, window_start(today)).await?;

    Ok(Report {
        sales: daily_sales(sales),
        to_be_returned: containers_to_return(backlog),
        top_customers: top_customers(spenders),
        revenue_summary: revenue_summary(&recent, today),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sale(day: u32, amount: i64) -> SaleRow {
        SaleRow {
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
            total_amount: Amount::from(amount),
        }
    }

    #[test]
    fn revenue_windows_start_monday_and_first_of_month() {
        // 2024-05-15 is a Wednesday; the week starts on the 13th.
        let rows = vec![sale(2, 10), sale(12, 20), sale(13, 40), sale(15, 80)];
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let summary = revenue_summary(&rows, today);
        assert_eq!(summary.today, 80.0);
        assert_eq!(summary.week, 120.0);
        assert_eq!(summary.month, 150.0);
    }

    #[test]
    fn window_reaches_back_to_the_earlier_boundary() {
        // Wednesday the 15th: the month started first.
        let mid_month = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        assert_eq!(window_start(mid_month), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        // Friday the 3rd: the week started on Monday, April 29th.
        let early = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        assert_eq!(window_start(early), NaiveDate::from_ymd_opt(2024, 4, 29).unwrap());
    }

    #[test]
    fn backlog_reports_outstanding_difference() {
        let backlog = containers_to_return(vec![BacklogRow {
            name: "Refill 20L".to_string(),
            delivered: 8,
            returned: 2,
        }]);
        assert_eq!(
            backlog,
            vec![ContainerBacklog {
                name: "Refill 20L".to_string(),
                delivered: 8,
                returned: 2,
                outstanding: 6,
            }]
        );
    }
}
