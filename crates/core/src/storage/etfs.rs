use crate::domain::etf::{Etf, EtfInvestmentSetting, InvestmentCycle};
use anyhow::Context;

pub async fn etf_settings_for_user(
    pool: &sqlx::PgPool,
    user_id: i64,
) -> anyhow::Result<Vec<EtfInvestmentSetting>> {
    let rows = sqlx::query_as::<_, (i64, i64, i64, String, i32, f64)>(
        "SELECT ie.id, s.user_id, ie.etf_id, ie.cycle, ie.day, ie.amount \
         FROM investment_etfs ie \
         JOIN investment_settings s ON s.id = ie.setting_id \
         WHERE s.user_id = $1 \
         ORDER BY ie.id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("select investment_etfs for user failed")?;

    Ok(rows
        .into_iter()
        .map(|(id, user_id, etf_id, cycle, day, amount)| EtfInvestmentSetting {
            id,
            user_id,
            etf_id,
            cycle: InvestmentCycle::parse(&cycle),
            day,
            amount,
        })
        .collect())
}

pub async fn etf_by_id(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<Etf>> {
    let row = sqlx::query_as::<_, (i64, String, String, Option<String>)>(
        "SELECT id, symbol, name, description FROM etfs WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("select etf by id failed")?;

    Ok(row.map(|(id, symbol, name, description)| Etf {
        id,
        symbol,
        name,
        description,
    }))
}
