use crate::config::Settings;
use crate::domain::analysis::ParsedAnalysis;
use anyhow::Context;
use serde_json::json;
use std::time::Duration;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const DEFAULT_FROM_EMAIL: &str = "noreply@etfapp.com";
const DEFAULT_FROM_NAME: &str = "ETF 투자 관리팀";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything the email template needs for one user's portfolio
/// notification.
#[derive(Debug, Clone)]
pub struct EmailPayload {
    /// Pre-rendered per-ETF lines (`• SYMBOL (name): amount`).
    pub etf_lines: Vec<String>,
    pub total_amount: f64,
    pub etf_count: usize,
    pub analysis: ParsedAnalysis,
}

/// Delivery collaborator. Returns whether delivery succeeded; failures are
/// reported, never raised, so a broken channel cannot abort a dispatch run.
#[async_trait::async_trait]
pub trait EmailClient: Send + Sync {
    async fn send_portfolio_notification(
        &self,
        email: &str,
        name: &str,
        payload: &EmailPayload,
    ) -> bool;
}

#[derive(Debug, Clone)]
pub struct SendGridClient {
    http: reqwest::Client,
    api_key: Option<String>,
    from_email: String,
    from_name: String,
}

impl SendGridClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.sendgrid_api_key.clone();
        if api_key.is_none() {
            tracing::warn!("SENDGRID_API_KEY not set; email delivery disabled");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build sendgrid http client")?;

        Ok(Self {
            http,
            api_key,
            from_email: settings
                .sendgrid_from_email
                .clone()
                .unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
            from_name: settings
                .sendgrid_from_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
        })
    }

    async fn send(&self, to_email: &str, subject: &str, html: &str) -> anyhow::Result<bool> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(false);
        };

        let body = json!({
            "personalizations": [{
                "to": [{"email": to_email}],
                "subject": subject,
            }],
            "from": {
                "email": self.from_email,
                "name": self.from_name,
            },
            "content": [{
                "type": "text/html",
                "value": html,
            }],
        });

        let res = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("sendgrid request failed")?;

        let status = res.status();
        if status.is_success() {
            Ok(true)
        } else {
            let text = res.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "sendgrid rejected email");
            Ok(false)
        }
    }
}

#[async_trait::async_trait]
impl EmailClient for SendGridClient {
    async fn send_portfolio_notification(
        &self,
        email: &str,
        name: &str,
        payload: &EmailPayload,
    ) -> bool {
        let subject = format!(
            "[ETF앱] 포트폴리오 투자 분석 알림 ({}개 종목)",
            payload.etf_count
        );
        let html = render_portfolio_html(name, payload);

        match self.send(email, &subject, &html).await {
            Ok(sent) => sent,
            Err(err) => {
                tracing::error!(error = %err, "portfolio notification email failed");
                false
            }
        }
    }
}

pub fn render_portfolio_html(user_name: &str, payload: &EmailPayload) -> String {
    let mut html = String::new();
    html.push_str("<html><body>");
    html.push_str(&format!(
        "<h2>📊 {user_name}님의 포트폴리오 투자 분석</h2>"
    ));

    html.push_str("<h3>오늘의 투자 예정 ETF</h3><ul>");
    for line in &payload.etf_lines {
        html.push_str(&format!("<li>{line}</li>"));
    }
    html.push_str("</ul>");
    html.push_str(&format!(
        "<p>총 {}개 종목, 합계 {}만 원</p>",
        payload.etf_count, payload.total_amount
    ));

    if payload.analysis.items.is_empty() {
        html.push_str("<p>상세 분석 정보를 불러오지 못했습니다.</p>");
    } else {
        for item in &payload.analysis.items {
            html.push_str(&format!(
                "<div><h4>{} ({})</h4><div>- <strong>권고 사항</strong>: {}</div><div>- <strong>이유</strong>: {}</div></div>",
                item.symbol, item.name, item.recommendation, item.reason
            ));
        }
    }

    if !payload.analysis.summary.is_empty() {
        html.push_str(&format!(
            "<div><h3>📋 종합 의견</h3><p>{}</p></div>",
            payload.analysis.summary
        ));
    }

    html.push_str("</body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::EtfAdvice;

    fn payload() -> EmailPayload {
        EmailPayload {
            etf_lines: vec![
                "• SPY (미국 S&P500): 50만 원".to_string(),
                "• QQQ (미국 나스닥): 30만 원".to_string(),
            ],
            total_amount: 80.0,
            etf_count: 2,
            analysis: ParsedAnalysis {
                summary: "안정적인 시장입니다.".to_string(),
                items: vec![EtfAdvice {
                    symbol: "SPY".to_string(),
                    name: "미국 S&P500".to_string(),
                    recommendation: "비중 유지".to_string(),
                    reason: "변동성이 낮습니다.".to_string(),
                }],
            },
        }
    }

    #[test]
    fn renders_etf_lines_and_summary() {
        let html = render_portfolio_html("지혜", &payload());
        assert!(html.contains("지혜님의 포트폴리오"));
        assert!(html.contains("• SPY (미국 S&P500): 50만 원"));
        assert!(html.contains("합계 80만 원"));
        assert!(html.contains("비중 유지"));
        assert!(html.contains("안정적인 시장입니다."));
    }

    #[test]
    fn renders_fallback_when_no_items() {
        let mut p = payload();
        p.analysis.items.clear();
        let html = render_portfolio_html("지혜", &p);
        assert!(html.contains("상세 분석 정보를 불러오지 못했습니다."));
    }
}
