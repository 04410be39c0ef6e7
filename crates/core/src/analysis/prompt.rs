use crate::domain::analysis::ChatMessage;
use crate::domain::etf::{Etf, EtfInvestmentSetting};
use crate::domain::user::{InvestmentSettings, User};
use chrono::{Datelike, NaiveDate};

/// Builds the integrated portfolio-analysis conversation for one user: all
/// due ETFs in a single request. The output-format rules here are the other
/// half of the parser's wire contract — keep the two in sync.
pub fn integrated_analysis_messages(
    user: &User,
    settings: &InvestmentSettings,
    etfs: &[(EtfInvestmentSetting, Etf)],
    today: NaiveDate,
) -> Vec<ChatMessage> {
    let user_info = format!(
        "[사용자 정보]\n- 이름: {}\n- 위험 성향(0~10): {}\n- 투자 목표/페르소나: {}",
        user.name,
        settings.risk_level,
        settings.persona.as_deref().unwrap_or("미입력")
    );

    let etf_lines: Vec<String> = etfs
        .iter()
        .map(|(setting, etf)| {
            format!(
                "- {}: {}만원, 주기: {}, 이름: {}",
                etf.symbol,
                setting.amount,
                setting.cycle.as_str(),
                etf.name
            )
        })
        .collect();
    let etf_info = format!("[보유 ETF 목록]\n{}", etf_lines.join("\n"));

    let output_format_and_rules = [
        "[출력 포맷]",
        "### ETF 분석 결과",
        "",
        "#### SPY (미국 S&P500)",
        "- **권고 사항**: 비중 유지 (시장 안정, 추가 매수 불필요)",
        "- **이유**: ECB의 주요 정책금리 동결로 인한 글로벌 금융시장의 안정세가 유지되고 있습니다.",
        "",
        "#### QQQ (미국 나스닥)",
        "- **권고 사항**: 비중 10% 증가 권고 (기술주 강세, 성장 기대)",
        "- **이유**: 기술주 중심의 나스닥 시장은 최근 긍정적인 경제 신호들로 강세를 보입니다.",
        "",
        "### 종합 의견:",
        "이번 주는 전반적으로 안정된 시장 모습을 보였습니다. 현 상황에서는 점진적이고 안정적인 접근이 필요합니다.",
        "",
        "[규칙]",
        "1. 응답은 반드시 제공한 모든 ETF 목록을 분석한 후에, 위의 [출력 포맷]을 정확하게 따라야 합니다.",
        "2. 각 ETF는 `#### <심볼> (<이름>)` 형식의 제목으로 시작해야 합니다.",
        "3. 각 ETF 정보는 `- **권고 사항**: ...`과 `- **이유**: ...` 항목을 반드시 포함해야 합니다.",
        "4. `### 종합 의견:` 항목을 반드시 포함해야 합니다.",
        "5. 포맷 외에 불필요한 인사말, 서론, 결론 등 부연 설명을 절대 추가하지 마십시오.",
    ]
    .join("\n");

    let today_line = format!(
        "[분석 기준일] {}년 {}월 {}일",
        today.year(),
        today.month(),
        today.day()
    );

    let system_content = format!(
        "당신은 유능한 금융 분석가입니다. 아래 정보를 바탕으로 포트폴리오 조정에 대한 조언을 생성해야 합니다. 반드시 [규칙]을 엄격히 준수하십시오.\n\n{user_info}\n\n{etf_info}\n\n{today_line}\n\n{output_format_and_rules}"
    );

    vec![
        ChatMessage::system(system_content),
        ChatMessage::user("오늘의 투자 포트폴리오 조정 조언을 생성해줘.".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::AnalysisSnapshot;
    use crate::domain::etf::InvestmentCycle;

    fn fixtures() -> (User, InvestmentSettings, Vec<(EtfInvestmentSetting, Etf)>) {
        let user = User {
            id: 7,
            login_id: "jihye".to_string(),
            name: "지혜".to_string(),
            email: "jihye@example.com".to_string(),
        };
        let settings = InvestmentSettings {
            id: 1,
            user_id: 7,
            risk_level: 6,
            api_key: "sk-test".to_string(),
            model_type: "gpt-4o-mini".to_string(),
            persona: Some("장기 적립식".to_string()),
            notification_enabled: true,
            snapshot: AnalysisSnapshot::default(),
        };
        let etfs = vec![(
            EtfInvestmentSetting {
                id: 1,
                user_id: 7,
                etf_id: 3,
                cycle: InvestmentCycle::Monthly,
                day: 15,
                amount: 50.0,
            },
            Etf {
                id: 3,
                symbol: "SPY".to_string(),
                name: "미국 S&P500".to_string(),
                description: None,
            },
        )];
        (user, settings, etfs)
    }

    #[test]
    fn builds_system_then_user_message() {
        let (user, settings, etfs) = fixtures();
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let messages = integrated_analysis_messages(&user, &settings, &etfs, today);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn system_message_carries_user_etfs_and_date() {
        let (user, settings, etfs) = fixtures();
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let messages = integrated_analysis_messages(&user, &settings, &etfs, today);
        let system = &messages[0].content;

        assert!(system.contains("- 이름: 지혜"));
        assert!(system.contains("위험 성향(0~10): 6"));
        assert!(system.contains("- SPY: 50만원, 주기: monthly, 이름: 미국 S&P500"));
        assert!(system.contains("[분석 기준일] 2026년 3월 15일"));
        assert!(system.contains("### 종합 의견:"));
    }

    #[test]
    fn missing_persona_renders_placeholder() {
        let (user, mut settings, etfs) = fixtures();
        settings.persona = None;
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let messages = integrated_analysis_messages(&user, &settings, &etfs, today);
        assert!(messages[0].content.contains("투자 목표/페르소나: 미입력"));
    }
}
