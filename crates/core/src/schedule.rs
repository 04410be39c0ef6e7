use crate::domain::etf::{EtfInvestmentSetting, InvestmentCycle};
use crate::time::kst::weekday_index;
use chrono::{Datelike, NaiveDate};

/// Whether `today` is an investment day for one setting.
///
/// Weekly `day` is a Monday=0 weekday index; monthly `day` is a
/// day-of-month. Monthly days past the end of a short month simply never
/// match that month (no roll-over). Unknown cycles are never due.
pub fn is_due(setting: &EtfInvestmentSetting, today: NaiveDate) -> bool {
    match &setting.cycle {
        InvestmentCycle::Daily => true,
        InvestmentCycle::Weekly => setting.day >= 0 && weekday_index(today) == setting.day as u32,
        InvestmentCycle::Monthly => setting.day >= 1 && today.day() == setting.day as u32,
        InvestmentCycle::Other(_) => false,
    }
}

pub fn select_due(today: NaiveDate, settings: &[EtfInvestmentSetting]) -> Vec<EtfInvestmentSetting> {
    settings
        .iter()
        .filter(|s| is_due(s, today))
        .cloned()
        .collect()
}
