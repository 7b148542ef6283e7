//! Intake summary for the operator channel

use crate::relay::OperatorChannel;
use crate::runtime::Transport;
use crate::state_machine::state::NOT_SPECIFIED;
use crate::state_machine::Session;
use teloxide::utils::html;

fn field(value: Option<&str>) -> String {
    html::escape(value.unwrap_or(NOT_SPECIFIED))
}

/// One block listing every collected field; unset fields read "не указано"
pub fn format_summary(session: &Session) -> String {
    let mut lines = vec![
        "📢 Новый запрос на консультацию!".to_string(),
        String::new(),
        format!("🏙 Город: {}", field(session.city.as_deref())),
        format!("👤 Статус: {}", field(session.role.map(|r| r.caption()))),
    ];
    if let Some(case_type) = session.case_type {
        lines.push(format!("⚖️ Категория: {}", case_type.caption()));
    }
    lines.extend([
        format!(
            "📞 Способ связи: {}",
            field(session.contact_method.map(|m| m.caption()))
        ),
        format!(
            "📛 Имя/Компания: {}",
            field(session.name_or_company.as_deref())
        ),
        format!("📲 Телефон: {}", html::escape(session.phone_display())),
        format!("💬 Запрос: {}", field(session.query_text.as_deref())),
        format!("🆔 User ID: <code>{}</code>", session.party_id),
    ]);
    lines.join("\n")
}

/// Deliver the summary for a just-completed intake
pub async fn dispatch<T: Transport>(channel: &OperatorChannel<T>, session: &Session) -> bool {
    let delivered = channel.post(&format_summary(session)).await;
    if delivered {
        tracing::info!(party_id = %session.party_id, "Intake summary delivered");
    }
    delivered
}
