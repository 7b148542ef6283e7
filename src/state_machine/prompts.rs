//! Party-facing prompt texts and reply keyboards, keyed by dialog state

use super::state::{
    CaseType, ContactMethod, DialogState, FlowConfig, Role, Session, KNOWN_CITIES, OTHER_CITY,
};
use crate::transport::{Keyboard, Outbound};
use teloxide::utils::html;

/// Keyboard caption accepted as the start command
pub const START_CAPTION: &str = "Начать";

const WELCOME: &str = "Добро пожаловать! Ответьте на несколько вопросов, и мы подберём для вас консультацию.";
const ASK_CITY: &str = "Из какого вы города?";
const ASK_CUSTOM_CITY: &str = "Напишите название вашего города.";
const ASK_ROLE: &str = "Кем вы являетесь?";
const ASK_CASE_TYPE: &str = "К какой категории относится ваше дело?";
const ASK_CONTACT: &str = "Как вам удобнее получить консультацию?";
const ASK_NAME: &str = "Как к вам обращаться?";
const ASK_COMPANY: &str = "Напишите название вашей компании.";
const ASK_QUERY: &str = "Укажите ваш запрос или ситуацию, с которой вы обращаетесь.";
const ASK_PHONE: &str = "Напишите ваш номер телефона.";
const AWAIT_OPERATOR_CHAT: &str = "Ожидайте, с вами свяжется оператор в чате.";
const FOLLOW_INSTRUCTIONS: &str = "Пожалуйста, следуйте инструкциям.";
const USE_START: &str = "Чтобы начать, отправьте /start.";

pub fn keyboard_for(state: DialogState) -> Keyboard {
    match state {
        DialogState::Idle => Keyboard::Buttons(vec![vec![START_CAPTION]]),
        DialogState::AwaitCity => Keyboard::Buttons(vec![
            vec![KNOWN_CITIES[0]],
            vec![KNOWN_CITIES[1]],
            vec![OTHER_CITY],
        ]),
        DialogState::AwaitRole => {
            Keyboard::Buttons(vec![Role::ALL.iter().map(|r| r.caption()).collect()])
        }
        DialogState::AwaitCaseType => {
            Keyboard::Buttons(vec![CaseType::ALL.iter().map(|c| c.caption()).collect()])
        }
        DialogState::AwaitContactMethod => Keyboard::Buttons(vec![ContactMethod::ALL
            .iter()
            .map(|m| m.caption())
            .collect()]),
        DialogState::AwaitCustomCity
        | DialogState::AwaitName
        | DialogState::AwaitQuery
        | DialogState::AwaitPhone
        | DialogState::ActiveRelay => Keyboard::Remove,
    }
}

/// The question asked on entering `state`
pub fn question(state: DialogState, session: &Session) -> Outbound {
    let text = match state {
        DialogState::Idle => USE_START,
        DialogState::AwaitCity => ASK_CITY,
        DialogState::AwaitCustomCity => ASK_CUSTOM_CITY,
        DialogState::AwaitRole => ASK_ROLE,
        DialogState::AwaitCaseType => ASK_CASE_TYPE,
        DialogState::AwaitContactMethod => ASK_CONTACT,
        DialogState::AwaitName if session.role == Some(Role::Organization) => ASK_COMPANY,
        DialogState::AwaitName => ASK_NAME,
        DialogState::AwaitQuery => ASK_QUERY,
        DialogState::AwaitPhone => ASK_PHONE,
        DialogState::ActiveRelay => AWAIT_OPERATOR_CHAT,
    };
    Outbound::new(text).with_keyboard(keyboard_for(state))
}

pub fn welcome() -> Outbound {
    Outbound::new(format!("{WELCOME}\n\n{ASK_CITY}"))
        .with_keyboard(keyboard_for(DialogState::AwaitCity))
}

pub fn use_start() -> Outbound {
    Outbound::new(USE_START).with_keyboard(keyboard_for(DialogState::Idle))
}

/// Corrective reply for input the current step does not accept
pub fn follow_instructions(state: DialogState) -> Outbound {
    Outbound::new(FOLLOW_INSTRUCTIONS).with_keyboard(keyboard_for(state))
}

/// Confirmation sent when intake completes
pub fn intake_complete(session: &Session, flow: &FlowConfig) -> Outbound {
    let text = match session.contact_method {
        Some(ContactMethod::Phone) => {
            let mut text = format!(
                "Спасибо! Оператор перезвонит вам по номеру {}.\n\n<i>Пока ожидаете звонка, можете написать сюда, если хотите что-то добавить.</i>",
                html::bold(&html::escape(session.phone_display()))
            );
            if let Some(phone) = &flow.callback_phone {
                text.push_str(&format!(
                    "\n\nЕсли удобнее, позвоните нам сразу: {}",
                    html::bold(&html::escape(phone))
                ));
            }
            text
        }
        _ => format!("Спасибо! {AWAIT_OPERATOR_CHAT}"),
    };
    Outbound::new(text).with_keyboard(Keyboard::Remove)
}
