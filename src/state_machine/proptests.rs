//! Property-based tests for the intake state machine
//!
//! These tests verify the dialog invariants hold across generated inputs.

use super::state::*;
use super::transition::*;
use super::*;
use chrono::{DateTime, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn context(ask_case_type: bool) -> PartyContext {
    PartyContext::new(
        PartyId(4242),
        FlowConfig {
            ask_case_type,
            ..FlowConfig::default()
        },
    )
}

/// One complete, valid walk through the intake
#[derive(Debug, Clone)]
struct IntakePlan {
    city: CityAnswer,
    role: Role,
    case_type: Option<CaseType>,
    contact: ContactMethod,
    name: String,
    query: String,
    phone: String,
}

#[derive(Debug, Clone)]
enum CityAnswer {
    Known(&'static str),
    Custom(String),
}

impl IntakePlan {
    fn inputs(&self) -> Vec<String> {
        let mut inputs = vec!["/start".to_string()];
        match &self.city {
            CityAnswer::Known(city) => inputs.push((*city).to_string()),
            CityAnswer::Custom(city) => {
                inputs.push(OTHER_CITY.to_string());
                inputs.push(city.clone());
            }
        }
        inputs.push(self.role.caption().to_string());
        if let Some(case_type) = self.case_type {
            inputs.push(case_type.caption().to_string());
        }
        inputs.push(self.contact.caption().to_string());
        inputs.push(self.name.clone());
        inputs.push(self.query.clone());
        if self.contact == ContactMethod::Phone {
            inputs.push(self.phone.clone());
        }
        inputs
    }

    fn city(&self) -> &str {
        match &self.city {
            CityAnswer::Known(city) => city,
            CityAnswer::Custom(city) => city,
        }
    }
}

/// Feed inputs in order, returning every intermediate result
fn drive(
    ctx: &PartyContext,
    inputs: &[String],
) -> Result<Vec<TransitionResult>, TransitionError> {
    let mut session: Option<Session> = None;
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let result = transition(session.as_ref(), ctx, Event::party_text(input.clone()), fixed_now())?;
        session = Some(result.session.clone());
        results.push(result);
    }
    Ok(results)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_free_text() -> impl Strategy<Value = String> {
    "[a-zA-Zа-яА-Я0-9]{1,12}( [a-zA-Zа-яА-Я0-9,.]{1,12}){0,3}"
}

fn arb_city() -> impl Strategy<Value = CityAnswer> {
    prop_oneof![
        proptest::sample::select(KNOWN_CITIES.to_vec()).prop_map(CityAnswer::Known),
        arb_free_text().prop_map(CityAnswer::Custom),
    ]
}

fn arb_plan(ask_case_type: bool) -> impl Strategy<Value = IntakePlan> {
    let case_type = if ask_case_type {
        proptest::sample::select(CaseType::ALL.to_vec())
            .prop_map(Some)
            .boxed()
    } else {
        Just(None).boxed()
    };
    (
        arb_city(),
        proptest::sample::select(Role::ALL.to_vec()),
        case_type,
        proptest::sample::select(ContactMethod::ALL.to_vec()),
        arb_free_text(),
        arb_free_text(),
        "\\+7[0-9]{10}",
    )
        .prop_map(
            |(city, role, case_type, contact, name, query, phone)| IntakePlan {
                city,
                role,
                case_type,
                contact,
                name,
                query,
                phone,
            },
        )
}

fn arb_flow_and_plan() -> impl Strategy<Value = (bool, IntakePlan)> {
    any::<bool>().prop_flat_map(|ask| (Just(ask), arb_plan(ask)))
}

fn arb_event() -> impl Strategy<Value = Event> {
    let captions: Vec<&'static str> = KNOWN_CITIES
        .into_iter()
        .chain([OTHER_CITY])
        .chain(Role::ALL.map(Role::caption))
        .chain(CaseType::ALL.map(CaseType::caption))
        .chain(ContactMethod::ALL.map(ContactMethod::caption))
        .collect();
    prop_oneof![
        3 => proptest::sample::select(captions).prop_map(Event::party_text),
        2 => arb_free_text().prop_map(Event::party_text),
        1 => Just(Event::party_text("/start")),
        1 => "[ \\t\\n]{0,4}".prop_map(Event::party_text),
        1 => arb_free_text().prop_map(|text| Event::OperatorReply { origin_chat: -100, text }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Accepted inputs end in relay with every field equal to what was typed
    #[test]
    fn prop_happy_path_records_inputs((ask, plan) in arb_flow_and_plan()) {
        let results = drive(&context(ask), &plan.inputs());
        prop_assert!(results.is_ok(), "valid walk rejected: {:?}", results.as_ref().err());
        let results = results.unwrap();
        let session = &results.last().unwrap().session;

        prop_assert_eq!(session.state, DialogState::ActiveRelay);
        prop_assert!(session.consultation_active);
        prop_assert_eq!(session.city.as_deref(), Some(plan.city()));
        prop_assert_eq!(session.role, Some(plan.role));
        prop_assert_eq!(session.case_type, plan.case_type);
        prop_assert_eq!(session.contact_method, Some(plan.contact));
        prop_assert_eq!(session.name_or_company.as_deref(), Some(plan.name.as_str()));
        prop_assert_eq!(session.query_text.as_deref(), Some(plan.query.as_str()));
        if plan.contact == ContactMethod::Phone {
            prop_assert_eq!(session.phone.as_deref(), Some(plan.phone.as_str()));
        } else {
            prop_assert!(session.phone.is_none());
        }

        // The summary goes out exactly once, on the final step
        let summaries = results
            .iter()
            .flat_map(|r| &r.effects)
            .filter(|e| **e == Effect::DispatchSummary)
            .count();
        prop_assert_eq!(summaries, 1);
    }

    // Blank input is rejected at every intake step with the state named
    #[test]
    fn prop_blank_input_rejected_mid_intake(
        (ask, plan) in arb_flow_and_plan(),
        cut in 1usize..20,
        blank in "[ \\t\\n]{0,4}",
    ) {
        let ctx = context(ask);
        let inputs = plan.inputs();
        let cut = cut.min(inputs.len() - 1);
        let results = drive(&ctx, &inputs[..cut]).unwrap();
        let current = &results.last().unwrap().session;

        let err = transition(Some(current), &ctx, Event::party_text(blank), fixed_now());
        prop_assert_eq!(err.unwrap_err(), TransitionError::UnexpectedInput { state: current.state });
    }

    // Digits never match a keyboard step
    #[test]
    fn prop_choice_steps_reject_other_text(
        (ask, plan) in arb_flow_and_plan(),
        garbage in "[0-9]{1,8}",
    ) {
        let ctx = context(ask);
        let inputs = plan.inputs();
        let results = drive(&ctx, &inputs).unwrap();
        for result in &results {
            let session = &result.session;
            let is_choice = matches!(
                session.state,
                DialogState::AwaitCity
                    | DialogState::AwaitRole
                    | DialogState::AwaitCaseType
                    | DialogState::AwaitContactMethod
            );
            if is_choice {
                let outcome = transition(Some(session), &ctx, Event::party_text(garbage.clone()), fixed_now());
                prop_assert!(
                    matches!(outcome, Err(TransitionError::UnexpectedInput { state }) if state == session.state),
                    "state {} accepted {:?}",
                    session.state,
                    garbage
                );
            }
        }
    }

    // Random traffic: the relay flag tracks the state and state changes persist
    #[test]
    fn prop_invariants_hold_under_random_events(
        ask in any::<bool>(),
        events in proptest::collection::vec(arb_event(), 0..30),
    ) {
        let ctx = context(ask);
        let mut session: Option<Session> = None;

        for event in events {
            match transition(session.as_ref(), &ctx, event, fixed_now()) {
                Ok(result) => {
                    let next = &result.session;
                    prop_assert_eq!(next.consultation_active, next.state == DialogState::ActiveRelay);
                    if next.contact_method != Some(ContactMethod::Phone) {
                        prop_assert!(next.phone.is_none());
                    }
                    if session.as_ref() != Some(next) {
                        prop_assert!(
                            result.effects.contains(&Effect::PersistSession),
                            "changed session without persisting: {:?}",
                            result.effects
                        );
                    }
                    session = Some(result.session);
                }
                Err(TransitionError::NoSession | TransitionError::PartyNotFound(_)) => {
                    prop_assert!(session.is_none());
                }
                Err(TransitionError::UnexpectedInput { state }) => {
                    prop_assert_eq!(session.as_ref().map(|s| s.state), Some(state));
                }
            }
        }
    }

    // Start from any point yields the same record as a first-time party
    #[test]
    fn prop_start_resets_to_fresh_session(
        (ask, plan) in arb_flow_and_plan(),
        cut in 1usize..20,
    ) {
        let ctx = context(ask);
        let inputs = plan.inputs();
        let cut = cut.min(inputs.len());
        let results = drive(&ctx, &inputs[..cut]).unwrap();
        let current = &results.last().unwrap().session;

        let restarted = transition(Some(current), &ctx, Event::party_text("/start"), fixed_now()).unwrap();
        let first_time = transition(None, &ctx, Event::party_text("/start"), fixed_now()).unwrap();
        prop_assert_eq!(restarted.session, first_time.session);
    }

    // Without a session only the start command is accepted
    #[test]
    fn prop_absent_session_only_accepts_start(text in arb_free_text()) {
        let outcome = transition(None, &context(false), Event::party_text(text), fixed_now());
        prop_assert_eq!(outcome.unwrap_err(), TransitionError::NoSession);
    }

    // Operator replies force relay and never touch collected answers
    #[test]
    fn prop_operator_reply_preserves_answers(
        (ask, plan) in arb_flow_and_plan(),
        cut in 1usize..20,
        reply in arb_free_text(),
    ) {
        let ctx = context(ask);
        let inputs = plan.inputs();
        let cut = cut.min(inputs.len());
        let results = drive(&ctx, &inputs[..cut]).unwrap();
        let current = results.last().unwrap().session.clone();

        let result = transition(
            Some(&current),
            &ctx,
            Event::OperatorReply { origin_chat: -1, text: reply },
            fixed_now(),
        ).unwrap();
        let mut expected = current;
        expected.state = DialogState::ActiveRelay;
        expected.consultation_active = true;
        prop_assert_eq!(result.session, expected);
    }
}
