use super::*;
use crate::{
    auth_gate::{redirect_param, AuthState, RecordingNavigator},
    bridge::MissingCommandBridge,
    test_support::FakeBridge,
};
use shared::{
    domain::ValidationState,
    protocol::{AuthenticationSuccessResponse, MyInfoResult},
};

const COOLDOWN: Duration = Duration::from_millis(600);

fn login_form(
    bridge: FakeBridge,
    redirect: Option<&str>,
) -> (LoginForm, Arc<FakeBridge>, Arc<RecordingNavigator>) {
    let bridge = Arc::new(bridge);
    let navigator = Arc::new(RecordingNavigator::new());
    let form = LoginForm::new(
        bridge.clone(),
        navigator.clone(),
        redirect.map(str::to_string),
    );
    (form, bridge, navigator)
}

fn register_form(
    bridge: FakeBridge,
) -> (RegisterForm, Arc<FakeBridge>, Arc<RecordingNavigator>) {
    let bridge = Arc::new(bridge);
    let navigator = Arc::new(RecordingNavigator::new());
    let form = RegisterForm::new(bridge.clone(), navigator.clone(), None, COOLDOWN);
    (form, bridge, navigator)
}

fn created(id: i64) -> CreateUserResult {
    CreateUserResult::Success(AuthenticationSuccessResponse {
        id: UserId(id),
        token: "fresh".into(),
    })
}

async fn fill_register(form: &RegisterForm, username: &str, password: &str, confirm: &str) {
    form.username().input(username);
    form.password().input(password);
    form.username().settled().await;
    form.password().settled().await;
    form.confirm().input(confirm);
    form.confirm().settled().await;
}

#[tokio::test(start_paused = true)]
async fn fresh_login_form_cannot_submit() {
    let (form, _bridge, _navigator) = login_form(FakeBridge::default(), None);
    form.validate_all().await;
    assert_eq!(form.username().validation(), ValidationState::Invalid);
    assert!(!form.can_submit());
}

#[tokio::test(start_paused = true)]
async fn login_form_enables_on_length_rules() {
    let (form, _bridge, _navigator) = login_form(FakeBridge::default(), None);

    form.username().input("ada");
    form.password().input("Secr3t!pw");
    form.username().settled().await;
    form.password().settled().await;
    assert!(!form.can_submit());

    form.username().input("ada_l");
    form.username().settled().await;
    assert!(form.can_submit());
}

#[tokio::test(start_paused = true)]
async fn authorized_login_navigates_to_redirect() {
    let (form, bridge, navigator) = login_form(
        FakeBridge {
            login_result: LoginResult::Authorized,
            ..FakeBridge::default()
        },
        Some("game/42"),
    );
    form.username().input("ada_l");
    form.password().input("Secr3t!pw");

    let outcome = form.submit().await.expect("submit");
    assert_eq!(
        outcome,
        LoginOutcome::Authorized {
            target: "/game/42".into()
        }
    );
    assert_eq!(navigator.history(), vec!["/game/42"]);
    assert_eq!(
        bridge.submitted().await,
        vec![("ada_l".to_string(), "Secr3t!pw".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn login_lets_the_gate_admit_the_page_it_bounced_from() {
    let bridge = Arc::new(FakeBridge {
        login_result: LoginResult::Authorized,
        info: Some(MyInfoResult::Success {
            id: UserId(7),
            username: "ada_l".into(),
        }),
        ..FakeBridge::default()
    });
    let navigator = Arc::new(RecordingNavigator::new());
    let gate = Arc::new(AuthGate::new(bridge.clone(), navigator.clone(), "/auth"));

    let bounced = gate.resolve("/game/42").await;
    assert_eq!(bounced.state, AuthState::Unauthenticated);
    let back = redirect_param(bounced.redirect.as_deref().expect("redirect"));

    let form = LoginForm::new(bridge.clone(), navigator.clone(), back).with_gate(gate.clone());
    form.username().input("ada_l");
    form.password().input("Secr3t!pw");
    assert!(matches!(
        form.submit().await.expect("submit"),
        LoginOutcome::Authorized { .. }
    ));
    assert_eq!(
        navigator.history(),
        vec!["/auth?redirect=game%2F42", "/game/42"]
    );

    let admitted = gate.resolve("/game/42").await;
    assert_eq!(admitted.state, AuthState::Authenticated);
    assert_eq!(admitted.session.map(|session| session.id), Some(UserId(7)));
    assert_eq!(bridge.calls().await.verify_token, 2);
}

#[tokio::test(start_paused = true)]
async fn registration_resets_an_attached_gate() {
    let bridge = Arc::new(FakeBridge {
        create_result: created(9),
        info: Some(MyInfoResult::Success {
            id: UserId(9),
            username: "ada_l".into(),
        }),
        ..FakeBridge::default()
    });
    let navigator = Arc::new(RecordingNavigator::new());
    let gate = Arc::new(AuthGate::new(bridge.clone(), navigator.clone(), "/auth"));
    assert_eq!(gate.resolve("/").await.state, AuthState::Unauthenticated);

    let form = RegisterForm::new(bridge.clone(), navigator, None, COOLDOWN).with_gate(gate.clone());
    fill_register(&form, "ada_l", "Secr3t!pw", "Secr3t!pw").await;
    assert!(matches!(
        form.submit().await.expect("submit"),
        RegisterOutcome::Created { .. }
    ));

    assert_eq!(gate.resolve("/").await.state, AuthState::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn rejected_login_stays_put() {
    let (form, _bridge, navigator) = login_form(FakeBridge::default(), None);
    form.username().input("ada_l");
    form.password().input("wrong-password");

    assert_eq!(form.submit().await.expect("submit"), LoginOutcome::Unauthorized);
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn login_bridge_failure_surfaces_as_error() {
    let form = LoginForm::new(
        Arc::new(MissingCommandBridge),
        Arc::new(RecordingNavigator::new()),
        None,
    );
    assert!(matches!(form.submit().await, Err(FormError::Bridge(_))));
}

#[tokio::test(start_paused = true)]
async fn registration_happy_path_creates_and_navigates_home() {
    let (form, bridge, navigator) = register_form(FakeBridge {
        create_result: created(9),
        ..FakeBridge::with_users(&["taken"])
    });

    fill_register(&form, "ada_l", "Secr3t!pw", "Secr3t!pw").await;
    assert!(form.can_submit());
    assert_eq!(form.username_unique().get(), Some(true));
    assert_eq!(form.username_hints().get(), Some(UsernameValidation::Valid));
    assert_eq!(form.password_hints().get(), Some(PasswordValidation::Valid));

    let outcome = form.submit().await.expect("submit");
    assert_eq!(
        outcome,
        RegisterOutcome::Created {
            id: UserId(9),
            target: "/".into()
        }
    );
    assert_eq!(navigator.history(), vec!["/"]);
    assert_eq!(bridge.calls().await.create_user, 1);
}

#[tokio::test(start_paused = true)]
async fn taken_username_blocks_registration() {
    let (form, bridge, _navigator) = register_form(FakeBridge {
        create_result: created(9),
        ..FakeBridge::with_users(&["taken"])
    });

    fill_register(&form, "taken", "Secr3t!pw", "Secr3t!pw").await;
    assert_eq!(form.username().validation(), ValidationState::Invalid);
    assert_eq!(form.username_unique().get(), Some(false));
    assert!(!form.can_submit());

    assert!(matches!(form.submit().await, Err(FormError::Incomplete)));
    assert_eq!(bridge.calls().await.create_user, 0);
}

#[tokio::test(start_paused = true)]
async fn weak_password_publishes_hints() {
    let (form, _bridge, _navigator) = register_form(FakeBridge::default());

    form.password().input("password");
    assert_eq!(form.password().settled().await, ValidationState::Invalid);
    let Some(PasswordValidation::Invalid(criteria)) = form.password_hints().get() else {
        panic!("expected password criteria");
    };
    assert!(criteria.length && criteria.lower);
    assert!(!criteria.upper && !criteria.digit && !criteria.special);
}

#[tokio::test(start_paused = true)]
async fn mismatched_confirmation_is_invalid() {
    let (form, _bridge, _navigator) = register_form(FakeBridge::default());

    fill_register(&form, "ada_l", "Secr3t!pw", "Secr3t!px").await;
    assert_eq!(form.confirm().validation(), ValidationState::Invalid);
    assert!(!form.can_submit());

    form.confirm().input("");
    assert_eq!(form.confirm().settled().await, ValidationState::Unknown);
}

#[tokio::test(start_paused = true)]
async fn changed_password_invalidates_earlier_confirmation() {
    let (form, _bridge, _navigator) = register_form(FakeBridge::default());

    fill_register(&form, "ada_l", "Secr3t!pw", "Secr3t!pw").await;
    assert!(form.can_submit());

    form.password().input("Diff3rent!pw");
    form.password().settled().await;
    assert!(!form.can_submit());
}

#[tokio::test(start_paused = true)]
async fn typing_a_username_checks_existence_once() {
    let (form, bridge, _navigator) = register_form(FakeBridge::default());

    for prefix in ["a", "ad", "ada", "ada_", "ada_l"] {
        form.username().input(prefix);
        tokio::time::sleep(Duration::from_millis(120)).await;
    }
    assert_eq!(form.username().settled().await, ValidationState::Valid);

    let calls = bridge.calls().await;
    assert_eq!(calls.user_exists, 1);
    assert_eq!(calls.validate_username, 1);
}
